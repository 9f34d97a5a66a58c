//! Single-sample gVCF line model.
//!
//! A gVCF stream is a run of `##` meta lines, one `#CHROM` column header and
//! then tab-separated data lines. Data lines are either variant records or
//! reference blocks (`END=` in INFO). Only the handful of FORMAT keys the
//! caller needs are lifted into [`GenotypeFields`]; everything else stays as
//! raw text so it can be echoed into the output unchanged.

use std::{
    collections::HashMap,
    fmt,
    io::{self, BufRead},
    num::ParseIntError,
};

use thiserror::Error;

/// Placeholder allele GATK appends to every gVCF ALT list.
pub const NON_REF: &str = "<NON_REF>";

/// ALT symbol for an allele spanning an upstream deletion.
pub const SPANNING_DELETION: &str = "*";

const CHROM: &str = "#CHROM";
const POS: &str = "POS";
const REF: &str = "REF";
const ALT: &str = "ALT";
const INFO: &str = "INFO";
const FORMAT: &str = "FORMAT";

/// Number of fixed columns preceding the first sample column.
pub const FIXED_COLUMNS: usize = 9;

/// Column layout declared by the `#CHROM` header line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
    chrom: usize,
    pos: usize,
    reference: usize,
    alternate: usize,
    info: usize,
    format: usize,
}

impl Columns {
    pub fn parse(line: &str) -> Result<Self, ParseErrorKind> {
        let names: Vec<String> = line
            .trim_end_matches(['\n', '\r'])
            .split('\t')
            .map(String::from)
            .collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let require = |name: &'static str| {
            index
                .get(name)
                .copied()
                .ok_or(ParseErrorKind::MissingColumn(name))
        };

        Ok(Self {
            chrom: require(CHROM)?,
            pos: require(POS)?,
            reference: require(REF)?,
            alternate: require(ALT)?,
            info: require(INFO)?,
            format: require(FORMAT)?,
            names,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column index of a named column (sample ids included).
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Names of the genotype columns following FORMAT.
    pub fn sample_names(&self) -> &[String] {
        &self.names[self.format + 1..]
    }
}

/// One classified input line.
#[derive(Clone, Debug, PartialEq)]
pub enum Line {
    /// `##` metadata, ignored.
    Meta,
    Columns(Columns),
    Data(DataRecord),
}

/// Classify and parse a single line.
///
/// Data lines are parsed against `columns`; a data line seen before any
/// column header is an error.
pub fn parse_line(line: &str, columns: Option<&Columns>) -> Result<Line, ParseErrorKind> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.starts_with("##") {
        return Ok(Line::Meta);
    }
    if line.starts_with(CHROM) {
        return Columns::parse(line).map(Line::Columns);
    }
    let columns = columns.ok_or(ParseErrorKind::MissingColumnHeader)?;
    DataRecord::parse(line, columns).map(Line::Data)
}

/// A genomic coordinate, 1-based.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GenomicCoordinate {
    pub chromosome: String,
    pub position: u64,
}

impl fmt::Display for GenomicCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.position)
    }
}

/// One data line, split into raw columns.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRecord {
    fields: Vec<String>,
    position: u64,
    chrom: usize,
    reference: usize,
    alternate: usize,
    info: usize,
    format: usize,
}

impl DataRecord {
    pub fn parse(line: &str, columns: &Columns) -> Result<Self, ParseErrorKind> {
        let fields: Vec<String> = line.split('\t').map(String::from).collect();
        if fields.len() < columns.len() {
            return Err(ParseErrorKind::FieldCount {
                expected: columns.len(),
                found: fields.len(),
            });
        }

        let position = fields[columns.pos]
            .parse::<u64>()
            .map_err(ParseErrorKind::InvalidPosition)?;
        if fields[columns.chrom].is_empty() {
            return Err(ParseErrorKind::InvalidChromosome);
        }

        Ok(Self {
            fields,
            position,
            chrom: columns.chrom,
            reference: columns.reference,
            alternate: columns.alternate,
            info: columns.info,
            format: columns.format,
        })
    }

    pub fn chromosome(&self) -> &str {
        &self.fields[self.chrom]
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn coordinate(&self) -> GenomicCoordinate {
        GenomicCoordinate {
            chromosome: self.chromosome().to_string(),
            position: self.position,
        }
    }

    pub fn reference_bases(&self) -> &str {
        &self.fields[self.reference]
    }

    /// Raw ALT column, `<NON_REF>` included.
    pub fn alternate_bases(&self) -> &str {
        &self.fields[self.alternate]
    }

    pub fn info(&self) -> &str {
        &self.fields[self.info]
    }

    pub fn format(&self) -> &str {
        &self.fields[self.format]
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn sample(&self, column: usize) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// The final column. Single-sample gVCFs keep their genotype there.
    pub fn last_sample(&self) -> &str {
        self.fields.last().map(String::as_str).unwrap_or_default()
    }

    /// Value of an INFO key, `Some("")` for flags.
    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.info().split(';').find_map(|entry| {
            let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
            (name == key).then_some(value)
        })
    }

    /// A non-variant block carries an explicit `END` in INFO.
    pub fn is_reference_block(&self) -> bool {
        self.info_value("END").is_some()
    }

    /// Variant lines emitted by the haplotype caller carry allele-specific
    /// raw annotations (`AS_RAW_*`).
    pub fn is_variant_evidence(&self) -> bool {
        self.info()
            .split(';')
            .any(|entry| entry.starts_with("AS_RAW"))
    }

    /// Last reference position covered by this line.
    pub fn end(&self) -> u64 {
        self.info_value("END")
            .and_then(|end| end.parse::<u64>().ok())
            .unwrap_or_else(|| {
                let len = self.reference_bases().len().max(1) as u64;
                self.position.saturating_add(len - 1)
            })
    }

    /// ALT alleles with the `<NON_REF>` placeholder removed, in file order.
    pub fn alternate_alleles(&self) -> Vec<&str> {
        alternate_alleles(self.alternate_bases())
    }

    /// Split into one [`AlleleRecord`] per single-base substitution.
    pub fn alleles(&self) -> impl Iterator<Item = AlleleRecord<'_>> + '_ {
        let reference = single_base(self.reference_bases());
        self.alternate_alleles()
            .into_iter()
            .enumerate()
            .filter_map(move |(i, alt)| {
                if alt == SPANNING_DELETION {
                    return None;
                }
                let reference = reference?;
                let alternate = single_base(alt)?;
                Some(AlleleRecord {
                    record: self,
                    reference,
                    alternate,
                    allele_index: i + 1,
                })
            })
    }

    /// Typed view over one sample column.
    pub fn genotype_fields(&self, column: usize) -> Result<GenotypeFields, ParseErrorKind> {
        let sample = self
            .sample(column)
            .ok_or(ParseErrorKind::MissingSampleColumn(column))?;
        GenotypeFields::parse(self.format(), sample)
    }
}

fn alternate_alleles(raw: &str) -> Vec<&str> {
    raw.split(',')
        .filter(|allele| !allele.is_empty() && *allele != NON_REF)
        .collect()
}

fn single_base(allele: &str) -> Option<char> {
    let mut chars = allele.chars();
    match (chars.next(), chars.next()) {
        (Some(base), None) if base.is_ascii_alphabetic() => Some(base.to_ascii_uppercase()),
        _ => None,
    }
}

/// One candidate substitution taken from a (possibly multiallelic) record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlleleRecord<'r> {
    pub record: &'r DataRecord,
    pub reference: char,
    pub alternate: char,
    /// 1-based index into the ALT list; AD/F1R2/F2R1 entry 0 is REF.
    pub allele_index: usize,
}

impl AlleleRecord<'_> {
    pub fn chromosome(&self) -> &str {
        self.record.chromosome()
    }

    pub fn position(&self) -> u64 {
        self.record.position()
    }

    pub fn info(&self) -> &str {
        self.record.info()
    }

    pub fn format(&self) -> &str {
        self.record.format()
    }
}

/// FORMAT keys the caller reads from a sample column.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GenotypeFields {
    pub genotype: Option<String>,
    pub allele_depths: Option<String>,
    pub depth: Option<String>,
    pub f1r2: Option<String>,
    pub f2r1: Option<String>,
}

impl GenotypeFields {
    /// Zip a FORMAT key list against a sample's value list.
    pub fn parse(format: &str, sample: &str) -> Result<Self, ParseErrorKind> {
        let keys: Vec<&str> = format.split(':').collect();
        let values: Vec<&str> = sample.split(':').collect();
        if keys.len() != values.len() {
            return Err(ParseErrorKind::FormatLength {
                keys: keys.len(),
                values: values.len(),
            });
        }

        let mut fields = Self::default();
        for (key, value) in keys.into_iter().zip(values) {
            let slot = match key {
                "GT" => &mut fields.genotype,
                "AD" => &mut fields.allele_depths,
                "DP" => &mut fields.depth,
                "F1R2" => &mut fields.f1r2,
                "F2R1" => &mut fields.f2r1,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        Ok(fields)
    }

    pub fn is_missing_genotype(&self) -> bool {
        self.genotype
            .as_deref()
            .is_none_or(is_missing_genotype)
    }

    /// True when every per-allele depth field the proband check needs is present.
    pub fn has_strand_depths(&self) -> bool {
        self.allele_depths.is_some()
            && self.depth.is_some()
            && self.f1r2.is_some()
            && self.f2r1.is_some()
    }
}

/// `./.`, `.|.` and `.` are missing; a partially called genotype is not.
pub fn is_missing_genotype(genotype: &str) -> bool {
    genotype
        .split(['/', '|'])
        .all(|allele| allele == ".")
}

/// Parse a single depth value. `.` counts as zero reads.
pub fn parse_depth(raw: &str) -> Result<u32, ParseIntError> {
    match raw.trim() {
        "." => Ok(0),
        value => value.parse::<u32>(),
    }
}

/// Entry `index` of a comma-separated per-allele list.
pub fn list_entry(raw: &str, index: usize) -> Option<&str> {
    raw.split(',').nth(index)
}

/// Iterator over parsed lines of a gVCF stream.
///
/// Tracks the column header so data lines can be resolved against it.
pub struct Reader<R> {
    inner: R,
    line: u64,
    buf: String,
    columns: Option<Columns>,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
            columns: None,
        }
    }

    pub fn columns(&self) -> Option<&Columns> {
        self.columns.as_ref()
    }

    /// 1-based number of the last line read.
    pub fn line_number(&self) -> u64 {
        self.line
    }

    /// Read up to and including the column header.
    pub fn read_columns(&mut self) -> Result<&Columns, ParseError> {
        while self.columns.is_none() {
            match self.next_line() {
                Some(Ok(Line::Data(_))) => {
                    return Err(ParseError {
                        line: self.line,
                        raw: self.buf.trim_end().to_string(),
                        kind: ParseErrorKind::MissingColumnHeader,
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ParseError {
                        line: self.line,
                        raw: String::new(),
                        kind: ParseErrorKind::MissingColumnHeader,
                    });
                }
            }
        }
        self.columns.as_ref().ok_or(ParseError {
            line: self.line,
            raw: String::new(),
            kind: ParseErrorKind::MissingColumnHeader,
        })
    }

    fn next_line(&mut self) -> Option<Result<Line, ParseError>> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_end_matches(['\n', '\r']);
                    if trimmed.is_empty() {
                        continue;
                    }

                    let parsed = parse_line(trimmed, self.columns.as_ref());
                    if let Ok(Line::Columns(columns)) = &parsed {
                        self.columns = Some(columns.clone());
                    }
                    return Some(parsed.map_err(|kind| ParseError {
                        line: self.line,
                        raw: trimmed.to_string(),
                        kind,
                    }));
                }
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line,
                        raw: String::new(),
                        kind: ParseErrorKind::Io(e),
                    }));
                }
            }
        }
    }
}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<DataRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_line()? {
                Ok(Line::Data(record)) => return Some(Ok(record)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Errors that can arise while parsing a gVCF line.
#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("data line precedes the #CHROM column header")]
    MissingColumnHeader,
    #[error("column header lacks required column {0}")]
    MissingColumn(&'static str),
    #[error("expected {expected} tab-delimited fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid chromosome field")]
    InvalidChromosome,
    #[error("invalid position: {0}")]
    InvalidPosition(ParseIntError),
    #[error("FORMAT declares {keys} keys but the sample has {values} values")]
    FormatLength { keys: usize, values: usize },
    #[error("no sample column at index {0}")]
    MissingSampleColumn(usize),
}
