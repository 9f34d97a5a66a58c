use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::parent::DepthSummary;
use crate::proband::ProbandEvidence;
use crate::record::{AlleleRecord, FIXED_COLUMNS};

/// Column names of the call table, in order.
pub const HEADER: &[&str] = &[
    "id", "chr", "pos", "ref", "alt", "refdp", "altdp", "dp", "adfref", "adfalt", "adrref",
    "adralt", "CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT", "S_GT",
    "FA_FORMAT", "FA_GT", "MO_FORMAT", "MO_GT",
];

/// Everything needed to print one accepted call.
#[derive(Clone, Copy, Debug)]
pub struct DenovoRow<'a> {
    pub sample: &'a str,
    pub allele: &'a AlleleRecord<'a>,
    pub evidence: &'a ProbandEvidence,
    /// The proband's raw genotype column.
    pub proband_sample: &'a str,
    pub father: &'a DepthSummary,
    pub mother: &'a DepthSummary,
}

impl DenovoRow<'_> {
    /// Tab-joined row without the trailing newline.
    pub fn format(&self) -> String {
        let e = self.evidence;
        let record = self.allele.record;
        let fixed = &record.fields()[..FIXED_COLUMNS.min(record.fields().len())];

        let mut fields: Vec<String> = vec![
            self.sample.to_string(),
            strip_chr(self.allele.chromosome()).to_string(),
            self.allele.position().to_string(),
            self.allele.reference.to_string(),
            self.allele.alternate.to_string(),
            e.ref_depth.to_string(),
            e.alt_depth.to_string(),
            e.total_depth.to_string(),
            e.forward_ref.to_string(),
            e.forward_alt.to_string(),
            e.reverse_ref.to_string(),
            e.reverse_alt.to_string(),
        ];
        fields.extend(fixed.iter().cloned());
        fields.push(self.proband_sample.to_string());
        for parent in [self.father, self.mother] {
            fields.push(parent.format.clone());
            fields.push(parent.genotype.clone());
        }
        fields.join("\t")
    }
}

/// Drop a leading `chr` contig prefix; nothing else is touched.
pub fn strip_chr(chromosome: &str) -> &str {
    chromosome.strip_prefix("chr").unwrap_or(chromosome)
}

/// Durable writer for the call table.
///
/// Every row is flushed and synced to disk before [`DenovoWriter::write_row`]
/// returns, so a crash never loses a call that was already reported.
pub struct DenovoWriter {
    inner: BufWriter<File>,
}

impl DenovoWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            inner: BufWriter::new(file),
        })
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.inner, "{}", HEADER.join("\t"))?;
        self.sync()
    }

    pub fn write_row(&mut self, row: &DenovoRow<'_>) -> io::Result<()> {
        writeln!(self.inner, "{}", row.format())?;
        self.sync()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_data()
    }
}

/// Replace `path` with a single error line.
pub fn write_fatal<P: AsRef<Path>>(path: P, message: &str) -> io::Result<()> {
    let mut file = File::create(path.as_ref())?;
    file.write_all(message.as_bytes())?;
    file.sync_data()
}
