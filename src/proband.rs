//! Proband-side evidence for each candidate substitution.

use std::num::ParseIntError;

use serde::Serialize;
use thiserror::Error;

use crate::record::{self, AlleleRecord, DataRecord, GenotypeFields, ParseErrorKind};

/// Where the proband's genotype lives in each data line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbandColumn {
    /// Single-sample gVCF: the final column.
    Last,
    /// Multi-sample gVCF: a column located by sample id.
    Index(usize),
}

impl ProbandColumn {
    pub fn sample<'r>(&self, record: &'r DataRecord) -> Result<&'r str, ParseErrorKind> {
        match *self {
            Self::Last => Ok(record.last_sample()),
            Self::Index(column) => record
                .sample(column)
                .ok_or(ParseErrorKind::MissingSampleColumn(column)),
        }
    }
}

/// Read counts supporting one allele in the proband.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ProbandEvidence {
    pub ref_depth: u32,
    pub alt_depth: u32,
    pub total_depth: u32,
    /// `F1R2` entries for REF and the allele.
    pub forward_ref: u32,
    pub forward_alt: u32,
    /// `F2R1` entries for REF and the allele.
    pub reverse_ref: u32,
    pub reverse_alt: u32,
}

impl ProbandEvidence {
    /// Extract evidence for ALT allele `allele_index` (1-based).
    pub fn extract(fields: &GenotypeFields, allele_index: usize) -> Result<Self, EvidenceError> {
        let ad = required(&fields.allele_depths, "AD")?;
        let dp = required(&fields.depth, "DP")?;
        let f1r2 = required(&fields.f1r2, "F1R2")?;
        let f2r1 = required(&fields.f2r1, "F2R1")?;

        Ok(Self {
            ref_depth: entry(ad, "AD", 0)?,
            alt_depth: entry(ad, "AD", allele_index)?,
            total_depth: depth(dp, "DP")?,
            forward_ref: entry(f1r2, "F1R2", 0)?,
            forward_alt: entry(f1r2, "F1R2", allele_index)?,
            reverse_ref: entry(f2r1, "F2R1", 0)?,
            reverse_alt: entry(f2r1, "F2R1", allele_index)?,
        })
    }

    /// Variant allele frequency; zero when there is no coverage.
    pub fn vaf(&self) -> f64 {
        if self.total_depth == 0 {
            0.0
        } else {
            f64::from(self.alt_depth) / f64::from(self.total_depth)
        }
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, EvidenceError> {
    value.as_deref().ok_or(EvidenceError::MissingField(field))
}

fn entry(raw: &str, field: &'static str, index: usize) -> Result<u32, EvidenceError> {
    let value = record::list_entry(raw, index).ok_or(EvidenceError::MissingEntry { field, index })?;
    depth(value, field)
}

fn depth(value: &str, field: &'static str) -> Result<u32, EvidenceError> {
    record::parse_depth(value).map_err(|source| EvidenceError::InvalidDepth {
        field,
        value: value.to_string(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("FORMAT lacks {0}")]
    MissingField(&'static str),
    #[error("{field} has no entry at index {index}")]
    MissingEntry { field: &'static str, index: usize },
    #[error("{field} value {value:?} is not a read count")]
    InvalidDepth {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Why an allele never reached the decision stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    MissingGenotype,
    MissingFields,
    UnparseableEvidence,
}

#[derive(Debug, PartialEq)]
pub enum Screen {
    Candidate(ProbandEvidence),
    Skip(SkipReason),
}

/// Pre-check one decomposed allele and pull out its evidence.
///
/// Only a FORMAT/value length mismatch is an error; everything else is a
/// skip.
pub fn screen(allele: &AlleleRecord<'_>, column: ProbandColumn) -> Result<Screen, ParseErrorKind> {
    let record = allele.record;
    if record.is_reference_block() {
        return Ok(Screen::Skip(SkipReason::MissingFields));
    }

    let fields = GenotypeFields::parse(record.format(), column.sample(record)?)?;
    if fields.is_missing_genotype() {
        return Ok(Screen::Skip(SkipReason::MissingGenotype));
    }
    if !fields.has_strand_depths() {
        return Ok(Screen::Skip(SkipReason::MissingFields));
    }

    match ProbandEvidence::extract(&fields, allele.allele_index) {
        Ok(evidence) => Ok(Screen::Candidate(evidence)),
        Err(e) => {
            tracing::warn!(
                site = %record.coordinate(),
                alt = %allele.alternate,
                error = %e,
                "skipping allele with unparseable proband evidence",
            );
            Ok(Screen::Skip(SkipReason::UnparseableEvidence))
        }
    }
}
