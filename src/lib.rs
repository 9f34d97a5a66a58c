#![doc = include_str!("../README.md")]

pub mod caller;
pub mod cli;
pub mod decision;
pub mod family;
pub mod output;
pub mod parent;
pub mod proband;
pub mod record;
pub mod report;
pub mod smart_reader;
pub mod store;

use serde::Serialize;

use crate::decision::Rejection;
use crate::proband::SkipReason;

pub use caller::{CallError, CallerConfig, call_denovos};
pub use decision::{AdmissionRule, Criteria, Verdict};
pub use family::{ConfigError, TrioRequest, TrioSource};
pub use parent::DepthSummary;
pub use proband::ProbandEvidence;

/// Counters for one calling run. Owned by the run, never global.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CallSummary {
    pub data_records: usize,
    pub reference_blocks: usize,
    pub candidate_alleles: usize,
    pub missing_genotype: usize,
    pub missing_fields: usize,
    pub unparseable_evidence: usize,
    pub rejected_homozygous_alt: usize,
    pub rejected_proband_evidence: usize,
    pub rejected_parent_alt_depth: usize,
    pub rejected_parent_depth: usize,
    pub rejected_parent_genotype: usize,
    pub accepted: usize,
}

impl CallSummary {
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingGenotype => self.missing_genotype += 1,
            SkipReason::MissingFields => self.missing_fields += 1,
            SkipReason::UnparseableEvidence => self.unparseable_evidence += 1,
        }
    }

    pub fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::HomozygousAlt => self.rejected_homozygous_alt += 1,
            Rejection::ProbandEvidence => self.rejected_proband_evidence += 1,
            Rejection::ParentAltDepth => self.rejected_parent_alt_depth += 1,
            Rejection::ParentDepth => self.rejected_parent_depth += 1,
            Rejection::ParentGenotype => self.rejected_parent_genotype += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected_homozygous_alt
            + self.rejected_proband_evidence
            + self.rejected_parent_alt_depth
            + self.rejected_parent_depth
            + self.rejected_parent_genotype
    }

    pub fn skipped(&self) -> usize {
        self.missing_genotype + self.missing_fields + self.unparseable_evidence
    }
}
