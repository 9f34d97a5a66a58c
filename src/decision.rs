//! Accept/reject logic for one candidate allele.

use std::collections::HashSet;

use serde::Serialize;

use crate::parent::DepthSummary;
use crate::proband::ProbandEvidence;

/// Absolute tolerance applied to the VAF floor.
pub const VAF_EPSILON: f64 = 1e-9;

/// Parent genotypes that are themselves variant calls.
pub const DEFAULT_GENOTYPE_BLACKLIST: &[&str] = &[
    "0/1", "0|1", "0/2", "0|2", "1/1", "1|1", "1/2", "1|2", "2/2", "2|2", "1/0", "1|0", "1/3",
    "1|3", "2/3", "2|3", "3/3", "3|3",
];

/// How much proband support an allele needs. The two modes never combine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", content = "threshold", rename_all = "snake_case")]
pub enum AdmissionRule {
    MinAltDepth(u32),
    MinVaf(f64),
}

impl AdmissionRule {
    pub fn admits(&self, evidence: &ProbandEvidence) -> bool {
        match *self {
            Self::MinAltDepth(min) => evidence.alt_depth >= min,
            Self::MinVaf(min) => evidence.vaf() >= min - VAF_EPSILON,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Criteria {
    pub admission: AdmissionRule,
    pub max_parent_alt_depth: u32,
    pub min_parent_depth: u32,
    /// Parent `GT` values that disqualify a call. Empty disables the check.
    pub genotype_blacklist: HashSet<String>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// No reference reads in the proband.
    HomozygousAlt,
    ProbandEvidence,
    ParentAltDepth,
    ParentDepth,
    ParentGenotype,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

impl Criteria {
    /// Proband-only checks, run before any parent is looked up.
    pub fn screen_proband(&self, evidence: &ProbandEvidence) -> Option<Rejection> {
        if evidence.ref_depth == 0 {
            return Some(Rejection::HomozygousAlt);
        }
        if !self.admission.admits(evidence) {
            return Some(Rejection::ProbandEvidence);
        }
        None
    }

    pub fn judge_parents(&self, father: &DepthSummary, mother: &DepthSummary) -> Option<Rejection> {
        let parents = [father, mother];
        if parents
            .iter()
            .any(|p| p.alt_depth > self.max_parent_alt_depth)
        {
            return Some(Rejection::ParentAltDepth);
        }
        if parents
            .iter()
            .any(|p| p.total_depth < self.min_parent_depth)
        {
            return Some(Rejection::ParentDepth);
        }
        if parents.iter().any(|p| self.is_blacklisted(p)) {
            return Some(Rejection::ParentGenotype);
        }
        None
    }

    fn is_blacklisted(&self, parent: &DepthSummary) -> bool {
        !self.genotype_blacklist.is_empty()
            && parent
                .gt()
                .is_some_and(|gt| self.genotype_blacklist.contains(gt))
    }

    /// Full ordered evaluation. Pure: the same inputs always give the same verdict.
    pub fn evaluate(
        &self,
        evidence: &ProbandEvidence,
        father: &DepthSummary,
        mother: &DepthSummary,
    ) -> Verdict {
        match self
            .screen_proband(evidence)
            .or_else(|| self.judge_parents(father, mother))
        {
            Some(rejection) => Verdict::Reject(rejection),
            None => Verdict::Accept,
        }
    }
}

pub fn default_genotype_blacklist() -> HashSet<String> {
    DEFAULT_GENOTYPE_BLACKLIST
        .iter()
        .map(|gt| (*gt).to_string())
        .collect()
}
