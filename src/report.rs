//! Structured run report for downstream tool consumption.
//!
//! Written as JSON next to the call table: what was run, on which inputs,
//! with which thresholds, and how every candidate allele was accounted for.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::caller::CallerConfig;
use crate::decision::Criteria;
use crate::family::TrioSource;
use crate::CallSummary;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub sample: String,
    pub inputs: Inputs,
    pub output: String,
    pub criteria: Criteria,
    pub statistics: CallSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Inputs {
    Separate {
        proband: String,
        father: String,
        mother: String,
    },
    Merged {
        trio: String,
        father_id: String,
        mother_id: String,
    },
}

impl From<&TrioSource> for Inputs {
    fn from(source: &TrioSource) -> Self {
        match source {
            TrioSource::Separate {
                proband,
                father,
                mother,
            } => Inputs::Separate {
                proband: display(proband),
                father: display(father),
                mother: display(mother),
            },
            TrioSource::Merged {
                path,
                father_id,
                mother_id,
            } => Inputs::Merged {
                trio: display(path),
                father_id: father_id.clone(),
                mother_id: mother_id.clone(),
            },
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl RunReport {
    pub fn new(config: &CallerConfig, summary: &CallSummary) -> Self {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            sample: config.sample.clone(),
            inputs: Inputs::from(&config.source),
            output: display(&config.output),
            criteria: config.criteria.clone(),
            statistics: summary.clone(),
        }
    }

    /// For `calls.tsv` this is `calls_report.json` in the same directory.
    pub fn path_for(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        output_path.with_file_name(format!("{stem}_report.json"))
    }

    pub fn write(&self, output_path: &Path) -> std::io::Result<PathBuf> {
        let report_path = Self::path_for(output_path);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&report_path, json)?;
        tracing::info!("Wrote run report to {}", report_path.display());
        Ok(report_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{AdmissionRule, default_genotype_blacklist};

    fn config(output: PathBuf) -> CallerConfig {
        CallerConfig {
            sample: "kid".to_string(),
            source: TrioSource::Merged {
                path: PathBuf::from("trio.g.vcf.gz"),
                father_id: "dad".to_string(),
                mother_id: "mom".to_string(),
            },
            criteria: Criteria {
                admission: AdmissionRule::MinVaf(0.25),
                max_parent_alt_depth: 1,
                min_parent_depth: 10,
                genotype_blacklist: default_genotype_blacklist(),
            },
            output,
            progress_interval: 0,
        }
    }

    #[test]
    fn report_sits_next_to_output() {
        assert_eq!(
            RunReport::path_for(Path::new("/runs/kid.denovo.tsv")),
            PathBuf::from("/runs/kid.denovo_report.json")
        );
    }

    #[test]
    fn writes_json_with_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("calls.tsv");
        let summary = CallSummary {
            data_records: 12,
            accepted: 2,
            ..CallSummary::default()
        };

        let path = RunReport::new(&config(output.clone()), &summary)
            .write(&output)
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(json["sample"], "kid");
        assert_eq!(json["inputs"]["mode"], "merged");
        assert_eq!(json["inputs"]["father_id"], "dad");
        assert_eq!(json["criteria"]["admission"]["mode"], "min_vaf");
        assert_eq!(json["criteria"]["admission"]["threshold"], 0.25);
        assert_eq!(json["statistics"]["data_records"], 12);
        assert_eq!(json["statistics"]["accepted"], 2);
    }
}
