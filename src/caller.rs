//! One de novo calling run, from opened inputs to a finished call table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::{
    CallSummary,
    decision::Criteria,
    family::{ConfigError, TrioSource},
    output::{DenovoRow, DenovoWriter},
    parent::{self, DepthSummary, Target},
    proband::{self, ProbandColumn, Screen},
    record::{AlleleRecord, GenomicCoordinate, ParseError, ParseErrorKind, Reader},
    smart_reader,
    store::{self, RegionQuery},
};

/// Everything a run needs, already resolved and validated.
#[derive(Debug, Clone)]
pub struct CallerConfig {
    pub sample: String,
    pub source: TrioSource,
    pub criteria: Criteria,
    pub output: PathBuf,
    /// Log progress every this many data records; 0 disables.
    pub progress_interval: usize,
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("malformed record in {path}")]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("malformed parent record in {path} at {site}")]
    MalformedParentRecord {
        path: PathBuf,
        site: GenomicCoordinate,
        #[source]
        source: ParseErrorKind,
    },
}

/// Parent evidence for the run, according to the input layout.
enum Parents {
    Stores {
        father: Box<dyn RegionQuery>,
        mother: Box<dyn RegionQuery>,
    },
    Columns {
        path: PathBuf,
        father: usize,
        mother: usize,
    },
}

impl Parents {
    fn summarize(&self, allele: &AlleleRecord<'_>) -> Result<(DepthSummary, DepthSummary), CallError> {
        let site = || allele.record.coordinate();
        match self {
            Self::Stores { father, mother } => {
                let target = Target {
                    chromosome: allele.chromosome(),
                    position: allele.position(),
                    alternate: allele.alternate,
                };
                let lookup = |store: &dyn RegionQuery| {
                    parent::resolve_from_store(store, &target).map_err(|source| {
                        CallError::MalformedParentRecord {
                            path: store.path().to_path_buf(),
                            site: site(),
                            source,
                        }
                    })
                };
                let (father, mother) = rayon::join(|| lookup(&**father), || lookup(&**mother));
                Ok((father?, mother?))
            }
            Self::Columns {
                path,
                father,
                mother,
            } => {
                let column = |index: usize| {
                    parent::summarize_column(allele.record, index, allele.allele_index).map_err(
                        |source| CallError::MalformedParentRecord {
                            path: path.clone(),
                            site: site(),
                            source,
                        },
                    )
                };
                Ok((column(*father)?, column(*mother)?))
            }
        }
    }
}

/// Scan the proband and write every accepted call to `config.output`.
pub fn call_denovos(config: &CallerConfig) -> Result<CallSummary> {
    tracing::info!(
        sample = %config.sample,
        output = %config.output.display(),
        admission = ?config.criteria.admission,
        max_parent_alt_depth = config.criteria.max_parent_alt_depth,
        min_parent_depth = config.criteria.min_parent_depth,
        blacklist = config.criteria.genotype_blacklist.len(),
        "starting de novo calling",
    );

    let (input, column, parents) = open_sources(config)?;

    let stream = smart_reader::open_input(&input)
        .with_context(|| format!("failed to open proband gVCF {}", input.display()))?;
    let mut reader = Reader::new(stream);
    reader
        .read_columns()
        .map_err(|source| CallError::MalformedRecord {
            path: input.clone(),
            source,
        })?;

    let mut writer = DenovoWriter::create(&config.output)
        .with_context(|| format!("failed to create output {}", config.output.display()))?;
    writer
        .write_header()
        .context("failed to write output header")?;

    let mut summary = CallSummary::default();
    while let Some(result) = reader.next() {
        let record = result.map_err(|source| CallError::MalformedRecord {
            path: input.clone(),
            source,
        })?;
        summary.data_records += 1;
        if config.progress_interval > 0 && summary.data_records % config.progress_interval == 0 {
            tracing::info!(
                records = summary.data_records,
                calls = summary.accepted,
                "progress",
            );
        }

        if record.is_reference_block() {
            summary.reference_blocks += 1;
            continue;
        }

        for allele in record.alleles() {
            summary.candidate_alleles += 1;

            let screened = proband::screen(&allele, column).map_err(|kind| {
                CallError::MalformedRecord {
                    path: input.clone(),
                    source: ParseError {
                        line: reader.line_number(),
                        raw: record.fields().join("\t"),
                        kind,
                    },
                }
            })?;
            let evidence = match screened {
                Screen::Candidate(evidence) => evidence,
                Screen::Skip(reason) => {
                    tracing::debug!(site = %record.coordinate(), alt = %allele.alternate, ?reason, "allele skipped");
                    summary.record_skip(reason);
                    continue;
                }
            };

            if let Some(rejection) = config.criteria.screen_proband(&evidence) {
                summary.record_rejection(rejection);
                continue;
            }

            let (father, mother) = parents.summarize(&allele)?;
            if let Some(rejection) = config.criteria.judge_parents(&father, &mother) {
                tracing::debug!(site = %record.coordinate(), alt = %allele.alternate, ?rejection, "allele rejected");
                summary.record_rejection(rejection);
                continue;
            }

            let proband_sample = column
                .sample(&record)
                .map_err(|kind| CallError::MalformedRecord {
                    path: input.clone(),
                    source: ParseError {
                        line: reader.line_number(),
                        raw: record.fields().join("\t"),
                        kind,
                    },
                })?;
            writer
                .write_row(&DenovoRow {
                    sample: &config.sample,
                    allele: &allele,
                    evidence: &evidence,
                    proband_sample,
                    father: &father,
                    mother: &mother,
                })
                .with_context(|| format!("failed to write call to {}", config.output.display()))?;
            summary.accepted += 1;

            tracing::info!(
                site = %record.coordinate(),
                reference = %allele.reference,
                alt = %allele.alternate,
                calls = summary.accepted,
                "de novo candidate",
            );
        }
    }

    tracing::info!(
        records = summary.data_records,
        candidates = summary.candidate_alleles,
        calls = summary.accepted,
        "finished de novo calling",
    );
    Ok(summary)
}

fn open_sources(config: &CallerConfig) -> Result<(PathBuf, ProbandColumn, Parents)> {
    match &config.source {
        TrioSource::Separate {
            proband,
            father,
            mother,
        } => {
            tracing::info!(
                proband = %proband.display(),
                father = %father.display(),
                mother = %mother.display(),
                "separate trio gVCFs",
            );
            let (father, mother) = rayon::join(|| open_parent(father), || open_parent(mother));
            Ok((
                proband.clone(),
                ProbandColumn::Last,
                Parents::Stores {
                    father: father?,
                    mother: mother?,
                },
            ))
        }
        TrioSource::Merged {
            path,
            father_id,
            mother_id,
        } => {
            tracing::info!(trio = %path.display(), father = %father_id, mother = %mother_id, "merged trio gVCF");
            let columns = store::read_columns(path)
                .with_context(|| format!("failed to read header of {}", path.display()))?;
            let locate = |sample: &str| {
                columns
                    .position(sample)
                    .ok_or_else(|| ConfigError::MissingSampleColumn {
                        sample: sample.to_string(),
                        path: path.clone(),
                    })
            };
            let proband = locate(&config.sample)?;
            let parents = Parents::Columns {
                path: path.clone(),
                father: locate(father_id)?,
                mother: locate(mother_id)?,
            };
            Ok((path.clone(), ProbandColumn::Index(proband), parents))
        }
    }
}

fn open_parent(path: &Path) -> Result<Box<dyn RegionQuery>> {
    store::open_store(path).with_context(|| format!("failed to open parent gVCF {}", path.display()))
}
