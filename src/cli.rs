use std::{collections::HashSet, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    CallSummary, CallerConfig, call_denovos,
    decision::{AdmissionRule, Criteria, default_genotype_blacklist},
    family::{ConfigError, TrioRequest},
    output,
    report::RunReport,
};

/// Written to the log and the output file when the sample has no parents.
pub const FOUNDER_BANNER: &str = "## ERROR! PARENT SAMPLE, UNABLE TO CALL DE NOVOS";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Call candidate de novo SNVs in a proband from trio gVCFs",
    long_about = None,
    group(ArgGroup::new("admission").required(true).args(["min_alt_depth", "min_vaf"])),
)]
struct Cli {
    /// Proband sample id
    #[arg(short, long, value_name = "ID")]
    sample: String,

    /// Plink-style pedigree (family, sample, father, mother, sex, phenotype)
    #[arg(long, value_name = "PED")]
    ped: Option<PathBuf>,

    /// Tab-separated sample id -> gVCF path table
    #[arg(long, value_name = "TSV")]
    sample_map: Option<PathBuf>,

    /// Proband gVCF (overrides the sample map)
    #[arg(long, value_name = "GVCF", conflicts_with = "trio")]
    proband: Option<PathBuf>,

    /// Father gVCF, tabix indexed for fast lookups (overrides the sample map)
    #[arg(long, value_name = "GVCF", conflicts_with = "trio")]
    father: Option<PathBuf>,

    /// Mother gVCF, tabix indexed for fast lookups (overrides the sample map)
    #[arg(long, value_name = "GVCF", conflicts_with = "trio")]
    mother: Option<PathBuf>,

    /// Multi-sample gVCF holding proband, father and mother columns
    #[arg(long, value_name = "GVCF", conflicts_with = "sample_map")]
    trio: Option<PathBuf>,

    /// Father's column in --trio (defaults to the pedigree)
    #[arg(long, value_name = "ID", requires = "trio")]
    father_id: Option<String>,

    /// Mother's column in --trio (defaults to the pedigree)
    #[arg(long, value_name = "ID", requires = "trio")]
    mother_id: Option<String>,

    /// Minimum proband reads supporting the alternate allele
    #[arg(long, value_name = "READS")]
    min_alt_depth: Option<u32>,

    /// Minimum proband variant allele frequency
    #[arg(long, value_name = "FRACTION")]
    min_vaf: Option<f64>,

    /// Maximum alternate-allele reads allowed in either parent
    #[arg(long, value_name = "READS")]
    max_parent_alt_depth: u32,

    /// Minimum total depth required in each parent
    #[arg(long, value_name = "READS")]
    min_parent_depth: u32,

    /// Parent genotypes (GT) that disqualify a call, comma separated
    #[arg(long, value_name = "GT,...", value_delimiter = ',')]
    parent_genotype_blacklist: Vec<String>,

    /// Also reject calls where a parent's GT is a variant genotype (0/1, 1/1, ...)
    #[arg(long)]
    exclude_variant_parent_genotypes: bool,

    /// Output call table (tab separated)
    #[arg(short, long, value_name = "TSV")]
    output: PathBuf,

    /// Skip writing <output stem>_report.json
    #[arg(long)]
    no_report: bool,

    /// Log progress every N data records (0 disables)
    #[arg(long, default_value_t = 10_000)]
    progress_interval: usize,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn trio_request(&self) -> TrioRequest {
        TrioRequest {
            sample: self.sample.clone(),
            pedigree: self.ped.clone(),
            sample_map: self.sample_map.clone(),
            proband: self.proband.clone(),
            father: self.father.clone(),
            mother: self.mother.clone(),
            trio: self.trio.clone(),
            father_id: self.father_id.clone(),
            mother_id: self.mother_id.clone(),
        }
    }

    fn criteria(&self) -> Result<Criteria, ConfigError> {
        let admission = match (self.min_alt_depth, self.min_vaf) {
            (Some(depth), None) => AdmissionRule::MinAltDepth(depth),
            (None, Some(vaf)) if (0.0..=1.0).contains(&vaf) => AdmissionRule::MinVaf(vaf),
            (None, Some(vaf)) => {
                return Err(ConfigError::InvalidOption(format!(
                    "--min-vaf must be within [0, 1], got {vaf}"
                )));
            }
            _ => {
                return Err(ConfigError::InvalidOption(
                    "exactly one of --min-alt-depth or --min-vaf is required".to_string(),
                ));
            }
        };

        let mut genotype_blacklist: HashSet<String> = self
            .parent_genotype_blacklist
            .iter()
            .map(|gt| gt.trim().to_string())
            .filter(|gt| !gt.is_empty())
            .collect();
        if self.exclude_variant_parent_genotypes {
            genotype_blacklist.extend(default_genotype_blacklist());
        }

        Ok(Criteria {
            admission,
            max_parent_alt_depth: self.max_parent_alt_depth,
            min_parent_depth: self.min_parent_depth,
            genotype_blacklist,
        })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let criteria = cli.criteria().map_err(|e| fatal_config(&cli, e))?;
    let source = cli
        .trio_request()
        .resolve()
        .map_err(|e| fatal_config(&cli, e))?;

    let config = CallerConfig {
        sample: cli.sample.clone(),
        source,
        criteria,
        output: cli.output.clone(),
        progress_interval: cli.progress_interval,
    };

    let summary = match call_denovos(&config) {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                tracing::error!("{config_error}");
                print_usage();
            }
            return Err(e);
        }
    };
    print_summary(&summary);

    if !cli.no_report {
        RunReport::new(&config, &summary)
            .write(&config.output)
            .context("failed to write run report")?;
    }

    Ok(())
}

fn fatal_config(cli: &Cli, error: ConfigError) -> anyhow::Error {
    if matches!(error, ConfigError::Founder { .. }) {
        tracing::error!("{FOUNDER_BANNER}");
        if let Err(e) = output::write_fatal(&cli.output, FOUNDER_BANNER) {
            tracing::warn!(output = %cli.output.display(), error = %e, "could not write error banner");
        }
    }
    tracing::error!("{error}");
    print_usage();
    anyhow::Error::new(error)
}

fn print_usage() {
    let mut command = Cli::command();
    println!();
    if let Err(e) = command.print_help() {
        tracing::warn!(error = %e, "could not print usage");
    }
    println!();
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}

fn print_summary(summary: &CallSummary) {
    println!(
        "Processed {records} records ({blocks} reference blocks); evaluated {candidates} candidate alleles.",
        records = summary.data_records,
        blocks = summary.reference_blocks,
        candidates = summary.candidate_alleles,
    );

    if summary.skipped() > 0 {
        println!(
            "Skipped {skipped} alleles: {gt} missing genotypes, {fields} missing fields, {bad} unparseable depths.",
            skipped = summary.skipped(),
            gt = summary.missing_genotype,
            fields = summary.missing_fields,
            bad = summary.unparseable_evidence,
        );
    }

    println!(
        "Rejected {rejected} (homozygous alt {hom}, proband support {weak}, parent alt reads {alt}, parent depth {dp}, parent genotype {gt}).",
        rejected = summary.rejected(),
        hom = summary.rejected_homozygous_alt,
        weak = summary.rejected_proband_evidence,
        alt = summary.rejected_parent_alt_depth,
        dp = summary.rejected_parent_depth,
        gt = summary.rejected_parent_genotype,
    );
    println!("Called {calls} de novo candidates.", calls = summary.accepted);
}
