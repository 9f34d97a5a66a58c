//! Reduce a parent's gVCF lines at one base to a single depth summary.

use serde::Serialize;

use crate::record::{self, Columns, DataRecord, GenotypeFields, ParseErrorKind};
use crate::store::RegionQuery;

const NA: &str = "NA";

/// What a parent's gVCF says about one candidate allele.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DepthSummary {
    pub total_depth: u32,
    pub alt_depth: u32,
    /// Raw sample column of the line the summary was taken from.
    pub genotype: String,
    /// FORMAT string of the same line.
    pub format: String,
}

impl Default for DepthSummary {
    fn default() -> Self {
        Self {
            total_depth: 0,
            alt_depth: 0,
            genotype: NA.to_string(),
            format: NA.to_string(),
        }
    }
}

impl DepthSummary {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The `GT` subfield of [`Self::genotype`], looked up through [`Self::format`].
    pub fn gt(&self) -> Option<&str> {
        let index = self.format.split(':').position(|key| key == "GT")?;
        self.genotype.split(':').nth(index)
    }
}

/// The base and allele a parent is being asked about.
#[derive(Clone, Copy, Debug)]
pub struct Target<'a> {
    pub chromosome: &'a str,
    pub position: u64,
    pub alternate: char,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
enum Evidence {
    ReferenceBlock,
    Variant,
}

/// Resolve lines overlapping `target` into one [`DepthSummary`].
///
/// Every line is evaluated. A variant line describing the exact base wins
/// over a reference block; among lines of the same kind the last one wins.
/// Lines without a called genotype, and lines that describe neither, yield
/// nothing. With no applicable line at all the default "no information"
/// summary is returned. Unparseable `DP` or `AD` values count as zero.
pub fn resolve(lines: &[DataRecord], target: &Target<'_>) -> Result<DepthSummary, ParseErrorKind> {
    let mut best: Option<(Evidence, DepthSummary)> = None;

    for line in lines {
        let Some(candidate) = evaluate_line(line, target)? else {
            continue;
        };
        let replace = best
            .as_ref()
            .is_none_or(|(kind, _)| candidate.0 >= *kind);
        if replace {
            best = Some(candidate);
        }
    }

    Ok(best.map(|(_, summary)| summary).unwrap_or_default())
}

fn evaluate_line(
    line: &DataRecord,
    target: &Target<'_>,
) -> Result<Option<(Evidence, DepthSummary)>, ParseErrorKind> {
    let fields = GenotypeFields::parse(line.format(), line.last_sample())?;
    let summary = |alt_depth: u32, total_depth: u32| DepthSummary {
        total_depth,
        alt_depth,
        genotype: line.last_sample().to_string(),
        format: line.format().to_string(),
    };

    if fields.is_missing_genotype() {
        return Ok(None);
    }

    if line.is_reference_block() {
        let depth = depth_or_zero(fields.depth.as_deref());
        return Ok(Some((Evidence::ReferenceBlock, summary(0, depth))));
    }

    if !line.is_variant_evidence() {
        return Ok(None);
    }
    if fields.genotype.is_none() || fields.allele_depths.is_none() || fields.depth.is_none() {
        return Ok(None);
    }
    if line.chromosome() != target.chromosome || line.position() != target.position {
        return Ok(None);
    }

    let alternate = target.alternate.to_string();
    let depth = depth_or_zero(fields.depth.as_deref());
    let found = line
        .alternate_alleles()
        .iter()
        .position(|allele| allele.eq_ignore_ascii_case(&alternate));

    match found {
        // Allele order is the parent's own, not the proband's.
        Some(i) => {
            let alt_depth = fields
                .allele_depths
                .as_deref()
                .and_then(|ad| record::list_entry(ad, i + 1))
                .map(|raw| depth_or_zero(Some(raw)))
                .unwrap_or(0);
            Ok(Some((Evidence::Variant, summary(alt_depth, depth))))
        }
        None => Ok(Some((Evidence::Variant, summary(0, depth)))),
    }
}

fn depth_or_zero(raw: Option<&str>) -> u32 {
    raw.and_then(|value| record::parse_depth(value).ok())
        .unwrap_or(0)
}

/// Query `store` for `target` and resolve the result.
///
/// A failed lookup degrades to the default summary; a malformed line
/// returned by the store does not.
pub fn resolve_from_store(
    store: &dyn RegionQuery,
    target: &Target<'_>,
) -> Result<DepthSummary, ParseErrorKind> {
    let raw = match store.query(target.chromosome, target.position) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(
                store = %store.path().display(),
                chromosome = target.chromosome,
                position = target.position,
                error = %e,
                "parent lookup failed; treating as no coverage",
            );
            return Ok(DepthSummary::default());
        }
    };

    let lines = parse_lines(&raw, store.columns())?;
    resolve(&lines, target)
}

fn parse_lines(raw: &[String], columns: &Columns) -> Result<Vec<DataRecord>, ParseErrorKind> {
    raw.iter()
        .map(|line| DataRecord::parse(line, columns))
        .collect()
}

/// Summary for a parent whose genotype sits in the same (merged) line as
/// the proband's, so the proband's allele index applies directly.
pub fn summarize_column(
    line: &DataRecord,
    column: usize,
    allele_index: usize,
) -> Result<DepthSummary, ParseErrorKind> {
    let sample = line
        .sample(column)
        .ok_or(ParseErrorKind::MissingSampleColumn(column))?;
    let fields = GenotypeFields::parse(line.format(), sample)?;
    if fields.is_missing_genotype() {
        return Ok(DepthSummary::default());
    }
    let (Some(ad), Some(dp)) = (fields.allele_depths.as_deref(), fields.depth.as_deref()) else {
        return Ok(DepthSummary::default());
    };

    Ok(DepthSummary {
        total_depth: depth_or_zero(Some(dp)),
        alt_depth: depth_or_zero(record::list_entry(ad, allele_index)),
        genotype: sample.to_string(),
        format: line.format().to_string(),
    })
}
