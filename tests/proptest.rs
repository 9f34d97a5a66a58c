use std::collections::HashSet;
use std::io::Cursor;

use gvcf_denovo::{
    AdmissionRule, Criteria, DepthSummary, ProbandEvidence,
    output::{DenovoRow, strip_chr},
    parent::{self, Target},
    proband::{self, ProbandColumn, Screen},
    record::{self, Columns, DataRecord, NON_REF},
};
use proptest::prelude::*;

const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts";

fn columns() -> Columns {
    Columns::parse(HEADER).unwrap()
}

fn allele() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["A", "C", "G", "T", "a", "*", "AT", "CTG", "<DEL>", "."])
        .prop_map(String::from)
}

fn summary() -> impl Strategy<Value = DepthSummary> {
    (0u32..60, 0u32..10, prop::sample::select(vec!["0/0", "0/1", "1/1", "./."])).prop_map(
        |(total_depth, alt_depth, gt)| DepthSummary {
            total_depth,
            alt_depth,
            genotype: format!("{gt}:{total_depth}"),
            format: "GT:DP".to_string(),
        },
    )
}

proptest! {
    #[test]
    fn reader_handles_arbitrary_input(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let reader = record::Reader::new(Cursor::new(data));
        for result in reader {
            let _ = result;
        }
    }

    #[test]
    fn decomposition_keeps_single_bases_in_alt_order(alts in proptest::collection::vec(allele(), 1..6)) {
        let alt = format!("{},{NON_REF}", alts.join(","));
        let line = format!("chr1\t10\t.\tA\t{alt}\t.\t.\tAS_RAW_MQ=1\tGT\t0/1");
        let record = DataRecord::parse(&line, &columns()).unwrap();

        let expected: Vec<(char, usize)> = alts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.len() == 1 && a.as_str() != "*" && a.as_str() != ".")
            .map(|(i, a)| (a.chars().next().unwrap().to_ascii_uppercase(), i + 1))
            .collect();
        let found: Vec<(char, usize)> = record
            .alleles()
            .map(|a| (a.alternate, a.allele_index))
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn reference_blocks_never_carry_alt_reads(
        start in 1u64..1000,
        span in 0u64..1000,
        depth in 0u32..500,
        alt in prop::sample::select(vec!['A', 'C', 'G', 'T']),
    ) {
        let end = start + span;
        let line = format!("chr1\t{start}\t.\tA\t<NON_REF>\t.\t.\tEND={end}\tGT:DP\t0/0:{depth}");
        let record = DataRecord::parse(&line, &columns()).unwrap();
        let target = Target { chromosome: "chr1", position: start, alternate: alt };
        let summary = parent::resolve(&[record], &target).unwrap();
        prop_assert_eq!(summary.alt_depth, 0);
        prop_assert_eq!(summary.total_depth, depth);
    }

    #[test]
    fn no_overlap_means_no_information(position in 1u64..1_000_000) {
        let target = Target { chromosome: "chr1", position, alternate: 'G' };
        prop_assert_eq!(parent::resolve(&[], &target).unwrap(), DepthSummary::default());
    }

    #[test]
    fn verdict_is_pure(
        ref_depth in 0u32..40,
        alt_depth in 0u32..40,
        father in summary(),
        mother in summary(),
        use_vaf in any::<bool>(),
        blacklist in any::<bool>(),
    ) {
        let evidence = ProbandEvidence {
            ref_depth,
            alt_depth,
            total_depth: ref_depth + alt_depth,
            ..ProbandEvidence::default()
        };
        let criteria = Criteria {
            admission: if use_vaf { AdmissionRule::MinVaf(0.25) } else { AdmissionRule::MinAltDepth(5) },
            max_parent_alt_depth: 1,
            min_parent_depth: 10,
            genotype_blacklist: if blacklist {
                gvcf_denovo::decision::default_genotype_blacklist()
            } else {
                HashSet::new()
            },
        };
        let first = criteria.evaluate(&evidence, &father, &mother);
        let second = criteria.evaluate(&evidence, &father, &mother);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rows_reconstruct_from_record_and_index(
        chrom in prop::sample::select(vec!["chr1", "chrX", "2", "chrUn_KI270742v1"]),
        pos in 1u64..10_000_000,
        reference in prop::sample::select(vec!['A', 'C', 'G', 'T']),
        alts in proptest::collection::vec(prop::sample::select(vec!["A", "C", "G", "T", "*"]), 1..4),
    ) {
        let n = alts.len() + 2;
        let counts = |v: u32| vec![v.to_string(); n].join(",");
        let line = format!(
            "{chrom}\t{pos}\t.\t{reference}\t{},{NON_REF}\t.\t.\tAS_RAW_MQ=1\tGT:AD:DP:F1R2:F2R1\t0/1:{}:40:{}:{}",
            alts.join(","),
            counts(7),
            counts(3),
            counts(4),
        );
        let record = DataRecord::parse(&line, &columns()).unwrap();
        let parent = DepthSummary::default();

        for allele in record.alleles() {
            let Screen::Candidate(evidence) = proband::screen(&allele, ProbandColumn::Last).unwrap() else {
                return Err(TestCaseError::fail("complete evidence was skipped"));
            };
            let row = DenovoRow {
                sample: "s",
                allele: &allele,
                evidence: &evidence,
                proband_sample: record.last_sample(),
                father: &parent,
                mother: &parent,
            }
            .format();
            let fields: Vec<&str> = row.split('\t').collect();

            let listed_alts: Vec<&str> = fields[16].split(',').collect();
            prop_assert_eq!(fields[1], strip_chr(fields[12]));
            prop_assert_eq!(fields[2], fields[13]);
            prop_assert_eq!(fields[3], fields[15]);
            prop_assert_eq!(fields[4], listed_alts[allele.allele_index - 1]);
        }
    }
}
