#![no_main]

use gvcf_denovo::{
    parent::{self, Target},
    record::{Columns, DataRecord},
};
use libfuzzer_sys::fuzz_target;

const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tparent";

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let Ok(columns) = Columns::parse(HEADER) else {
        return;
    };
    let lines: Vec<DataRecord> = input
        .lines()
        .filter_map(|line| DataRecord::parse(line, &columns).ok())
        .collect();

    let Some(first) = lines.first() else {
        return;
    };
    let target = Target {
        chromosome: first.chromosome(),
        position: first.position(),
        alternate: 'G',
    };
    if let Ok(summary) = parent::resolve(&lines, &target) {
        if lines.iter().all(|line| line.is_reference_block()) {
            assert_eq!(summary.alt_depth, 0);
        }
    }
});
