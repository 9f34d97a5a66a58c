#![no_main]

use gvcf_denovo::record::{self, Columns, Line};
use libfuzzer_sys::fuzz_target;

const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample";

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let Ok(columns) = Columns::parse(HEADER) else {
        return;
    };

    // Must never panic, whatever the line looks like.
    if let Ok(Line::Data(record)) = record::parse_line(&input, Some(&columns)) {
        let alt_count = record.alternate_alleles().len();
        for allele in record.alleles() {
            assert!(allele.allele_index >= 1 && allele.allele_index <= alt_count);
        }
        let _ = record.end();
        let _ = record.genotype_fields(columns.len() - 1);
    }
});
