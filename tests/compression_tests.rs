use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use assert_fs::prelude::*;
use flate2::{Compression, write::GzEncoder};
use gvcf_denovo::{
    AdmissionRule, CallerConfig, Criteria, TrioSource, call_denovos,
    parent::{self, Target},
    store::{self, RegionQuery, TabixStore},
};
use noodles::{bgzf, tabix, vcf};

const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT";

fn write_gz(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    let child = dir.child(name);
    child.write_binary(&encoder.finish().unwrap()).unwrap();
    child.to_path_buf()
}

const INDEXED_META: &str = "##fileformat=VCFv4.2
##INFO=<ID=END,Number=1,Type=Integer,Description=\"Stop position of the interval\">
##INFO=<ID=AS_RAW_MQ,Number=1,Type=String,Description=\"Allele-specific raw RMS mapping quality\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">
##contig=<ID=chr1,length=1000>
";

/// BGZF-compress `content` and write a tabix index next to it.
fn write_indexed(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let child = dir.child(name);
    let mut writer = bgzf::Writer::new(File::create(child.path()).unwrap());
    writer.write_all(content.as_bytes()).unwrap();
    writer.finish().unwrap();

    let index = vcf::index(child.path()).unwrap();
    tabix::write(store::tabix_index_path(child.path()), &index).unwrap();
    child.to_path_buf()
}

fn indexed_parent(sample: &str) -> String {
    format!(
        "{INDEXED_META}#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{sample}\n\
         chr1\t90\t.\tA\t<NON_REF>\t.\t.\tEND=99\tGT:DP\t0/0:25\n\
         chr1\t100\t.\tA\tG,<NON_REF>\t60\t.\tAS_RAW_MQ=1\tGT:AD:DP\t0/0:20,1,0:21\n\
         chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=100\tGT:DP\t0/0:30\n\
         chr1\t101\t.\tC\t<NON_REF>\t.\t.\tEND=500\tGT:DP\t0/0:31\n"
    )
}

fn parent(sample: &str) -> String {
    format!(
        "{HEADER}\t{sample}\n\
         chr2\t1\t.\tA\t<NON_REF>\t.\t.\tEND=499\tGT:DP:GQ\t0/0:22:60\n\
         chr2\t500\t.\tC\tA,<NON_REF>\t60\t.\tAS_RAW_MQ=1\tGT:AD:DP\t0/0:22,1,0:23\n\
         chr2\t501\t.\tA\t<NON_REF>\t.\t.\tEND=1000\tGT:DP:GQ\t0/0:20:60\n"
    )
}

#[test]
fn gzip_inputs_without_index_are_loaded_in_memory() {
    let temp = assert_fs::TempDir::new().unwrap();
    let proband = write_gz(
        &temp,
        "kid.g.vcf.gz",
        &format!(
            "{HEADER}\tkid\n\
             chr2\t500\t.\tC\tA,<NON_REF>\t80\t.\tAS_RAW_MQ=1\tGT:AD:DP:F1R2:F2R1\t0/1:11,9,0:20:5,4,0:6,5,0\n"
        ),
    );
    let father = write_gz(&temp, "dad.g.vcf.gz", &parent("dad"));
    let mother = write_gz(&temp, "mom.g.vcf.gz", &parent("mom"));

    let output = temp.child("calls.tsv");
    let config = CallerConfig {
        sample: "kid".to_string(),
        source: TrioSource::Separate {
            proband,
            father,
            mother,
        },
        criteria: Criteria {
            admission: AdmissionRule::MinAltDepth(5),
            max_parent_alt_depth: 1,
            min_parent_depth: 10,
            genotype_blacklist: HashSet::new(),
        },
        output: output.to_path_buf(),
        progress_interval: 0,
    };

    let summary = call_denovos(&config).unwrap();
    assert_eq!(summary.accepted, 1);

    let text = std::fs::read_to_string(output.path()).unwrap();
    let row: Vec<&str> = text.lines().nth(1).unwrap().split('\t').collect();
    assert_eq!(&row[..5], ["kid", "2", "500", "C", "A"]);
    // Variant line wins over the neighbouring blocks: one alt read, depth 23.
    assert_eq!(row[23], "0/0:22,1,0:23");
}

#[test]
fn gzip_store_answers_block_queries() {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = write_gz(&temp, "dad.g.vcf.gz", &parent("dad"));

    let store = store::open_store(&path).unwrap();
    assert_eq!(store.columns().sample_names(), ["dad"]);
    assert_eq!(store.query("chr2", 250).unwrap().len(), 1);
    assert_eq!(store.query("chr2", 500).unwrap().len(), 1);
    assert!(store.query("chr2", 1001).unwrap().is_empty());
    assert!(store.query("chrUn", 10).unwrap().is_empty());
}

#[test]
fn tabix_store_returns_blocks_covering_interior_bases() {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = write_indexed(&temp, "dad.g.vcf.gz", &indexed_parent("dad"));
    let store = TabixStore::open(&path).unwrap();
    assert_eq!(store.columns().sample_names(), ["dad"]);

    let hits = store.query("chr1", 95).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].starts_with("chr1\t90\t"));

    let hits = store.query("chr1", 250).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].starts_with("chr1\t101\t"));

    assert!(store.query("chr1", 89).unwrap().is_empty());
    assert!(store.query("chr1", 501).unwrap().is_empty());
}

#[test]
fn tabix_store_returns_every_line_at_a_boundary() {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = write_indexed(&temp, "dad.g.vcf.gz", &indexed_parent("dad"));
    let store = store::open_store(&path).unwrap();

    let hits = store.query("chr1", 100).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].contains("AS_RAW_MQ"));
    assert!(hits[1].contains("END=100"));

    let target = Target {
        chromosome: "chr1",
        position: 100,
        alternate: 'G',
    };
    let summary = parent::resolve_from_store(&*store, &target).unwrap();
    assert_eq!(summary.alt_depth, 1);
    assert_eq!(summary.total_depth, 21);
}

#[test]
fn tabix_store_unknown_contig_is_no_coverage() {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = write_indexed(&temp, "dad.g.vcf.gz", &indexed_parent("dad"));
    let store = TabixStore::open(&path).unwrap();

    assert!(store.query("chr2", 100).unwrap().is_empty());
    let target = Target {
        chromosome: "chr2",
        position: 100,
        alternate: 'G',
    };
    assert!(parent::resolve_from_store(&store, &target).unwrap().is_default());
}

#[test]
fn indexed_parents_cover_candidates_inside_blocks() {
    let temp = assert_fs::TempDir::new().unwrap();
    let proband = temp.child("kid.g.vcf");
    proband
        .write_str(&format!(
            "{HEADER}\tkid\n\
             chr1\t250\t.\tC\tT,<NON_REF>\t80\t.\tAS_RAW_MQ=1\tGT:AD:DP:F1R2:F2R1\t0/1:11,9,0:20:5,4,0:6,5,0\n"
        ))
        .unwrap();
    let father = write_indexed(&temp, "dad.g.vcf.gz", &indexed_parent("dad"));
    let mother = write_indexed(&temp, "mom.g.vcf.gz", &indexed_parent("mom"));

    let output = temp.child("calls.tsv");
    let config = CallerConfig {
        sample: "kid".to_string(),
        source: TrioSource::Separate {
            proband: proband.to_path_buf(),
            father,
            mother,
        },
        criteria: Criteria {
            admission: AdmissionRule::MinAltDepth(5),
            max_parent_alt_depth: 1,
            min_parent_depth: 10,
            genotype_blacklist: HashSet::new(),
        },
        output: output.to_path_buf(),
        progress_interval: 0,
    };

    let summary = call_denovos(&config).unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected_parent_depth, 0);

    let text = std::fs::read_to_string(output.path()).unwrap();
    let row: Vec<&str> = text.lines().nth(1).unwrap().split('\t').collect();
    assert_eq!(row[23], "0/0:31");
    assert_eq!(row[25], "0/0:31");
}
