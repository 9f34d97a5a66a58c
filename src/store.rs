//! Coordinate-indexed access to a parent's gVCF.
//!
//! The caller only ever asks one question of a parent store: which lines
//! overlap this single base? Two backends answer it:
//!
//! * [`TabixStore`] for BGZF files with a `.tbi` index. The index picks
//!   the BGZF chunks; the lines inside them are filtered here against each
//!   record's `END`, since reference blocks span many bases.
//! * [`MemoryStore`] for anything else (plain text or ordinary gzip). It
//!   loads the file once into per-contig interval tables and answers by
//!   binary search.
//!
//! Both expose the store's `#CHROM` header separately from the data so the
//! returned lines can be parsed against the right columns.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

use lru::LruCache;
use noodles::{
    bgzf,
    core::{Position, Region},
    csi::{self, BinningIndex},
    tabix,
};
use parking_lot::Mutex;
use thiserror::Error;

use crate::record::{self, Columns, DataRecord, Reader};
use crate::smart_reader;

const QUERY_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: record::ParseError,
    },
    #[error("{path} is not coordinate sorted: {chromosome}:{position} follows {previous}")]
    Unsorted {
        path: PathBuf,
        chromosome: String,
        position: u64,
        previous: String,
    },
}

/// Retrieval of every record overlapping one base.
pub trait RegionQuery: Send + Sync {
    fn path(&self) -> &Path;

    /// Column header of the store, independent of any query.
    fn columns(&self) -> &Columns;

    /// Raw data lines overlapping `chromosome:position`, in file order.
    /// An empty result means no coverage, not an error.
    fn query(&self, chromosome: &str, position: u64) -> Result<Vec<String>, StoreError>;
}

impl<T: RegionQuery + ?Sized> RegionQuery for Box<T> {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn columns(&self) -> &Columns {
        (**self).columns()
    }

    fn query(&self, chromosome: &str, position: u64) -> Result<Vec<String>, StoreError> {
        (**self).query(chromosome, position)
    }
}

/// Open the best available store for `path`.
pub fn open_store(path: &Path) -> Result<Box<dyn RegionQuery>, StoreError> {
    let index = tabix_index_path(path);
    if index.exists() {
        tracing::info!(path = %path.display(), "using tabix index");
        Ok(Box::new(TabixStore::open(path)?))
    } else {
        tracing::warn!(
            path = %path.display(),
            "no tabix index found, loading parent gVCF into memory",
        );
        Ok(Box::new(MemoryStore::load(path)?))
    }
}

pub fn tabix_index_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tbi");
    PathBuf::from(s)
}

/// Read the `#CHROM` header of a gVCF without touching its data.
pub fn read_columns(path: &Path) -> Result<Columns, StoreError> {
    let input = smart_reader::open_input(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = Reader::new(input);
    reader
        .read_columns()
        .cloned()
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn overlaps(record: &DataRecord, chromosome: &str, position: u64) -> bool {
    record.chromosome() == chromosome && record.position() <= position && position <= record.end()
}

type Fetch = Box<dyn FnMut(&Region) -> io::Result<Vec<String>> + Send>;

/// Tabix-backed store over a BGZF-compressed gVCF.
pub struct TabixStore {
    path: PathBuf,
    columns: Columns,
    fetch: Mutex<Fetch>,
    cache: Mutex<LruCache<(String, u64), Arc<Vec<String>>>>,
}

impl TabixStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let columns = read_columns(path)?;
        let io_error = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let index = tabix::read(tabix_index_path(path)).map_err(io_error)?;
        let mut reader = File::open(path).map(bgzf::Reader::new).map_err(io_error)?;

        let fetch: Fetch = Box::new(move |region: &Region| {
            let Some(id) = index
                .header()
                .and_then(|header| header.reference_sequence_names().get_index_of(region.name()))
            else {
                return Ok(Vec::new());
            };
            let chunks = index.query(id, region.interval())?;
            csi::io::Query::new(&mut reader, chunks)
                .lines()
                .filter(|line| !matches!(line, Ok(l) if l.is_empty() || l.starts_with('#')))
                .collect()
        });

        let capacity = NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            fetch: Mutex::new(fetch),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }
}

impl RegionQuery for TabixStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn query(&self, chromosome: &str, position: u64) -> Result<Vec<String>, StoreError> {
        let cache_key = (chromosome.to_string(), position);
        if let Some(lines) = self.cache.lock().get(&cache_key) {
            return Ok(Vec::clone(lines));
        }

        let Some(start) = usize::try_from(position).ok().and_then(Position::new) else {
            return Ok(Vec::new());
        };
        let region = Region::new(chromosome.to_string(), start..=start);

        let raw = {
            let mut fetch = self.fetch.lock();
            (*fetch)(&region)
        }
        .map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        // Chunks are bin-granular; keep the lines that really cover the base.
        let mut lines = Vec::with_capacity(raw.len());
        for line in raw {
            let record = DataRecord::parse(&line, &self.columns).map_err(|kind| {
                StoreError::Parse {
                    path: self.path.clone(),
                    source: record::ParseError {
                        line: 0,
                        raw: line.clone(),
                        kind,
                    },
                }
            })?;
            if overlaps(&record, chromosome, position) {
                lines.push(line);
            }
        }

        let lines = Arc::new(lines);
        self.cache.lock().put(cache_key, Arc::clone(&lines));
        Ok(Vec::clone(&lines))
    }
}

#[derive(Debug, Default)]
struct ContigTable {
    starts: Vec<u64>,
    ends: Vec<u64>,
    /// Running maximum of `ends`; lets a lookup stop walking left early.
    reach: Vec<u64>,
    lines: Vec<String>,
}

impl ContigTable {
    fn push(&mut self, start: u64, end: u64, line: String) {
        let reach = self.reach.last().copied().unwrap_or(0).max(end);
        self.starts.push(start);
        self.ends.push(end);
        self.reach.push(reach);
        self.lines.push(line);
    }

    fn overlapping(&self, position: u64) -> Vec<String> {
        let upper = self.starts.partition_point(|&start| start <= position);
        let mut hits = Vec::new();
        for i in (0..upper).rev() {
            if self.reach[i] < position {
                break;
            }
            if self.ends[i] >= position {
                hits.push(self.lines[i].clone());
            }
        }
        hits.reverse();
        hits
    }
}

/// Whole-file store with per-contig sorted interval tables.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    columns: Columns,
    contigs: HashMap<String, ContigTable>,
}

impl MemoryStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let input = smart_reader::open_input(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = Reader::new(input);
        let columns = reader.read_columns().map_err(parse_error)?.clone();

        let mut contigs: HashMap<String, ContigTable> = HashMap::new();
        let mut current: Option<(String, u64)> = None;
        let mut count = 0usize;

        for result in reader {
            let record = result.map_err(parse_error)?;
            let chromosome = record.chromosome();
            let start = record.position();

            let in_order = match &current {
                Some((name, last)) if name == chromosome => start >= *last,
                // A contig may only appear as one contiguous run.
                Some(_) | None => !contigs.contains_key(chromosome),
            };
            if !in_order {
                let previous = current
                    .as_ref()
                    .map(|(name, last)| format!("{name}:{last}"))
                    .unwrap_or_default();
                return Err(StoreError::Unsorted {
                    path: path.to_path_buf(),
                    chromosome: chromosome.to_string(),
                    position: start,
                    previous,
                });
            }

            let end = record.end().max(start);
            contigs
                .entry(chromosome.to_string())
                .or_default()
                .push(start, end, record.fields().join("\t"));
            current = Some((chromosome.to_string(), start));
            count += 1;
        }

        tracing::info!(
            path = %path.display(),
            records = count,
            contigs = contigs.len(),
            "loaded parent gVCF",
        );

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            contigs,
        })
    }
}

impl RegionQuery for MemoryStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn query(&self, chromosome: &str, position: u64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .contigs
            .get(chromosome)
            .map(|table| table.overlapping(position))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GVCF: &str = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tdad
chr1\t90\t.\tA\t<NON_REF>\t.\t.\tEND=99\tGT:DP\t0/0:25
chr1\t100\t.\tA\tG,<NON_REF>\t.\t.\tAS_RAW_MQ=1\tGT:AD:DP\t0/1:12,9,0:21
chr1\t100\t.\tA\t<NON_REF>\t.\t.\tEND=100\tGT:DP\t0/0:30
chr1\t101\t.\tC\t<NON_REF>\t.\t.\tEND=500\tGT:DP\t0/0:31
chr2\t5\t.\tT\t<NON_REF>\t.\t.\tEND=8\tGT:DP\t0/0:10
";

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dad.g.vcf");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn finds_block_covering_base() {
        let (_dir, path) = write(GVCF);
        let store = MemoryStore::load(&path).unwrap();
        let hits = store.query("chr1", 250).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("chr1\t101\t"));
    }

    #[test]
    fn returns_every_line_at_a_block_boundary() {
        let (_dir, path) = write(GVCF);
        let store = MemoryStore::load(&path).unwrap();
        let hits = store.query("chr1", 100).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("AS_RAW_MQ"));
        assert!(hits[1].contains("END=100"));
    }

    #[test]
    fn uncovered_base_is_empty() {
        let (_dir, path) = write(GVCF);
        let store = MemoryStore::load(&path).unwrap();
        assert!(store.query("chr1", 89).unwrap().is_empty());
        assert!(store.query("chr1", 501).unwrap().is_empty());
        assert!(store.query("chrX", 100).unwrap().is_empty());
        assert_eq!(store.query("chr2", 8).unwrap().len(), 1);
    }

    #[test]
    fn header_is_available_without_querying() {
        let (_dir, path) = write(GVCF);
        let store = MemoryStore::load(&path).unwrap();
        assert_eq!(store.columns().sample_names(), ["dad"]);
        assert_eq!(read_columns(&path).unwrap(), *store.columns());
    }

    #[test]
    fn rejects_unsorted_input() {
        let unsorted = GVCF.replace("chr2\t5", "chr1\t5");
        let (_dir, path) = write(&unsorted);
        let err = MemoryStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Unsorted { position: 5, .. }));
    }

    #[test]
    fn falls_back_to_memory_without_index() {
        let (_dir, path) = write(GVCF);
        let store = open_store(&path).unwrap();
        assert_eq!(store.query("chr1", 95).unwrap().len(), 1);
    }

    #[test]
    fn index_path_appends_extension() {
        assert_eq!(
            tabix_index_path(Path::new("/data/dad.g.vcf.gz")),
            PathBuf::from("/data/dad.g.vcf.gz.tbi")
        );
    }
}
