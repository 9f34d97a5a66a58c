//! Pedigree and sample-map tables, and turning them into one trio.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Father/mother id meaning "no parent on record".
pub const NO_PARENT: &str = "0";

/// Fatal configuration problems. Any of these ends the run before scanning.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}:{line}: expected at least {expected} fields")]
    Malformed {
        path: PathBuf,
        line: usize,
        expected: usize,
    },
    #[error("sample {sample} not found in {table}")]
    UnknownSample { sample: String, table: PathBuf },
    #[error("sample {sample} has no recorded parents (father {father}, mother {mother})")]
    Founder {
        sample: String,
        father: String,
        mother: String,
    },
    #[error("missing input: {0}")]
    MissingInput(&'static str),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("sample {sample} has no column in {path}")]
    MissingSampleColumn { sample: String, path: PathBuf },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parents {
    pub father: String,
    pub mother: String,
}

impl Parents {
    pub fn is_founder(&self) -> bool {
        self.father == NO_PARENT || self.mother == NO_PARENT
    }
}

/// sample id -> (father id, mother id), from a plink-style `.ped`/`.fam`.
#[derive(Clone, Debug, Default)]
pub struct Pedigree {
    path: PathBuf,
    relations: HashMap<String, Parents>,
}

impl Pedigree {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = open(path)?;
        Self::parse(BufReader::new(file), path)
    }

    /// Columns: family, sample, father, mother, sex, phenotype. Later rows
    /// for the same sample replace earlier ones.
    pub fn parse<R: BufRead>(reader: R, path: &Path) -> Result<Self, ConfigError> {
        let mut relations = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if skip(&line) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(ConfigError::Malformed {
                    path: path.to_path_buf(),
                    line: i + 1,
                    expected: 4,
                });
            }
            relations.insert(
                fields[1].to_string(),
                Parents {
                    father: fields[2].to_string(),
                    mother: fields[3].to_string(),
                },
            );
        }
        tracing::debug!(path = %path.display(), samples = relations.len(), "loaded pedigree");
        Ok(Self {
            path: path.to_path_buf(),
            relations,
        })
    }

    pub fn parents(&self, sample: &str) -> Result<&Parents, ConfigError> {
        self.relations
            .get(sample)
            .ok_or_else(|| ConfigError::UnknownSample {
                sample: sample.to_string(),
                table: self.path.clone(),
            })
    }

    /// Parents of a sample that must not be a founder.
    pub fn require_parents(&self, sample: &str) -> Result<&Parents, ConfigError> {
        let parents = self.parents(sample)?;
        if parents.is_founder() {
            return Err(ConfigError::Founder {
                sample: sample.to_string(),
                father: parents.father.clone(),
                mother: parents.mother.clone(),
            });
        }
        Ok(parents)
    }
}

/// sample id -> gVCF path, from a two-column tab-separated table.
#[derive(Clone, Debug, Default)]
pub struct SampleMap {
    path: PathBuf,
    locations: HashMap<String, PathBuf>,
}

impl SampleMap {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = open(path)?;
        Self::parse(BufReader::new(file), path)
    }

    pub fn parse<R: BufRead>(reader: R, path: &Path) -> Result<Self, ConfigError> {
        let mut locations = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if skip(&line) {
                continue;
            }
            let mut fields = line.trim_end().split('\t');
            let (Some(sample), Some(location)) = (fields.next(), fields.next()) else {
                return Err(ConfigError::Malformed {
                    path: path.to_path_buf(),
                    line: i + 1,
                    expected: 2,
                });
            };
            locations.insert(sample.to_string(), PathBuf::from(location));
        }
        Ok(Self {
            path: path.to_path_buf(),
            locations,
        })
    }

    pub fn path(&self, sample: &str) -> Result<&Path, ConfigError> {
        self.locations
            .get(sample)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::UnknownSample {
                sample: sample.to_string(),
                table: self.path.clone(),
            })
    }
}

fn open(path: &Path) -> Result<File, ConfigError> {
    File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn skip(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// The family inputs as given on the command line.
#[derive(Clone, Debug, Default)]
pub struct TrioRequest {
    pub sample: String,
    pub pedigree: Option<PathBuf>,
    pub sample_map: Option<PathBuf>,
    pub proband: Option<PathBuf>,
    pub father: Option<PathBuf>,
    pub mother: Option<PathBuf>,
    pub trio: Option<PathBuf>,
    pub father_id: Option<String>,
    pub mother_id: Option<String>,
}

/// Where the three genomes of a trio come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TrioSource {
    /// One gVCF per family member; parents are queried by coordinate.
    Separate {
        proband: PathBuf,
        father: PathBuf,
        mother: PathBuf,
    },
    /// One multi-sample gVCF with a column per family member.
    Merged {
        path: PathBuf,
        father_id: String,
        mother_id: String,
    },
}

impl TrioRequest {
    pub fn resolve(&self) -> Result<TrioSource, ConfigError> {
        let pedigree = self.pedigree.as_deref().map(Pedigree::load).transpose()?;
        let parents = pedigree
            .as_ref()
            .map(|ped| ped.require_parents(&self.sample))
            .transpose()?;

        if let Some(path) = &self.trio {
            let father_id = self
                .father_id
                .clone()
                .or_else(|| parents.map(|p| p.father.clone()))
                .ok_or(ConfigError::MissingInput("--father-id or --ped"))?;
            let mother_id = self
                .mother_id
                .clone()
                .or_else(|| parents.map(|p| p.mother.clone()))
                .ok_or(ConfigError::MissingInput("--mother-id or --ped"))?;
            return Ok(TrioSource::Merged {
                path: path.clone(),
                father_id,
                mother_id,
            });
        }

        let map = self.sample_map.as_deref().map(SampleMap::load).transpose()?;
        let locate = |explicit: &Option<PathBuf>,
                      sample: Option<&str>,
                      what: &'static str|
         -> Result<PathBuf, ConfigError> {
            if let Some(path) = explicit {
                return Ok(path.clone());
            }
            match (&map, sample) {
                (Some(map), Some(sample)) => map.path(sample).map(Path::to_path_buf),
                _ => Err(ConfigError::MissingInput(what)),
            }
        };

        Ok(TrioSource::Separate {
            proband: locate(&self.proband, Some(self.sample.as_str()), "--proband or --sample-map")?,
            father: locate(
                &self.father,
                parents.map(|p| p.father.as_str()),
                "--father or --sample-map with --ped",
            )?,
            mother: locate(
                &self.mother,
                parents.map(|p| p.mother.as_str()),
                "--mother or --sample-map with --ped",
            )?,
        })
    }
}
