//! Record-file readers.
//!
//! Both formats produce a [`KindData`]: the scheme, the default table and the
//! raw records, before any type resolution.

pub mod csv;
pub mod yaml;

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::schema::KindData;

/// Errors raised while reading a record file.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("can not open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid tabular file: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("unknown file format '{0}', expected yaml, csv or tsv")]
    UnknownFormat(String),
}

/// Record-file and export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Csv,
    Tsv,
}

impl Format {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "csv" => Some(Format::Csv),
            "tsv" => Some(Format::Tsv),
            _ => None,
        }
    }

    /// Field delimiter of the tabular formats.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            Format::Yaml => None,
            Format::Csv => Some(b','),
            Format::Tsv => Some(b'\t'),
        }
    }
}

impl FromStr for Format {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            _ => Err(ReadError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Csv => write!(f, "csv"),
            Format::Tsv => write!(f, "tsv"),
        }
    }
}

/// Reads a record file. Without an explicit format it is taken from the
/// extension, falling back to YAML.
pub fn read_file(path: &Path, format: Option<Format>) -> Result<KindData, ReadError> {
    let format = format
        .or_else(|| Format::from_path(path))
        .unwrap_or_default();
    debug!(path = %path.display(), %format, "reading record file");

    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match format.delimiter() {
        None => self::yaml::read(reader),
        Some(delimiter) => self::csv::read(reader, delimiter),
    }
}
