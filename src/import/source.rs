//! Core types for dump import: page units, input locations and errors

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read buffer used for dump input
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// One page extracted from the dump, before or after namespace filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUnit {
    /// Page title, whitespace-trimmed
    pub title: String,
    /// Raw page body (wikitext), whitespace-trimmed
    pub body: String,
    /// Namespace id, `None` when missing or not numeric
    pub namespace: Option<i32>,
}

impl PageUnit {
    /// Create a new page unit
    pub fn new(title: impl Into<String>, body: impl Into<String>, namespace: Option<i32>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            namespace,
        }
    }
}

/// Dump format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpFormat {
    /// Plain XML
    Xml,
    /// Bzip2-compressed XML (single or multistream)
    Bzip2Xml,
}

impl DumpFormat {
    /// Detect format from file path
    pub fn detect(path: &Path) -> Self {
        let is_bz2 = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("bz2"))
            .unwrap_or(false);

        if is_bz2 {
            DumpFormat::Bzip2Xml
        } else {
            DumpFormat::Xml
        }
    }
}

/// Where the dump is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLocation {
    /// A file on disk
    Path(PathBuf),
    /// Standard input
    Stdin,
}

impl InputLocation {
    /// Interpret a CLI/config path; `-` means standard input
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            InputLocation::Stdin
        } else {
            InputLocation::Path(path.to_path_buf())
        }
    }

    /// Open the input as a buffered byte stream, decompressing bzip2 files
    pub fn open(&self) -> Result<Box<dyn BufRead + Send>, ImportError> {
        match self {
            InputLocation::Stdin => Ok(Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                io::stdin(),
            ))),
            InputLocation::Path(path) => {
                let file = File::open(path).map_err(|e| ImportError::Open {
                    path: path.clone(),
                    source: e,
                })?;

                match DumpFormat::detect(path) {
                    DumpFormat::Bzip2Xml => Ok(Box::new(BufReader::with_capacity(
                        READ_BUFFER_SIZE,
                        MultiBzDecoder::new(file),
                    ))),
                    DumpFormat::Xml => Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))),
                }
            }
        }
    }

    /// Name used in log lines
    pub fn display_name(&self) -> String {
        match self {
            InputLocation::Stdin => "<stdin>".to_string(),
            InputLocation::Path(path) => path.display().to_string(),
        }
    }
}

/// Where JSON lines are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    /// A file on disk, created or truncated
    Path(PathBuf),
    /// Standard output
    Stdout,
}

impl OutputLocation {
    /// Interpret a CLI/config path; `-` means standard output
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            OutputLocation::Stdout
        } else {
            OutputLocation::Path(path.to_path_buf())
        }
    }

    /// Name used in log lines
    pub fn display_name(&self) -> String {
        match self {
            OutputLocation::Stdout => "<stdout>".to_string(),
            OutputLocation::Path(path) => path.display().to_string(),
        }
    }
}

/// Errors that can occur during import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error at byte {position}: {message}")]
    XmlParse { position: usize, message: String },

    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("record encoding failed for '{title}': {reason}")]
    Encode { title: String, reason: String },

    #[error("pipeline closed: no consumer left for {0}")]
    PipelineClosed(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task failed: {0}")]
    Task(String),
}
