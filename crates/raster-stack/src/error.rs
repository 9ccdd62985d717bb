//! Error types for stack construction and chunk execution.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use raster_common::{GeoError, Window};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building or computing a stack.
#[derive(Error, Debug)]
pub enum StackError {
    /// Invalid configuration, raised before any graph exists.
    #[error("configuration error: {0}")]
    Config(String),

    /// An asset's bounds could not be converted to a pixel window.
    #[error("invalid bounds for asset ({item}, {asset}): {source}")]
    Bounds {
        item: usize,
        asset: usize,
        #[source]
        source: GeoError,
    },

    /// A reader could not be instantiated for an asset.
    #[error("failed to create reader for asset ({item}, {asset}): {source}")]
    ReaderInit {
        item: usize,
        asset: usize,
        #[source]
        source: ReadError,
    },

    /// A read failed with an error not classified as missing data.
    #[error("failed to read window {window:?}: {source}")]
    Read {
        window: Window,
        #[source]
        source: ReadError,
    },

    /// A reader returned a block of the wrong shape.
    #[error("reader for {url} returned shape {got:?}, expected {expected:?}")]
    Shape {
        url: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Malformed graph or out-of-range task coordinate.
    #[error("graph error: {0}")]
    Graph(String),

    /// A chunk task failed; wraps the underlying failure with its coordinate.
    #[error("chunk {index:?} failed: {source}")]
    Chunk {
        index: [usize; 4],
        #[source]
        source: Box<StackError>,
    },
}

impl StackError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Graph error.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Attach a chunk coordinate to a task failure.
    pub fn in_chunk(self, index: [usize; 4]) -> Self {
        match self {
            already @ Self::Chunk { .. } => already,
            other => Self::Chunk {
                index,
                source: Box::new(other),
            },
        }
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Category of a reader failure, used to decide whether it counts as
/// missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadErrorKind {
    /// The resource does not exist.
    NotFound,
    /// The resource exists but could not be opened.
    Open,
    /// Pixel data could not be decoded.
    Decode,
    /// Transport or filesystem failure.
    Io,
    /// The read took too long.
    Timeout,
    Other,
}

impl ReadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Open => "open",
            Self::Decode => "decode",
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "not_found" | "notfound" => Ok(Self::NotFound),
            "open" => Ok(Self::Open),
            "decode" => Ok(Self::Decode),
            "io" => Ok(Self::Io),
            "timeout" => Ok(Self::Timeout),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown read error kind '{}'", other)),
        }
    }
}

/// A failure reported by a [`Reader`](crate::reader::Reader).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} error reading {url}: {message}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub url: String,
    pub message: String,
}

impl ReadError {
    pub fn new(kind: ReadErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn not_found(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::NotFound, url, message)
    }

    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::Decode, url, message)
    }
}

/// The set of read failure kinds treated as missing data.
///
/// Reads failing with one of these kinds produce a fill block instead of
/// failing the chunk. Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodataPolicy(BTreeSet<ReadErrorKind>);

impl NodataPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = ReadErrorKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn contains(&self, kind: ReadErrorKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ReadErrorKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromStr for NodataPolicy {
    type Err = String;

    /// Parse a comma-separated list such as `"not_found,decode"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map(Self)
    }
}
