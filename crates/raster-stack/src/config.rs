//! Configuration for stack construction.

use raster_common::FillValue;
use serde::{Deserialize, Serialize};

use crate::error::{NodataPolicy, Result, StackError};
use crate::types::{LayeredEnv, Resampling};

/// Default chunk edge length along rows and cols.
pub const DEFAULT_CHUNKSIZE: usize = 1024;

/// Configuration shared by every reader and task of one stack.
///
/// The output dtype is not stored here: it is the element type the stack is
/// built for, and `fill_value` is checked against it at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Chunking of the row/col axes. Item and asset axes are always 1.
    pub chunksize: ChunkSpec,

    /// Resampling method handed to readers.
    pub resampling: Resampling,

    /// Value used wherever no asset data exists.
    pub fill_value: FillValue,

    /// Apply scale/offset metadata while reading.
    pub rescale: bool,

    /// Read failure kinds converted to fill instead of failing the chunk.
    pub errors_as_nodata: NodataPolicy,

    /// Native-library environment overrides for readers.
    pub env: Option<LayeredEnv>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            chunksize: ChunkSpec::uniform(DEFAULT_CHUNKSIZE),
            resampling: Resampling::Nearest,
            fill_value: FillValue::nan(),
            rescale: true,
            errors_as_nodata: NodataPolicy::default(),
            env: None,
        }
    }
}

impl StackConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable variables leave the default in place.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`from_env`](Self::from_env) over an explicit variable list.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut config = Self::default();
        let mut env = LayeredEnv::default();

        for (key, val) in vars {
            match key.as_str() {
                "STACK_CHUNKSIZE" => {
                    if let Ok(spec) = val.parse() {
                        config.chunksize = spec;
                    }
                }
                "STACK_RESAMPLING" => {
                    if let Some(r) = Resampling::parse(&val) {
                        config.resampling = r;
                    }
                }
                "STACK_FILL_VALUE" => {
                    if let Ok(fill) = val.parse() {
                        config.fill_value = fill;
                    }
                }
                "STACK_RESCALE" => {
                    match val.trim().to_lowercase().as_str() {
                        "true" | "1" => config.rescale = true,
                        "false" | "0" => config.rescale = false,
                        _ => {}
                    }
                }
                "STACK_ERRORS_AS_NODATA" => {
                    if let Ok(policy) = val.parse() {
                        config.errors_as_nodata = policy;
                    }
                }
                _ => {
                    if let Some(name) = key.strip_prefix("STACK_ENV_") {
                        env.always.insert(name.to_string(), val);
                    }
                }
            }
        }

        if env != LayeredEnv::default() {
            config.env = Some(env);
        }
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.chunksize.validate()
    }

    pub fn with_chunksize(mut self, chunksize: ChunkSpec) -> Self {
        self.chunksize = chunksize;
        self
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_rescale(mut self, rescale: bool) -> Self {
        self.rescale = rescale;
        self
    }

    pub fn with_fill_value(mut self, fill_value: FillValue) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_errors_as_nodata(mut self, policy: NodataPolicy) -> Self {
        self.errors_as_nodata = policy;
        self
    }

    pub fn with_env(mut self, env: LayeredEnv) -> Self {
        self.env = Some(env);
        self
    }
}

/// Chunking along a single axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AxisChunks {
    /// Regular chunks of this size; the last one may be smaller.
    Size(usize),
    /// One chunk spanning the whole axis (written `-1`).
    Full,
    /// Explicit chunk sizes, which must sum to the axis length.
    Explicit(Vec<usize>),
}

impl AxisChunks {
    fn validate(&self, axis: &str) -> Result<()> {
        match self {
            Self::Size(0) => Err(StackError::config(format!(
                "{} chunk size must be > 0",
                axis
            ))),
            Self::Explicit(sizes) if sizes.is_empty() => Err(StackError::config(format!(
                "{} explicit chunks must not be empty",
                axis
            ))),
            _ => Ok(()),
        }
    }

    fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.trim().parse::<i64>() {
            Ok(-1) => Ok(Self::Full),
            Ok(n) if n > 0 => Ok(Self::Size(n as usize)),
            _ => Err(format!("invalid chunk size '{}'", s)),
        }
    }
}

/// Chunking of the row and col axes.
///
/// Serialized the way chunk arguments are usually written: `1024`, `-1`,
/// `[512, -1]`, or per-axis explicit lists `[[600, 424], 1024]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChunkRepr", into = "ChunkRepr")]
pub struct ChunkSpec {
    pub rows: AxisChunks,
    pub cols: AxisChunks,
}

impl ChunkSpec {
    /// Same regular chunk size on both axes.
    pub fn uniform(size: usize) -> Self {
        Self {
            rows: AxisChunks::Size(size),
            cols: AxisChunks::Size(size),
        }
    }

    pub fn per_axis(rows: AxisChunks, cols: AxisChunks) -> Self {
        Self { rows, cols }
    }

    pub fn validate(&self) -> Result<()> {
        self.rows.validate("row")?;
        self.cols.validate("col")
    }
}

impl std::str::FromStr for ChunkSpec {
    type Err = String;

    /// `"1024"`, `"-1"`, or `"rows,cols"` such as `"512,-1"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(',') {
            Some((rows, cols)) => Ok(Self::per_axis(
                AxisChunks::parse(rows)?,
                AxisChunks::parse(cols)?,
            )),
            None => {
                let axis = AxisChunks::parse(s)?;
                Ok(Self::per_axis(axis.clone(), axis))
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AxisRepr {
    Size(i64),
    Explicit(Vec<usize>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChunkRepr {
    Uniform(i64),
    PerAxis(AxisRepr, AxisRepr),
}

impl TryFrom<AxisRepr> for AxisChunks {
    type Error = String;

    fn try_from(repr: AxisRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            AxisRepr::Size(n) => AxisChunks::parse(&n.to_string()),
            AxisRepr::Explicit(sizes) => Ok(AxisChunks::Explicit(sizes)),
        }
    }
}

impl From<AxisChunks> for AxisRepr {
    fn from(axis: AxisChunks) -> Self {
        match axis {
            AxisChunks::Size(n) => AxisRepr::Size(n as i64),
            AxisChunks::Full => AxisRepr::Size(-1),
            AxisChunks::Explicit(sizes) => AxisRepr::Explicit(sizes),
        }
    }
}

impl TryFrom<ChunkRepr> for ChunkSpec {
    type Error = String;

    fn try_from(repr: ChunkRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ChunkRepr::Uniform(n) => {
                let axis = AxisChunks::parse(&n.to_string())?;
                Ok(Self::per_axis(axis.clone(), axis))
            }
            ChunkRepr::PerAxis(rows, cols) => {
                Ok(Self::per_axis(rows.try_into()?, cols.try_into()?))
            }
        }
    }
}

impl From<ChunkSpec> for ChunkRepr {
    fn from(spec: ChunkSpec) -> Self {
        match (&spec.rows, &spec.cols) {
            (AxisChunks::Size(a), AxisChunks::Size(b)) if a == b => ChunkRepr::Uniform(*a as i64),
            (AxisChunks::Full, AxisChunks::Full) => ChunkRepr::Uniform(-1),
            _ => ChunkRepr::PerAxis(spec.rows.into(), spec.cols.into()),
        }
    }
}
