//! Output element types and fill-value compatibility.
//!
//! A stack's fill value has to survive the trip into the output dtype
//! unchanged. The rules mirror a "safe" scalar cast:
//!
//! - integer fills fit any float dtype, and integer dtypes whose range holds them
//! - float fills never go into integer dtypes (even `1.0`)
//! - float fills go into `f32` when NaN, infinite, or within `f32`'s range

use std::fmt;
use std::str::FromStr;

use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Runtime tag for an output element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Size of one element in bytes.
    pub fn itemsize(&self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Inclusive integer range, `None` for float dtypes.
    fn int_range(&self) -> Option<(i128, i128)> {
        match self {
            Self::Uint8 => Some((0, u8::MAX as i128)),
            Self::Uint16 => Some((0, u16::MAX as i128)),
            Self::Uint32 => Some((0, u32::MAX as i128)),
            Self::Uint64 => Some((0, u64::MAX as i128)),
            Self::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::Float32 | Self::Float64 => None,
        }
    }

    /// Whether `fill` can be represented in this dtype without an unsafe cast.
    pub fn can_hold(&self, fill: FillValue) -> bool {
        match (fill, self.int_range()) {
            (FillValue::Int(v), Some((lo, hi))) => (lo..=hi).contains(&(v as i128)),
            // Integers must survive the round trip through the float type
            (FillValue::Int(v), None) => match self {
                Self::Float32 => (v as f32) as i128 == v as i128,
                _ => (v as f64) as i128 == v as i128,
            },
            (FillValue::Float(_), Some(_)) => false,
            (FillValue::Float(v), None) => match self {
                Self::Float32 => !v.is_finite() || v.abs() <= f32::MAX as f64,
                _ => true,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        Self::Float64
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "uint8" | "u8" => Self::Uint8,
            "uint16" | "u16" => Self::Uint16,
            "uint32" | "u32" => Self::Uint32,
            "uint64" | "u64" => Self::Uint64,
            "int8" | "i8" => Self::Int8,
            "int16" | "i16" => Self::Int16,
            "int32" | "i32" => Self::Int32,
            "int64" | "i64" => Self::Int64,
            "float32" | "f32" => Self::Float32,
            "float64" | "f64" => Self::Float64,
            other => return Err(format!("unknown dtype '{}'", other)),
        })
    }
}

/// The value substituted where no asset data exists.
///
/// Integer and float fills are kept apart because the cast rules differ.
/// Serialized as a JSON number, or as `"nan"`, `"inf"`, `"-inf"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FillRepr", into = "FillRepr")]
pub enum FillValue {
    Int(i64),
    Float(f64),
}

impl FillValue {
    pub fn nan() -> Self {
        Self::Float(f64::NAN)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// The natural dtype of this scalar on its own.
    pub fn natural_dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int64,
            Self::Float(_) => DType::Float64,
        }
    }
}

impl Default for FillValue {
    fn default() -> Self {
        Self::nan()
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) if v.is_nan() => f.write_str("nan"),
            Self::Float(v) => write!(f, "{:?}", v),
        }
    }
}

impl FromStr for FillValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Self::Int(v));
        }
        match s.to_lowercase().as_str() {
            "nan" => Ok(Self::Float(f64::NAN)),
            "inf" | "+inf" | "infinity" => Ok(Self::Float(f64::INFINITY)),
            "-inf" | "-infinity" => Ok(Self::Float(f64::NEG_INFINITY)),
            _ => s
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| format!("invalid fill value '{}'", s)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FillRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TryFrom<FillRepr> for FillValue {
    type Error = String;

    fn try_from(repr: FillRepr) -> Result<Self, Self::Error> {
        match repr {
            FillRepr::Int(v) => Ok(Self::Int(v)),
            FillRepr::Float(v) => Ok(Self::Float(v)),
            FillRepr::Text(s) => s.parse(),
        }
    }
}

impl From<FillValue> for FillRepr {
    fn from(fill: FillValue) -> Self {
        match fill {
            FillValue::Int(v) => Self::Int(v),
            FillValue::Float(v) if v.is_finite() => Self::Float(v),
            other => Self::Text(other.to_string()),
        }
    }
}

/// A concrete output element type.
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + NumCast + 'static
{
    const DTYPE: DType;

    /// Convert a fill value, or `None` if it is not representable.
    fn from_fill(fill: FillValue) -> Option<Self> {
        if !Self::DTYPE.can_hold(fill) {
            return None;
        }
        match fill {
            FillValue::Int(v) => <Self as NumCast>::from(v),
            FillValue::Float(v) => <Self as NumCast>::from(v),
        }
    }

    /// Lossy conversion used after rescaling; out-of-range values saturate
    /// and NaN maps to `fill`.
    fn from_f64_saturating(v: f64, fill: Self) -> Self {
        if Self::DTYPE.is_float() {
            return <Self as NumCast>::from(v).unwrap_or(fill);
        }
        if v.is_nan() {
            return fill;
        }
        let (lo, hi) = Self::DTYPE.int_range().unwrap_or((0, 0));
        let clamped = v.round().clamp(lo as f64, hi as f64);
        <Self as NumCast>::from(clamped).unwrap_or(fill)
    }

    fn as_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }
}

macro_rules! impl_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element!(
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);
