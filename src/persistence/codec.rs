//! Conversions between typed values and stored entries

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::platform::StoredValue;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// NaN and infinities have no stored form
    #[error("non-finite float {0}")]
    NonFinite(f64),

    /// Encoded form doesn't decode back to the same type
    #[error("value does not survive encoding: {0}")]
    Lossy(serde_json::Error),
}

/// Turns a `T` into a [`StoredValue`] and back
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<StoredValue, CodecError>;
    fn decode(&self, stored: &StoredValue) -> Result<T, CodecError>;
}

/// JSON bytes via serde, for any serializable type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<StoredValue, CodecError> {
        let bytes = serde_json::to_vec(value)?;
        // serde_json writes non-finite floats as `null`, which won't read back
        serde_json::from_slice::<T>(&bytes).map_err(CodecError::Lossy)?;
        Ok(StoredValue::Bytes(bytes))
    }

    fn decode(&self, stored: &StoredValue) -> Result<T, CodecError> {
        match stored {
            StoredValue::Bytes(bytes) => Ok(serde_json::from_slice(bytes)?),
            // Stores that only hold strings hand the JSON back as text
            StoredValue::Text(text) => Ok(serde_json::from_str(text)?),
            other => Err(CodecError::KindMismatch {
                expected: "bytes",
                found: other.kind(),
            }),
        }
    }
}

/// A type the store can hold natively, without an encoding step
pub trait RawScalar: Sized {
    fn to_stored(&self) -> Result<StoredValue, CodecError>;

    /// `None` when `stored` is of another kind or out of range
    fn from_stored(stored: &StoredValue) -> Option<Self>;

    /// Kind name used in mismatch errors
    fn expected_kind() -> &'static str;
}

impl RawScalar for bool {
    fn to_stored(&self) -> Result<StoredValue, CodecError> {
        Ok(StoredValue::Bool(*self))
    }

    fn from_stored(stored: &StoredValue) -> Option<Self> {
        match stored {
            StoredValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn expected_kind() -> &'static str {
        "bool"
    }
}

macro_rules! raw_int {
    ($($ty:ty),*) => {
        $(
            impl RawScalar for $ty {
                fn to_stored(&self) -> Result<StoredValue, CodecError> {
                    Ok(StoredValue::Int(i64::from(*self)))
                }

                fn from_stored(stored: &StoredValue) -> Option<Self> {
                    match stored {
                        StoredValue::Int(n) => <$ty>::try_from(*n).ok(),
                        _ => None,
                    }
                }

                fn expected_kind() -> &'static str {
                    "int"
                }
            }
        )*
    };
}

raw_int!(i32, i64, u32);

fn finite(f: f64) -> Result<StoredValue, CodecError> {
    if f.is_finite() {
        Ok(StoredValue::Float(f))
    } else {
        Err(CodecError::NonFinite(f))
    }
}

impl RawScalar for f64 {
    fn to_stored(&self) -> Result<StoredValue, CodecError> {
        finite(*self)
    }

    fn from_stored(stored: &StoredValue) -> Option<Self> {
        match stored {
            StoredValue::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    fn expected_kind() -> &'static str {
        "float"
    }
}

impl RawScalar for f32 {
    fn to_stored(&self) -> Result<StoredValue, CodecError> {
        finite(f64::from(*self))
    }

    fn from_stored(stored: &StoredValue) -> Option<Self> {
        match stored {
            // Comparison is false for NaN too
            StoredValue::Float(f) if f.abs() <= f64::from(f32::MAX) => Some(*f as f32),
            _ => None,
        }
    }

    fn expected_kind() -> &'static str {
        "float"
    }
}

impl RawScalar for String {
    fn to_stored(&self) -> Result<StoredValue, CodecError> {
        Ok(StoredValue::Text(self.clone()))
    }

    fn from_stored(stored: &StoredValue) -> Option<Self> {
        match stored {
            StoredValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn expected_kind() -> &'static str {
        "text"
    }
}

impl RawScalar for Vec<u8> {
    fn to_stored(&self) -> Result<StoredValue, CodecError> {
        Ok(StoredValue::Bytes(self.clone()))
    }

    fn from_stored(stored: &StoredValue) -> Option<Self> {
        match stored {
            StoredValue::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }

    fn expected_kind() -> &'static str {
        "bytes"
    }
}

/// Stores native scalars directly; a stored value of another kind fails to decode
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl<T: RawScalar> Codec<T> for RawCodec {
    fn encode(&self, value: &T) -> Result<StoredValue, CodecError> {
        value.to_stored()
    }

    fn decode(&self, stored: &StoredValue) -> Result<T, CodecError> {
        T::from_stored(stored).ok_or(CodecError::KindMismatch {
            expected: T::expected_kind(),
            found: stored.kind(),
        })
    }
}
