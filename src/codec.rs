//! Value Codec
//!
//! Turns caller values into the byte payloads stored by both tiers.
//!
//! Raw bytes and text are stored as-is. Everything else goes through
//! `bincode`, so a payload written by one tier decodes identically when read
//! back from the other. An empty payload is the nil marker written by `None`.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

// == Cache Value ==
/// A value that can be stored in the cache.
///
/// The destination type of a read is chosen at the call site, e.g.
/// `cache.get::<String>("k")`.
pub trait CacheValue: Sized {
    /// Encodes the value into a payload.
    fn encode(&self) -> Result<Bytes, CodecError>;

    /// Decodes a payload into a value.
    fn decode(payload: Bytes) -> Result<Self, CodecError>;
}

impl CacheValue for Bytes {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(self.clone())
    }

    fn decode(payload: Bytes) -> Result<Self, CodecError> {
        Ok(payload)
    }
}

impl CacheValue for Vec<u8> {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(self))
    }

    fn decode(payload: Bytes) -> Result<Self, CodecError> {
        Ok(payload.to_vec())
    }
}

impl CacheValue for String {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(self.as_bytes()))
    }

    fn decode(payload: Bytes) -> Result<Self, CodecError> {
        Ok(String::from_utf8(payload.to_vec())?)
    }
}

/// `None` is stored as the empty payload and an empty payload reads back as
/// `None`. Note that `Some` of an empty string or byte vector therefore also
/// reads back as `None`.
impl<T: CacheValue> CacheValue for Option<T> {
    fn encode(&self) -> Result<Bytes, CodecError> {
        match self {
            Some(value) => value.encode(),
            None => Ok(Bytes::new()),
        }
    }

    fn decode(payload: Bytes) -> Result<Self, CodecError> {
        if payload.is_empty() {
            return Ok(None);
        }
        T::decode(payload).map(Some)
    }
}

// == Serde Wrapper ==
/// Stores any serde type through the binary format.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tiered_cache::{CacheValue, Serde};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct User { id: u64, name: String }
///
/// let payload = Serde(User { id: 7, name: "ada".into() }).encode().unwrap();
/// let Serde(user) = Serde::<User>::decode(payload).unwrap();
/// assert_eq!(user.id, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Serde<T>(pub T);

impl<T> Serde<T> {
    /// Unwraps the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> CacheValue for Serde<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(bincode::serialize(&self.0)?))
    }

    fn decode(payload: Bytes) -> Result<Self, CodecError> {
        Ok(Serde(bincode::deserialize(&payload)?))
    }
}

macro_rules! binary_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheValue for $ty {
                fn encode(&self) -> Result<Bytes, CodecError> {
                    Ok(Bytes::from(bincode::serialize(self)?))
                }

                fn decode(payload: Bytes) -> Result<Self, CodecError> {
                    Ok(bincode::deserialize(&payload)?)
                }
            }
        )*
    };
}

binary_value!(bool, u8, i8, u16, i16, i32, i64, u32, u64, f32, f64);
