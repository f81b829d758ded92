//! Typed keys and values over the byte-level operations.
//!
//! Integers are stored native-endian at their fixed width, which is the
//! layout the integer comparators expect. Strings are stored as UTF-8.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use std::borrow::Cow;

/// Conversion between a Rust value and its stored bytes.
pub trait KeyCodec {
    /// The owned type produced when decoding.
    type Owned;

    /// Encodes the value.
    fn encode(&self) -> Cow<'_, [u8]>;

    /// Decodes stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if the bytes do not form a valid value.
    fn decode(bytes: &[u8]) -> CoreResult<Self::Owned>;
}

impl KeyCodec for [u8] {
    type Owned = Vec<u8>;

    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

impl KeyCodec for Vec<u8> {
    type Owned = Vec<u8>;

    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

impl KeyCodec for str {
    type Owned = String;

    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn decode(bytes: &[u8]) -> CoreResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CoreError::decode(e.to_string()))
    }
}

impl KeyCodec for String {
    type Owned = String;

    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn decode(bytes: &[u8]) -> CoreResult<String> {
        str::decode(bytes)
    }
}

macro_rules! fixed_width_codec {
    ($($ty:ty),*) => {$(
        impl KeyCodec for $ty {
            type Owned = $ty;

            fn encode(&self) -> Cow<'_, [u8]> {
                Cow::Owned(self.to_ne_bytes().to_vec())
            }

            fn decode(bytes: &[u8]) -> CoreResult<$ty> {
                let raw = <[u8; std::mem::size_of::<$ty>()]>::try_from(bytes).map_err(|_| {
                    CoreError::decode(format!(
                        "expected {} bytes for {}, found {}",
                        std::mem::size_of::<$ty>(),
                        stringify!($ty),
                        bytes.len()
                    ))
                })?;
                Ok(<$ty>::from_ne_bytes(raw))
            }
        }
    )*};
}

fixed_width_codec!(u32, u64, i32, i64);

/// Typed convenience methods on [`Transaction`].
pub trait TypedExt {
    /// Stores a typed value under a typed key.
    fn put_typed<K, V>(&self, db: &Database, key: &K, value: &V) -> CoreResult<()>
    where
        K: KeyCodec + ?Sized,
        V: KeyCodec + ?Sized;

    /// Reads and decodes the value under a typed key.
    fn get_typed<K, V>(&self, db: &Database, key: &K) -> CoreResult<Option<V::Owned>>
    where
        K: KeyCodec + ?Sized,
        V: KeyCodec + ?Sized;

    /// Deletes a typed key.
    fn delete_typed<K>(&self, db: &Database, key: &K) -> CoreResult<()>
    where
        K: KeyCodec + ?Sized;
}

impl TypedExt for Transaction {
    fn put_typed<K, V>(&self, db: &Database, key: &K, value: &V) -> CoreResult<()>
    where
        K: KeyCodec + ?Sized,
        V: KeyCodec + ?Sized,
    {
        self.put(db, &key.encode(), &value.encode())
    }

    fn get_typed<K, V>(&self, db: &Database, key: &K) -> CoreResult<Option<V::Owned>>
    where
        K: KeyCodec + ?Sized,
        V: KeyCodec + ?Sized,
    {
        self.get(db, &key.encode())?
            .map(|bytes| V::decode(&bytes))
            .transpose()
    }

    fn delete_typed<K>(&self, db: &Database, key: &K) -> CoreResult<()>
    where
        K: KeyCodec + ?Sized,
    {
        self.delete(db, &key.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::Comparator;
    use std::cmp::Ordering;

    #[test]
    fn integers_round_trip_native_endian() {
        assert_eq!(u32::decode(&7u32.encode()).unwrap(), 7);
        assert_eq!(i64::decode(&(-9i64).encode()).unwrap(), -9);
        assert_eq!(&*42u64.encode(), &42u64.to_ne_bytes()[..]);
    }

    #[test]
    fn integer_encoding_matches_comparator() {
        let low = 2u32.encode();
        let high = 300u32.encode();
        assert_eq!(Comparator::UnsignedInteger.compare(&low, &high), Ordering::Less);
    }

    #[test]
    fn wrong_width_is_a_decode_error() {
        assert!(matches!(u64::decode(&[1, 2, 3]), Err(CoreError::Decode { .. })));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        assert!(matches!(String::decode(&[0xff, 0xfe]), Err(CoreError::Decode { .. })));
        assert_eq!(str::decode("héllo".as_bytes()).unwrap(), "héllo");
    }
}
