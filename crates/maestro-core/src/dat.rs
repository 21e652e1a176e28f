//! The `.dat` binary envelope.
//!
//! Persisted binary files (`registry.dat`, `d.dat`, `i.dat`, `o.dat`) are
//! MessagePack payloads behind a 4-byte magic and a format version. Readers
//! that do not recognize a file get `None` and regenerate; a compiler
//! release bumps `FORMAT` whenever an encoding changes shape.
//!
//! All persisted maps are `BTreeMap`s, so encoding is canonical and
//! byte-reproducible.

use crate::fs::Fs;
use serde::{Serialize, de::DeserializeOwned};
use std::io;
use std::path::Path;
use tracing::debug;

const MAGIC: [u8; 4] = *b"MSTR";
const FORMAT: u32 = 1;

/// Encode `value` with the envelope header.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT.to_be_bytes());
    rmp_serde::encode::write(&mut bytes, value)?;
    Ok(bytes)
}

/// Decode an enveloped payload. `None` for anything unrecognizable.
#[must_use]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    let payload = bytes.strip_prefix(&MAGIC)?;
    let (format, payload) = payload.split_first_chunk::<4>()?;
    if u32::from_be_bytes(*format) != FORMAT {
        return None;
    }
    rmp_serde::from_slice(payload).ok()
}

/// Read and decode a `.dat` file. Missing or unrecognizable files read as
/// `None`, which callers treat as "regenerate".
#[must_use]
pub fn read<T: DeserializeOwned>(fs: &dyn Fs, path: &Path) -> Option<T> {
    let bytes = fs.read_binary(path).ok()?;
    let value = decode(&bytes);
    if value.is_none() {
        debug!(path = %path.display(), "unrecognized dat file, regenerating");
    }
    value
}

/// Encode and write a `.dat` file, creating parent directories.
pub fn write<T: Serialize>(fs: &dyn Fs, path: &Path, value: &T) -> io::Result<()> {
    let bytes = encode(value).map_err(io::Error::other)?;
    fs.write_binary(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn envelope_roundtrip() {
        let mut value = BTreeMap::new();
        value.insert("elm/core".to_string(), 3u64);
        let bytes = encode(&value).unwrap();
        assert_eq!(&bytes[..4], b"MSTR");
        let back: BTreeMap<String, u64> = decode(&bytes).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode(&42u32).unwrap();
        bytes[0] = b'X';
        assert_eq!(decode::<u32>(&bytes), None);
    }

    #[test]
    fn rejects_future_format() {
        let mut bytes = encode(&42u32).unwrap();
        bytes[7] = bytes[7].wrapping_add(1);
        assert_eq!(decode::<u32>(&bytes), None);
    }

    #[test]
    fn rejects_truncation() {
        let bytes = encode(&(1u8, 2u8, 3u8)).unwrap();
        assert_eq!(decode::<(u8, u8, u8)>(&bytes[..6]), None);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut value = BTreeMap::new();
        value.insert("b".to_string(), 2u8);
        value.insert("a".to_string(), 1u8);
        assert_eq!(encode(&value).unwrap(), encode(&value.clone()).unwrap());
    }
}
