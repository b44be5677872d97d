//! Opaque fingerprints for cache invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 64-bit token identifying the inputs that produced a cached value.
///
/// The pipeline core never interprets a fingerprint; it only compares two of
/// them for equality. Stages derive fingerprints from whatever signal they
/// trust (modification times, file contents, parameters) and store them next
/// to the location of their cached output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Wraps an externally computed value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the underlying integer.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Computes a fingerprint from a byte slice using XXH3-64.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(data))
    }

    /// Computes a fingerprint over the concatenation of `parts`.
    ///
    /// `["ab", "c"]` and `["a", "bc"]` hash identically, matching the
    /// concatenated-string scheme loaders use for modification times.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Self(hasher.digest())
    }
}

impl From<u64> for Fingerprint {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:08x}..)", self.0 >> 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = Fingerprint::from_bytes(b"train.csv");
        let b = Fingerprint::from_bytes(b"train.csv");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = Fingerprint::from_bytes(b"train.csv");
        let b = Fingerprint::from_bytes(b"test.csv");
        assert_ne!(a, b);
    }

    #[test]
    fn parts_hash_as_concatenation() {
        let joined = Fingerprint::from_bytes(b"1700000000.51700000001.25");
        let parts = Fingerprint::from_parts(["1700000000.5", "1700000001.25"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn empty_parts_match_empty_bytes() {
        assert_eq!(
            Fingerprint::from_parts(std::iter::empty()),
            Fingerprint::from_bytes(b"")
        );
    }

    #[test]
    fn raw_roundtrip() {
        let fp = Fingerprint::from_raw(42);
        assert_eq!(fp.raw(), 42);
        assert_eq!(Fingerprint::from(42u64), fp);
    }

    #[test]
    fn display_is_padded_hex() {
        let fp = Fingerprint::from_raw(0xab);
        assert_eq!(fp.to_string(), "00000000000000ab");
    }

    #[test]
    fn debug_abbreviated() {
        let s = format!("{:?}", Fingerprint::from_raw(0x1234_5678_0000_0000));
        assert_eq!(s, "Fingerprint(12345678..)");
    }

    #[test]
    fn serializes_as_plain_integer() {
        let fp = Fingerprint::from_raw(42);
        assert_eq!(serde_json::to_string(&fp).unwrap(), "42");
        let back: Fingerprint = serde_json::from_str("42").unwrap();
        assert_eq!(back, fp);
    }
}
