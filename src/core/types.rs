//! Common types used across the audit engine.

use serde::{Deserialize, Serialize};

/// A 256-bit hash value (SHA3-256).
///
/// Ordering is byte-wise, which matches the lexical order of the hex form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

/// Content hash used as the identity of an audit event.
pub type ContentHash = Hash256;

impl Hash256 {
    /// Create a new Hash256 from bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zero hash.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Self::zero()
    }
}

// Hashes travel as hex strings in JSON so stored records stay readable.
impl Serialize for Hash256 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Ledger transaction identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Create a new transaction ID.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp, truncated to millisecond precision.
///
/// Milliseconds are the canonical resolution: anything finer would not
/// survive a round trip through the epoch-millis query API.
pub fn now() -> Timestamp {
    let now = chrono::Utc::now();
    from_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Build a timestamp from epoch milliseconds.
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
}

/// Epoch milliseconds of a timestamp.
pub fn to_millis(ts: &Timestamp) -> i64 {
    ts.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_zero() {
        let hash = Hash256::zero();
        assert_eq!(hash.0, [0u8; 32]);
    }

    #[test]
    fn test_hash256_hex_roundtrip() {
        let hash = Hash256::new([7u8; 32]);
        let parsed = Hash256::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hash256_order_matches_hex_order() {
        let mut low = [0u8; 32];
        low[0] = 0x0a;
        let mut high = [0u8; 32];
        high[0] = 0xa0;
        let (low, high) = (Hash256::new(low), Hash256::new(high));

        assert!(low < high);
        assert!(low.to_hex() < high.to_hex());
    }

    #[test]
    fn test_hash256_serde_as_hex() {
        let hash = Hash256::new([1u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<Hash256>("\"abcd\"").is_err());
    }

    #[test]
    fn test_millis_precision() {
        let ts = now();
        let back = from_millis(to_millis(&ts)).unwrap();
        assert_eq!(ts, back);
    }
}
