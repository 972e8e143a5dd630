use sha2::{Digest, Sha256};

/// Checksummed envelope for composite records held in the fast cache
///
/// The writer wraps the serialized record with its SHA-256 checksum. Readers
/// recompute it and treat a mismatch as a cache miss, falling back to the
/// structured store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached payload (JSON string)
    pub data: String,
    /// SHA-256 checksum of the payload (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches the payload
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serialized form written to the cache
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the payload if the envelope parses and its checksum holds
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_accepts_untouched_payload() {
        let data = r#"{"lead":{"email":"ana@acme.io"}}"#.to_string();
        let serialized = ValidatedCacheEntry::new(data.clone()).serialize().unwrap();

        assert_eq!(
            ValidatedCacheEntry::deserialize_and_validate(&serialized),
            Some(data)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let serialized = ValidatedCacheEntry::new(r#"{"qualification_score":40}"#.to_string())
            .serialize()
            .unwrap();
        let tampered = serialized.replace("40", "99");

        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(ValidatedCacheEntry::deserialize_and_validate("not json"), None);
    }
}
