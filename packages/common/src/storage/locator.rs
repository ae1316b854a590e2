use std::fmt;

use uuid::Uuid;

use super::error::StorageError;

/// Opaque reference to a persisted blob.
///
/// Locators are random and never derived from content, so two blobs holding
/// identical bytes still have distinct locators. Callers treat the value as
/// opaque; only the store that issued it interprets the layout.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobLocator(String);

impl BlobLocator {
    /// Issue a fresh locator.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse a stored locator, rejecting anything a store could not have issued.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        if s.len() != 32 {
            return Err(StorageError::InvalidLocator(format!(
                "expected 32 characters, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(StorageError::InvalidLocator(
                "expected lowercase hex characters".into(),
            ));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 2 characters (shard directory).
    pub fn shard_prefix(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Debug for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobLocator({})", self.0)
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
