use thiserror::Error;

use crate::core::CompiledTable;

/// Error type for route cache operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheError {
    /// Error when encountering an IO issue
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when the compiled table cannot be encoded
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for route cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// RouteCache defines the port (interface) for memoizing a compiled route table
/// between process starts.
///
/// Implementations must treat stale, unreadable, or foreign entries as a miss.
/// Callers fall back to compiling the table on any error.
pub trait RouteCache: Send + Sync {
    /// Load a previously saved table built from the same registrations.
    ///
    /// # Arguments
    /// * `fingerprint` - Digest of the registrations the table must come from
    ///
    /// # Returns
    /// `Ok(Some(table))` on a hit, `Ok(None)` on a miss
    fn load(&self, fingerprint: &str) -> CacheResult<Option<CompiledTable>>;

    /// Persist a freshly compiled table.
    fn save(&self, fingerprint: &str, table: &CompiledTable) -> CacheResult<()>;
}
