use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

use crate::{
    core::CompiledTable,
    ports::route_cache::{CacheResult, RouteCache},
};

pub const CACHE_FILE_NAME: &str = "routes.cache.json";

#[derive(Serialize)]
struct CacheEntryRef<'a> {
    fingerprint: &'a str,
    table: &'a CompiledTable,
}

#[derive(Deserialize)]
struct CacheEntry {
    fingerprint: String,
    table: CompiledTable,
}

/// Route cache backed by a single JSON file.
///
/// An entry is valid while the file is younger than `ttl` and carries the
/// fingerprint being asked for. Anything else is deleted and reported as a
/// miss.
#[derive(Debug, Clone)]
pub struct FileRouteCache {
    path: PathBuf,
    ttl: Duration,
}

impl FileRouteCache {
    pub fn new(dir: impl AsRef<Path>, ttl: Duration) -> Self {
        Self {
            path: dir.as_ref().join(CACHE_FILE_NAME),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        // A modification time in the future counts as fresh.
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age >= self.ttl)
    }

    fn discard(&self, reason: &str) -> CacheResult<Option<CompiledTable>> {
        tracing::debug!(path = %self.path.display(), reason, "Discarding route cache entry");
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RouteCache for FileRouteCache {
    fn load(&self, fingerprint: &str) -> CacheResult<Option<CompiledTable>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if self.is_expired(metadata.modified()?) {
            return self.discard("expired");
        }

        let bytes = fs::read(&self.path)?;
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt route cache file");
                return self.discard("corrupt");
            }
        };

        if entry.fingerprint != fingerprint {
            return self.discard("fingerprint mismatch");
        }

        Ok(Some(entry.table))
    }

    fn save(&self, fingerprint: &str, table: &CompiledTable) -> CacheResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let bytes = serde_json::to_vec(&CacheEntryRef { fingerprint, table })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved route cache");
        Ok(())
    }
}
