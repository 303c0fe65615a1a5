//! Content-addressed analysis cache.
//!
//! Layout: `cache/<hash>/{detections.json, transcript.json, ai_clips.json}`
//! plus `cache/<hash>/ai/` for enrichment scratch files. The hash is the
//! SHA-256 of the source file's bytes, computed by streaming so multi-GB
//! recordings never load into memory.

use std::path::{Path, PathBuf};

use clipsmith_models::{ContentHash, Transcript};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::EngineResult;

const HASH_READ_CHUNK: usize = 1024 * 1024;

/// Compute the content hash of a file by streaming its bytes.
pub async fn hash_file(path: &Path) -> EngineResult<ContentHash> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_READ_CHUNK];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let hash = ContentHash::from_hasher(hasher);
    debug!(path = %path.display(), hash = %hash.short(), "Hashed source file");
    Ok(hash)
}

/// Paths within one source file's cache directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(cache_dir: impl Into<PathBuf>, hash: &ContentHash) -> Self {
        Self {
            root: cache_dir.into().join(hash.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn detections(&self) -> PathBuf {
        self.root.join("detections.json")
    }

    pub fn transcript(&self) -> PathBuf {
        self.root.join("transcript.json")
    }

    pub fn ai_clips(&self) -> PathBuf {
        self.root.join("ai_clips.json")
    }

    pub fn ai_dir(&self) -> PathBuf {
        self.root.join("ai")
    }

    /// Create the cache directories for this hash.
    pub async fn ensure_dirs(&self) -> EngineResult<()> {
        tokio::fs::create_dir_all(self.ai_dir()).await?;
        Ok(())
    }

    /// Whether a cached transcript exists; its presence allows caption
    /// burn-in without a fresh transcript argument.
    pub fn has_cached_transcript(&self) -> bool {
        self.transcript().exists()
    }

    /// Load the cached transcript, if present and parseable.
    pub async fn load_transcript(&self) -> EngineResult<Option<Transcript>> {
        let path = self.transcript();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_matches_one_shot_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bin");
        let payload = vec![7u8; 3 * 1024 * 1024 + 17]; // spans several chunks
        std::fs::write(&path, &payload).unwrap();

        let streamed = hash_file(&path).await.unwrap();
        assert_eq!(streamed, ContentHash::digest(&payload));
    }

    #[tokio::test]
    async fn test_layout_paths_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let hash = ContentHash::digest(b"source");
        let layout = CacheLayout::new(dir.path(), &hash);

        layout.ensure_dirs().await.unwrap();
        assert!(layout.ai_dir().is_dir());
        assert!(layout.detections().starts_with(layout.root()));
        assert!(!layout.has_cached_transcript());

        std::fs::write(layout.transcript(), b"{\"segments\":[],\"words\":[]}").unwrap();
        assert!(layout.has_cached_transcript());
        let transcript = layout.load_transcript().await.unwrap().unwrap();
        assert!(transcript.is_empty());
    }
}
