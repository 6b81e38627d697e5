//! # Persistence
//!
//! Engine state is saved as named opaque blobs: serde JSON compressed with
//! LZ4 (size-prepended).
//!
//! | Blob      | Contents                          |
//! |-----------|-----------------------------------|
//! | `sources` | [`SourceSnapshot`]                |
//! | `chunks`  | [`ChunkSnapshot`]                 |
//! | `wards`   | [`WardSnapshot`] (raster cursors) |
//! | `regen`   | pending [`RegenEntry`] list       |
//!
//! A missing or unreadable blob degrades to an empty collection with a
//! warning; loading never fails the simulation.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::ChunkSnapshot;
use crate::error::DevastationResult;
use crate::regen::RegenEntry;
use crate::source::SourceSnapshot;
use crate::ward::WardSnapshot;

/// Blob holding the source engine.
pub const SOURCES_BLOB: &str = "sources";
/// Blob holding the chunk engine.
pub const CHUNKS_BLOB: &str = "chunks";
/// Blob holding the ward engine.
pub const WARDS_BLOB: &str = "wards";
/// Blob holding pending regenerations.
pub const REGEN_BLOB: &str = "regen";

/// Stores named byte blobs.
pub trait BlobStore {
    /// Reads a blob; `Ok(None)` if it was never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read.
    fn load(&self, name: &str) -> DevastationResult<Option<Vec<u8>>>;

    /// Writes a blob, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn save(&self, name: &str, bytes: &[u8]) -> DevastationResult<()>;
}

/// One `{name}.blob` file per blob inside a directory.
#[derive(Clone, Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Uses `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> DevastationResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.blob"))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, name: &str) -> DevastationResult<Option<Vec<u8>>> {
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, name: &str, bytes: &[u8]) -> DevastationResult<()> {
        // Blobs are replaced by rename, never rewritten in place.
        let path = self.path(name);
        let tmp = path.with_extension("blob.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Blobs kept in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a blob's raw bytes.
    pub fn put_raw(&self, name: &str, bytes: Vec<u8>) {
        self.blobs.lock().insert(name.to_owned(), bytes);
    }

    /// Returns true if a blob exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.blobs.lock().contains_key(name)
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, name: &str) -> DevastationResult<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(name).cloned())
    }

    fn save(&self, name: &str, bytes: &[u8]) -> DevastationResult<()> {
        self.put_raw(name, bytes.to_vec());
        Ok(())
    }
}

/// Serializes and compresses a value.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> DevastationResult<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    Ok(compress_prepend_size(&json))
}

/// Decompresses and deserializes a value.
///
/// # Errors
///
/// Returns an error for corrupt compression or malformed JSON.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DevastationResult<T> {
    let json = decompress_size_prepended(bytes)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Encodes `value` into the blob `name`.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn save_blob<T: Serialize>(
    store: &(impl BlobStore + ?Sized),
    name: &str,
    value: &T,
) -> DevastationResult<()> {
    store.save(name, &encode(value)?)
}

/// Loads the blob `name`, falling back to `T::default()` with a warning
/// when it is missing or unreadable.
pub fn load_or_default<T: DeserializeOwned + Default>(
    store: &(impl BlobStore + ?Sized),
    name: &str,
) -> T {
    match store.load(name) {
        Ok(Some(bytes)) => match decode(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(blob = name, %err, "corrupt blob, starting empty");
                T::default()
            }
        },
        Ok(None) => {
            info!(blob = name, "no saved state");
            T::default()
        }
        Err(err) => {
            warn!(blob = name, %err, "unreadable blob, starting empty");
            T::default()
        }
    }
}

/// Everything the simulation persists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SavedState {
    /// Source engine.
    pub sources: SourceSnapshot,
    /// Chunk engine.
    pub chunks: ChunkSnapshot,
    /// Ward engine.
    pub wards: WardSnapshot,
    /// Pending regenerations.
    pub regen: Vec<RegenEntry>,
}

impl SavedState {
    /// Writes every blob.
    ///
    /// # Errors
    ///
    /// Returns the first encoding or write failure.
    pub fn save(&self, store: &(impl BlobStore + ?Sized)) -> DevastationResult<()> {
        save_blob(store, SOURCES_BLOB, &self.sources)?;
        save_blob(store, CHUNKS_BLOB, &self.chunks)?;
        save_blob(store, WARDS_BLOB, &self.wards)?;
        save_blob(store, REGEN_BLOB, &self.regen)?;
        info!(
            sources = self.sources.sources.len(),
            chunks = self.chunks.chunks.len(),
            wards = self.wards.wards.len(),
            regen = self.regen.len(),
            "simulation state saved"
        );
        Ok(())
    }

    /// Reads every blob, each degrading to empty on its own.
    #[must_use]
    pub fn load(store: &(impl BlobStore + ?Sized)) -> Self {
        let state = Self {
            sources: load_or_default(store, SOURCES_BLOB),
            chunks: load_or_default(store, CHUNKS_BLOB),
            wards: load_or_default(store, WARDS_BLOB),
            regen: load_or_default(store, REGEN_BLOB),
        };
        info!(
            sources = state.sources.sources.len(),
            chunks = state.chunks.chunks.len(),
            wards = state.wards.wards.len(),
            regen = state.regen.len(),
            "simulation state loaded"
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::DevastatedChunk;
    use crate::config::SourceConfig;
    use crate::source::{DevastationSource, Placement};
    use crate::ward::RiftWard;
    use devastation_world::{BlockId, BlockPos, ChunkCoord};

    fn sample_state() -> SavedState {
        let mut chunk = DevastatedChunk::new(ChunkCoord::new(2, -3));
        chunk.frontier.insert(BlockPos::new(70, 64, -90));
        chunk.blocks_devastated = 12;
        let mut ward = RiftWard::new(BlockPos::new(5, 64, 5), 3.5);
        ward.active = true;
        ward.progress.raster_cursor = Some([-2, 1, 0]);
        ward.progress.current_clean_radius = 2;

        SavedState {
            sources: SourceSnapshot {
                next_id: 8,
                sources: vec![DevastationSource::placed(
                    7,
                    Placement::new(BlockPos::new(0, 64, 0), 8, 1.5),
                    &SourceConfig::default(),
                )],
            },
            chunks: ChunkSnapshot {
                chunks: vec![chunk],
                repair_queue: Vec::new(),
            },
            wards: WardSnapshot { wards: vec![ward] },
            regen: vec![RegenEntry {
                pos: BlockPos::new(1, 2, 3),
                devastated: BlockId(22),
                target: BlockId(23),
                due: 300.0,
            }],
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        let state = sample_state();
        state.save(&store).unwrap();
        assert!(store.contains(SOURCES_BLOB) && store.contains(REGEN_BLOB));
        assert_eq!(SavedState::load(&store), state);
    }

    #[test]
    fn test_missing_and_corrupt_blobs_degrade() {
        let store = MemoryBlobStore::new();
        sample_state().save(&store).unwrap();
        store.put_raw(CHUNKS_BLOB, vec![16, 0, 0, 0, 0xf0]);
        store.put_raw(WARDS_BLOB, compress_prepend_size(b"{ not json"));

        let loaded = SavedState::load(&store);
        assert_eq!(loaded.sources, sample_state().sources);
        assert!(loaded.chunks.chunks.is_empty());
        assert!(loaded.wards.wards.is_empty());

        let empty = SavedState::load(&MemoryBlobStore::new());
        assert_eq!(empty, SavedState::default());
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("devastation-blobs-{}", std::process::id()));
        let store = FileBlobStore::new(&dir).unwrap();
        assert_eq!(store.load("nothing").unwrap(), None);

        let state = sample_state();
        state.save(&store).unwrap();
        assert!(dir.join("wards.blob").exists());
        assert_eq!(SavedState::load(&store), state);
        fs::remove_dir_all(&dir).unwrap();
    }
}
