//! Chunk persistence.
//!
//! Chunks are stored as a sparse list of non-air voxels:
//!
//! ```text
//! "SVCK" | version: u8 | count: u32 LE | count * (index: u32 LE, block: i32 LE, metadata: u8)
//! ```
//!
//! Light is never persisted, and air cells carry no metadata: decoding
//! zeroes the metadata byte of every air cell, whichever layout it came
//! from. Loading is lenient: headerless dumps from older
//! saves are recognised by size, truncated record streams keep their complete
//! records, and anything else loads as an empty chunk. Damaged data is logged,
//! never returned as an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::Mutex;
use scanvox_core::constants::CHUNK_VOLUME;
use scanvox_core::coords::{ChunkPos, LocalPos};
use scanvox_core::types::{BlockId, FluidMeta, Voxel};
use scanvox_core::Result;
use tracing::{debug, warn};

use crate::chunk::Chunk;

const MAGIC: &[u8; 4] = b"SVCK";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 9;
const RECORD_LEN: usize = 9;

/// Storage backend for chunk blocks and metadata.
pub trait ChunkStore: Send + Sync {
    /// Load a chunk, or `None` if it was never saved.
    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>>;

    /// Save a chunk's blocks and metadata.
    fn save_chunk(&self, chunk: &Chunk) -> Result<()>;
}

/// Save a chunk if it has unsaved edits, clearing its modified flag.
///
/// Returns whether anything was written.
pub fn flush_chunk(store: &dyn ChunkStore, chunk: &mut Chunk) -> Result<bool> {
    if !chunk.is_modified() {
        return Ok(false);
    }
    store.save_chunk(chunk)?;
    chunk.clear_modified();
    Ok(true)
}

/// Encode a chunk's non-air voxels.
pub fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
    let blocks = chunk.blocks();
    let metadata = chunk.metadata_slice();
    let count = blocks.iter().filter(|b| !b.is_air()).count();

    let mut out = Vec::with_capacity(HEADER_LEN + count * RECORD_LEN);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(count as u32).to_le_bytes());
    for (index, (block, meta)) in blocks.iter().zip(metadata).enumerate() {
        if block.is_air() {
            continue;
        }
        out.extend_from_slice(&(index as u32).to_le_bytes());
        out.extend_from_slice(&block.0.to_le_bytes());
        out.push(meta.0);
    }
    out
}

/// Decode a stored chunk. Never fails; see the module docs for the fallbacks.
pub fn decode_chunk(pos: ChunkPos, bytes: &[u8]) -> Chunk {
    if bytes.len() >= HEADER_LEN && &bytes[..4] == MAGIC {
        return decode_records(pos, bytes);
    }

    if bytes.len() == CHUNK_VOLUME * 4 {
        warn!(?pos, "Loading legacy dense block dump");
        let blocks = read_dense_blocks(bytes);
        return Chunk::from_parts(pos, blocks, vec![FluidMeta(0); CHUNK_VOLUME])
            .unwrap_or_else(|| Chunk::new(pos));
    }

    if bytes.len() == CHUNK_VOLUME * 5 {
        warn!(?pos, "Loading legacy dense block and metadata dump");
        let (block_bytes, meta_bytes) = bytes.split_at(CHUNK_VOLUME * 4);
        let blocks = read_dense_blocks(block_bytes);
        let metadata = blocks
            .iter()
            .zip(meta_bytes)
            .map(|(&block, &meta)| stored_meta(block, meta))
            .collect();
        return Chunk::from_parts(pos, blocks, metadata).unwrap_or_else(|| Chunk::new(pos));
    }

    warn!(?pos, len = bytes.len(), "Unrecognised chunk data, loading empty chunk");
    Chunk::new(pos)
}

fn decode_records(pos: ChunkPos, bytes: &[u8]) -> Chunk {
    let mut chunk = Chunk::new(pos);
    let version = bytes[4];
    if version != VERSION {
        warn!(?pos, version, "Unsupported chunk version, loading empty chunk");
        return chunk;
    }

    let count = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let available = (bytes.len() - HEADER_LEN) / RECORD_LEN;
    if available < count {
        warn!(?pos, count, available, "Truncated chunk data, loading complete records");
    }

    let mut skipped = 0usize;
    for record in bytes[HEADER_LEN..].chunks_exact(RECORD_LEN).take(count) {
        let index = u32::from_le_bytes([record[0], record[1], record[2], record[3]]) as usize;
        let block = BlockId(i32::from_le_bytes([record[4], record[5], record[6], record[7]]));
        if index >= CHUNK_VOLUME {
            skipped += 1;
            continue;
        }
        chunk.set_voxel(
            LocalPos::from_index(index),
            Voxel::with_metadata(block, stored_meta(block, record[8])),
        );
    }
    if skipped > 0 {
        warn!(?pos, skipped, "Skipped out-of-range chunk records");
    }
    chunk.clear_modified();
    chunk
}

#[inline]
const fn stored_meta(block: BlockId, meta: u8) -> FluidMeta {
    if block.is_air() {
        FluidMeta(0)
    } else {
        FluidMeta(meta)
    }
}

fn read_dense_blocks(bytes: &[u8]) -> Vec<BlockId> {
    bytes
        .chunks_exact(4)
        .map(|b| BlockId(i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect()
}

/// In-memory chunk store.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<HashMap<ChunkPos, Vec<u8>>>,
}

impl MemoryChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved chunks.
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Whether nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        Ok(self.chunks.lock().get(&pos).map(|bytes| decode_chunk(pos, bytes)))
    }

    fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.chunks.lock().insert(chunk.pos, encode_chunk(chunk));
        Ok(())
    }
}

/// Chunk store keeping one file per chunk in a directory.
pub struct FileChunkStore {
    root: PathBuf,
}

impl FileChunkStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the chunk files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file for a chunk.
    pub fn chunk_path(&self, pos: ChunkPos) -> PathBuf {
        self.root.join(format!("c.{}.{}.svck", pos.x, pos.z))
    }
}

impl ChunkStore for FileChunkStore {
    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        match fs::read(self.chunk_path(pos)) {
            Ok(bytes) => Ok(Some(decode_chunk(pos, &bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        let path = self.chunk_path(chunk.pos);
        let tmp = path.with_extension("svck.tmp");
        fs::write(&tmp, encode_chunk(chunk))?;
        fs::rename(&tmp, &path)?;
        debug!(pos = ?chunk.pos, path = %path.display(), "Saved chunk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanvox_core::coords::Direction;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new(ChunkPos::new(-3, 7));
        chunk.fill((0, 0, 0), (15, 4, 15), Voxel::new(BlockId::from_rgb(90, 80, 70)));
        chunk.set_block(LocalPos::new(3, 9, 4), BlockId::LAMP);
        chunk.set_voxel(
            LocalPos::new(5, 5, 5),
            Voxel::with_metadata(BlockId::WATER, FluidMeta::new(6, Some(Direction::NegZ))),
        );
        chunk.set_block(LocalPos::new(15, 127, 15), BlockId::from_argb(0x80, 1, 2, 3));
        chunk
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scanvox-{name}-{}", std::process::id()))
    }

    #[test]
    fn encode_decode_preserves_blocks_and_metadata() {
        let chunk = sample_chunk();
        let decoded = decode_chunk(chunk.pos, &encode_chunk(&chunk));

        assert_eq!(decoded.blocks(), chunk.blocks());
        assert_eq!(decoded.metadata_slice(), chunk.metadata_slice());
        assert!(!decoded.is_modified());
    }

    #[test]
    fn empty_chunk_encodes_header_only() {
        let bytes = encode_chunk(&Chunk::new(ChunkPos::new(0, 0)));
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], MAGIC);
    }

    #[test]
    fn truncated_stream_keeps_complete_records() {
        let chunk = sample_chunk();
        let mut bytes = encode_chunk(&chunk);
        let records = (bytes.len() - HEADER_LEN) / RECORD_LEN;
        bytes.truncate(HEADER_LEN + 10 * RECORD_LEN + 4);

        let decoded = decode_chunk(chunk.pos, &bytes);
        let non_air = decoded.blocks().iter().filter(|b| !b.is_air()).count();
        assert!(records > 10);
        assert_eq!(non_air, 10);
    }

    #[test]
    fn legacy_dense_dumps_are_recognised() {
        let chunk = sample_chunk();
        let mut dense: Vec<u8> = chunk.blocks().iter().flat_map(|b| b.0.to_le_bytes()).collect();

        let blocks_only = decode_chunk(chunk.pos, &dense);
        assert_eq!(blocks_only.blocks(), chunk.blocks());
        assert!(blocks_only.metadata_slice().iter().all(|m| m.0 == 0));

        dense.extend(chunk.metadata_slice().iter().map(|m| m.0));
        let with_meta = decode_chunk(chunk.pos, &dense);
        assert_eq!(with_meta.blocks(), chunk.blocks());
        assert_eq!(with_meta.metadata_slice(), chunk.metadata_slice());
    }

    #[test]
    fn air_cells_drop_stray_metadata() {
        let chunk = sample_chunk();
        let air = LocalPos::new(8, 100, 8).to_index();
        let water = LocalPos::new(5, 5, 5).to_index();
        let mut dense: Vec<u8> = chunk.blocks().iter().flat_map(|b| b.0.to_le_bytes()).collect();
        let mut meta: Vec<u8> = chunk.metadata_slice().iter().map(|m| m.0).collect();
        meta[air] = 0x37;
        dense.extend(meta);

        let loaded = decode_chunk(chunk.pos, &dense);
        assert_eq!(loaded.metadata_slice()[air], FluidMeta(0));
        assert_eq!(loaded.metadata_slice()[water], chunk.metadata_slice()[water]);

        let resaved = decode_chunk(chunk.pos, &encode_chunk(&loaded));
        assert_eq!(resaved.metadata_slice(), loaded.metadata_slice());
    }

    #[test]
    fn garbage_loads_as_empty_chunk() {
        let decoded = decode_chunk(ChunkPos::new(1, 1), &[1, 2, 3, 4, 5]);
        assert!(decoded.is_empty());

        let mut wrong_version = encode_chunk(&sample_chunk());
        wrong_version[4] = 99;
        assert!(decode_chunk(ChunkPos::new(1, 1), &wrong_version).is_empty());
    }

    #[test]
    fn memory_store_round_trip_and_flush() {
        let store = MemoryChunkStore::new();
        let mut chunk = sample_chunk();
        assert!(store.load_chunk(chunk.pos).unwrap().is_none());

        assert!(flush_chunk(&store, &mut chunk).unwrap());
        assert!(!chunk.is_modified());
        assert!(!flush_chunk(&store, &mut chunk).unwrap());
        assert_eq!(store.len(), 1);

        let loaded = store.load_chunk(chunk.pos).unwrap().unwrap();
        assert_eq!(loaded.blocks(), chunk.blocks());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = temp_dir("file-store");
        let store = FileChunkStore::open(&dir).unwrap();
        let chunk = sample_chunk();

        assert!(store.load_chunk(chunk.pos).unwrap().is_none());
        store.save_chunk(&chunk).unwrap();
        let loaded = store.load_chunk(chunk.pos).unwrap().unwrap();
        assert_eq!(loaded.blocks(), chunk.blocks());
        assert_eq!(loaded.metadata_slice(), chunk.metadata_slice());

        fs::remove_dir_all(&dir).unwrap();
    }
}
