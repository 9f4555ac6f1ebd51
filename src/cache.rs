//! Two-tier thumbnail cache: in-memory map plus content-addressed disk store
//!
//! **Why**: Rendering a tile frame is expensive (decode + Lanczos resample
//! + composite). The memory tier makes re-display O(1) within a session;
//! the disk tier skips re-decoding across sessions entirely.
//!
//! **Used by**: Wall (tick-loop lookups), worker jobs (populate on miss)
//!
//! # Keying
//!
//! Logical key is (source path, tile size, frame index). One cache
//! instance is scoped to a single (root, size) session: changing the root
//! or the tile size means constructing a fresh cache, never reusing one.
//! The disk filename is the SHA-1 hex of the key's string form with a
//! constant format tag, so the same key always resolves to the same file
//! across processes, and a codec change can invalidate old entries by
//! bumping the tag. Hash collisions are not detected (accepted risk).
//!
//! # Error Policy
//!
//! Disk reads that fail (missing, partial, corrupt) are misses. Disk
//! writes that fail (full disk, permissions) are ignored; the memory
//! entry stays valid for the session. Nothing here is ever fatal.
//!
//! # Concurrency
//!
//! The memory tier is a mutex-guarded map shared by the tick loop
//! (readers) and workers (writers). Entries are only ever inserted or
//! overwritten per key, never evicted, so the map grows monotonically
//! within a session (bounded by sequence and frame counts). Two workers
//! writing the same non-first-frame key race benignly: last writer wins
//! in both tiers.

use image::RgbImage;
use log::{debug, warn};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Disk tier directory name, created under the scanned root
pub const CACHE_DIR_NAME: &str = ".seqwall_cache";

/// Format tag folded into the hashed key. Bump when the codec output
/// changes so stale disk entries become misses instead of wrong hits.
const FORMAT_TAG: &str = "seqwall-v1";

/// Hit/miss counters, mirrored into the status line
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub mem_hits: usize,
    pub disk_hits: usize,
    pub misses: usize,
}

/// Thumbnail cache scoped to one (root, tile size) session
pub struct ThumbCache {
    size: u32,
    cache_dir: PathBuf,
    mem: Mutex<HashMap<(PathBuf, usize), Arc<RgbImage>>>,
    mem_hits: AtomicUsize,
    disk_hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ThumbCache {
    /// Create a cache for `root` at tile size `size`.
    ///
    /// The disk tier lives in `<root>/.seqwall_cache`, created on demand;
    /// if creation fails the cache degrades to memory-only.
    pub fn new(root: &Path, size: u32) -> Self {
        let cache_dir = root.join(CACHE_DIR_NAME);
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!(
                "Cannot create cache dir {}: {} (disk tier disabled)",
                cache_dir.display(),
                e
            );
        }
        debug!("ThumbCache: dir={}, size={}", cache_dir.display(), size);

        Self {
            size,
            cache_dir,
            mem: Mutex::new(HashMap::new()),
            mem_hits: AtomicUsize::new(0),
            disk_hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Tile size this cache was built for
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Deterministic disk filename for a logical key.
    ///
    /// Same (path, size, frame) resolves to the same file in every
    /// process run; that is what makes the disk tier survive restarts.
    pub fn disk_path(&self, path: &Path, frame_idx: usize) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(
            format!(
                "{}|{}|{}|{}",
                FORMAT_TAG,
                path.display(),
                self.size,
                frame_idx
            )
            .as_bytes(),
        );
        let hex = format!("{:x}", hasher.finalize());
        self.cache_dir.join(format!("{}.png", hex))
    }

    /// Look up a rendered tile frame.
    ///
    /// Memory tier first; on miss, probe the disk tier and promote the
    /// decoded entry into memory. Returns None only when neither tier
    /// has the entry; disk-read failures are silent misses.
    pub fn get(&self, path: &Path, frame_idx: usize) -> Option<Arc<RgbImage>> {
        let key = (path.to_path_buf(), frame_idx);
        {
            let mem = self.mem.lock().unwrap();
            if let Some(img) = mem.get(&key) {
                self.mem_hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(img));
            }
        }

        let disk = self.disk_path(path, frame_idx);
        if disk.exists() {
            match image::open(&disk) {
                Ok(img) => {
                    let img = Arc::new(img.to_rgb8());
                    self.mem.lock().unwrap().insert(key, Arc::clone(&img));
                    self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    return Some(img);
                }
                Err(e) => {
                    // Corrupt or partial entry: treat as a plain miss
                    debug!("Cache read failed for {}: {}", disk.display(), e);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a rendered tile frame in both tiers.
    ///
    /// The memory insert always succeeds; the disk write is best-effort
    /// and its failure is ignored. Returns a handle usable for immediate
    /// display.
    pub fn put(&self, path: &Path, frame_idx: usize, image: RgbImage) -> Arc<RgbImage> {
        let img = Arc::new(image);
        self.mem
            .lock()
            .unwrap()
            .insert((path.to_path_buf(), frame_idx), Arc::clone(&img));

        let disk = self.disk_path(path, frame_idx);
        if let Err(e) = img.save(&disk) {
            debug!("Cache write failed for {}: {}", disk.display(), e);
        }

        img
    }

    /// Number of entries in the memory tier
    pub fn len(&self) -> usize {
        self.mem.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            mem_hits: self.mem_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
