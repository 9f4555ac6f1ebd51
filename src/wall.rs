//! Wall session: sequences, tiles, cache and the animation tick
//!
//! **Why**: One scan of one root produces one wall. Holding the tile
//! list, the thumbnail cache and the job plumbing in a single session
//! object gives clean replace-on-rescan semantics: a new root or a new
//! tile size builds a new `Wall`, nothing is patched in place.
//!
//! **Used by**: App (owns the current wall, calls `tick` + `drain_results`)
//!
//! # Tick Model
//!
//! The UI calls `tick()` at the configured frame rate with an explicit
//! per-tile visibility mask (bbox-vs-viewport intersection, computed by
//! the caller; tests pass synthetic masks). Per visible tile:
//!
//! 1. `Unloaded`: ensure the first frame is loading or loaded
//! 2. `Loaded` + global play + tile running: advance the frame index and
//!    request the new frame (cache hit displays now, miss goes to a
//!    worker)
//!
//! Invisible tiles are skipped entirely, so decode bandwidth is bounded
//! by the on-screen set. The tick itself never decodes: a miss only ever
//! submits a job. Results come back on the update channel and are applied
//! by `drain_results()` on the UI thread; between two jobs for the same
//! tile the last one to complete wins the redraw.

use crate::cache::ThumbCache;
use crate::sequence::Sequence;
use crate::thumb;
use crate::tile::{LoadState, TileAnim};
use crate::workers::{update_channel, TileUpdate, Workers};
use crossbeam_channel::{Receiver, Sender};
use image::Rgb;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque tile background, composited under every thumbnail
pub const TILE_BG: Rgb<u8> = Rgb([0x22, 0x22, 0x22]);

/// One root-directory session: discovered sequences plus animation state
pub struct Wall {
    root: PathBuf,
    sequences: Vec<Sequence>,
    tiles: Vec<TileAnim>,
    cache: Arc<ThumbCache>,
    workers: Arc<Workers>,
    update_tx: Sender<TileUpdate>,
    update_rx: Receiver<TileUpdate>,
    /// Codec invocations (one per worker render), for stats and tests
    renders: Arc<AtomicUsize>,
}

impl Wall {
    /// Build a session for `root`: one tile per sequence, fresh cache
    /// scoped to (root, tile_size).
    pub fn new(
        root: PathBuf,
        sequences: Vec<Sequence>,
        tile_size: u32,
        workers: Arc<Workers>,
    ) -> Self {
        let cache = Arc::new(ThumbCache::new(&root, tile_size));
        let tiles = sequences.iter().map(|_| TileAnim::new()).collect();
        let (update_tx, update_rx) = update_channel();

        info!(
            "Wall: {} sequence(s) under {} at tile size {}",
            sequences.len(),
            root.display(),
            tile_size
        );

        Self {
            root,
            sequences,
            tiles,
            cache,
            workers,
            update_tx,
            update_rx,
            renders: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, idx: usize) -> Option<&TileAnim> {
        self.tiles.get(idx)
    }

    pub fn tile_mut(&mut self, idx: usize) -> Option<&mut TileAnim> {
        self.tiles.get_mut(idx)
    }

    pub fn cache(&self) -> &ThumbCache {
        &self.cache
    }

    pub fn tile_size(&self) -> u32 {
        self.cache.size()
    }

    /// Total codec invocations so far
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }

    /// One scheduler tick.
    ///
    /// `visible[i]` is the caller's verdict on whether tile `i`
    /// intersects the viewport; tiles without a verdict count as hidden.
    /// Invisible tiles get no load and no step.
    pub fn tick(&mut self, visible: &[bool], play_all: bool, step: usize) {
        let step = step.max(1);

        for idx in 0..self.tiles.len() {
            if !visible.get(idx).copied().unwrap_or(false) {
                continue;
            }

            match self.tiles[idx].load_state() {
                LoadState::Unloaded => self.ensure_first_frame(idx),
                LoadState::Loading => {} // in flight, nothing to do
                LoadState::Loaded => {
                    if play_all && self.tiles[idx].running {
                        self.step_tile(idx, step);
                    }
                }
            }
        }
    }

    /// First-frame load: cache hit displays immediately, miss claims the
    /// tile (`Loading` dedupes concurrent submissions) and queues a job.
    fn ensure_first_frame(&mut self, idx: usize) {
        let Some(path) = self.sequences[idx].frame(0).map(|p| p.to_path_buf()) else {
            return;
        };

        if let Some(img) = self.cache.get(&path, 0) {
            self.tiles[idx].frame_idx = 0;
            self.tiles[idx].set_image(img);
            return;
        }

        self.tiles[idx].mark_loading();
        self.submit(idx, 0, path);
    }

    /// Advance a loaded tile and request the new frame. Non-first frames
    /// are not deduplicated: the last job to complete wins the redraw.
    fn step_tile(&mut self, idx: usize, step: usize) {
        let frame_count = self.sequences[idx].len();
        self.tiles[idx].advance(step, frame_count);

        let frame_idx = self.tiles[idx].frame_idx;
        let Some(path) = self.sequences[idx].frame(frame_idx).map(|p| p.to_path_buf()) else {
            return;
        };

        if let Some(img) = self.cache.get(&path, frame_idx) {
            self.tiles[idx].set_image(img);
        } else {
            self.submit(idx, frame_idx, path);
        }
    }

    /// Queue a decode/resize/compose/cache-put job on the pool
    fn submit(&self, tile_idx: usize, frame_idx: usize, path: PathBuf) {
        let cache = Arc::clone(&self.cache);
        let tx = self.update_tx.clone();
        let renders = Arc::clone(&self.renders);
        let size = self.cache.size();

        self.workers.execute(move || {
            renders.fetch_add(1, Ordering::Relaxed);
            let result = match thumb::render(&path, size, TILE_BG) {
                Ok(img) => Ok(cache.put(&path, frame_idx, img)),
                Err(e) => {
                    debug!("Render failed for {}: {:#}", path.display(), e);
                    Err(format!("{:#}", e))
                }
            };
            // Receiver may be gone when the wall was rebuilt mid-job
            let _ = tx.send(TileUpdate {
                tile_idx,
                frame_idx,
                result,
            });
        });
    }

    /// Apply completed jobs to their tiles. Failures become inline tile
    /// errors, never anything fatal. Returns how many updates landed.
    pub fn drain_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.update_rx.try_recv() {
            let Some(tile) = self.tiles.get_mut(update.tile_idx) else {
                continue;
            };
            match update.result {
                Ok(img) => tile.set_image(img),
                Err(e) => tile.set_error(e),
            }
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::time::{Duration, Instant};

    /// Write a real 4x4 PNG sequence and return the scanned wall parts
    fn fixture(frames: usize) -> (tempfile::TempDir, Vec<Sequence>) {
        let tmp = tempfile::tempdir().unwrap();
        for i in 1..=frames {
            let img = RgbaImage::from_pixel(4, 4, Rgba([(i * 20) as u8, 0, 0, 255]));
            img.save(tmp.path().join(format!("shot_{:03}.png", i))).unwrap();
        }
        let seqs = sequence::scan(tmp.path());
        (tmp, seqs)
    }

    fn wait_until(wall: &mut Wall, pred: impl Fn(&Wall) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !pred(wall) {
            assert!(Instant::now() < deadline, "timed out waiting for workers");
            std::thread::sleep(Duration::from_millis(10));
            wall.drain_results();
        }
    }

    #[test]
    fn test_invisible_tiles_get_no_jobs() {
        let (tmp, seqs) = fixture(3);
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        wall.tick(&[false], true, 1);
        std::thread::sleep(Duration::from_millis(50));
        wall.drain_results();

        assert_eq!(wall.render_count(), 0);
        assert_eq!(wall.tile(0).unwrap().load_state(), LoadState::Unloaded);
    }

    #[test]
    fn test_visible_tile_loads_first_frame_once() {
        let (tmp, seqs) = fixture(3);
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        wall.tick(&[true], false, 1);
        assert_eq!(wall.tile(0).unwrap().load_state(), LoadState::Loading);

        // A second tick while in flight must not submit a duplicate
        wall.tick(&[true], false, 1);

        wait_until(&mut wall, |w| w.tile(0).unwrap().is_loaded());
        assert_eq!(wall.render_count(), 1);
        assert_eq!(wall.tile(0).unwrap().frame_idx, 0);
        assert!(wall.tile(0).unwrap().image().is_some());
    }

    #[test]
    fn test_cache_hit_skips_codec() {
        let (tmp, seqs) = fixture(3);
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers.clone());

        wall.tick(&[true], false, 1);
        wait_until(&mut wall, |w| w.tile(0).unwrap().is_loaded());
        assert_eq!(wall.render_count(), 1);

        // Rebuild the wall for the same root and size: the first frame is
        // on disk, so the next tick promotes it without a worker render
        let seqs = sequence::scan(tmp.path());
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);
        wall.tick(&[true], false, 1);
        assert!(wall.tile(0).unwrap().is_loaded());
        assert_eq!(wall.render_count(), 0);
    }

    #[test]
    fn test_paused_tile_freezes_while_others_advance() {
        let (tmp, seqs) = fixture(4);
        // Two identical sequences via two subdirs would complicate the
        // fixture; instead duplicate the one sequence across two tiles
        let seqs = vec![seqs[0].clone(), seqs[0].clone()];
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        // Pre-populate every frame so stepping never waits on a worker
        let img = RgbImage::from_pixel(16, 16, Rgb([1, 2, 3]));
        for i in 0..4 {
            let path = wall.sequences()[0].frame(i).unwrap().to_path_buf();
            wall.cache().put(&path, i, img.clone());
        }

        wall.tick(&[true, true], true, 1);
        assert!(wall.tile(0).unwrap().is_loaded());
        assert!(wall.tile(1).unwrap().is_loaded());

        wall.tile_mut(0).unwrap().toggle_running();
        let frozen = wall.tile(0).unwrap().frame_idx;

        for _ in 0..3 {
            wall.tick(&[true, true], true, 1);
        }

        assert_eq!(wall.tile(0).unwrap().frame_idx, frozen);
        assert_ne!(wall.tile(1).unwrap().frame_idx, frozen);
    }

    #[test]
    fn test_frame_index_wraps_with_step() {
        let (tmp, seqs) = fixture(5);
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        let img = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        for i in 0..5 {
            let path = wall.sequences()[0].frame(i).unwrap().to_path_buf();
            wall.cache().put(&path, i, img.clone());
        }

        wall.tick(&[true], true, 2); // load (cache hit -> Loaded at 0)
        let mut seen = vec![wall.tile(0).unwrap().frame_idx];
        for _ in 0..4 {
            wall.tick(&[true], true, 2);
            seen.push(wall.tile(0).unwrap().frame_idx);
        }
        assert_eq!(seen, vec![0, 2, 4, 1, 3]);
    }

    #[test]
    fn test_decode_error_lands_on_tile_only() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 1..=3 {
            std::fs::write(tmp.path().join(format!("bad_{:03}.png", i)), b"not a png").unwrap();
        }
        let seqs = sequence::scan(tmp.path());
        assert_eq!(seqs.len(), 1);

        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        wall.tick(&[true], false, 1);
        wait_until(&mut wall, |w| w.tile(0).unwrap().error().is_some());
        assert_eq!(wall.tile(0).unwrap().load_state(), LoadState::Unloaded);
    }

    #[test]
    fn test_global_pause_stops_stepping() {
        let (tmp, seqs) = fixture(3);
        let workers = Arc::new(Workers::new(2));
        let mut wall = Wall::new(tmp.path().to_path_buf(), seqs, 16, workers);

        let img = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        for i in 0..3 {
            let path = wall.sequences()[0].frame(i).unwrap().to_path_buf();
            wall.cache().put(&path, i, img.clone());
        }

        wall.tick(&[true], false, 1);
        assert!(wall.tile(0).unwrap().is_loaded());
        for _ in 0..3 {
            wall.tick(&[true], false, 1);
        }
        assert_eq!(wall.tile(0).unwrap().frame_idx, 0);
    }
}
