//! SEQWALL - Animated preview wall for numbered image sequences
//!
//! Re-exports all modules for use by binary targets.

// Core engine (discovery, codec, cache, workers, scheduler)
pub mod cache;
pub mod sequence;
pub mod thumb;
pub mod tile;
pub mod wall;
pub mod workers;

// App modules
pub mod cli;

// Re-export commonly used types
pub use cache::{CacheStats, ThumbCache};
pub use sequence::Sequence;
pub use tile::{LoadState, TileAnim};
pub use wall::Wall;
pub use workers::{TileUpdate, Workers};
