//! Image sequence discovery: filename pattern matching and grouping
//!
//! **Why**: Render folders hold thousands of loosely named frames
//! (shot_0001.png, plate.0042.jpg...). The wall needs them grouped into
//! ordered sequences before anything can be drawn.
//!
//! **Used by**: App (scan on load), Wall (one tile per sequence)
//!
//! # Detection Algorithm
//!
//! 1. Walk the root tree directory by directory (grouping never crosses
//!    directory boundaries)
//! 2. Match each filename against two patterns in priority order:
//!    separator form (`name_0001.png`) then bare form (`name0001.png`)
//! 3. Group matches by (prefix, ext), sort by parsed frame number
//! 4. Keep groups with at least [`MIN_FRAMES`] members
//!
//! Frame numbers are 3-6 digits: shorter or longer digit runs never match,
//! which keeps arbitrary numeric filenames out of the wall while covering
//! the common zero-padding widths.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Minimum group size for a valid sequence
pub const MIN_FRAMES: usize = 3;

/// Recognized still-image extensions (lowercase)
pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Filename patterns in priority order: first match wins.
/// Pattern 1 requires a separator before the index, pattern 2 does not.
static SEQ_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)^(?P<prefix>.*?)[._-](?P<index>\d{3,6})\.(?P<ext>png|jpg|jpeg|bmp|tif|tiff)$")
            .expect("separator pattern is valid"),
        Regex::new(r"(?i)^(?P<prefix>.*?)(?P<index>\d{3,6})\.(?P<ext>png|jpg|jpeg|bmp|tif|tiff)$")
            .expect("bare pattern is valid"),
    ]
});

/// One filename classified as "frame N of sequence (prefix, ext)"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMatch {
    pub prefix: String,
    /// Extension, lowercased
    pub ext: String,
    /// Parsed frame number
    pub index: u64,
    /// Digit width of the matched index string ("0007" -> 4)
    pub digits: usize,
}

/// Classify a bare filename (no directory part). Returns None when the
/// name is not part of any sequence.
pub fn match_frame(filename: &str) -> Option<FrameMatch> {
    for pat in SEQ_PATTERNS.iter() {
        if let Some(caps) = pat.captures(filename) {
            let index_str = &caps["index"];
            // \d{3,6} always parses, but stay defensive about overflow
            let index: u64 = index_str.parse().ok()?;
            return Some(FrameMatch {
                prefix: caps["prefix"].to_string(),
                ext: caps["ext"].to_lowercase(),
                index,
                digits: index_str.len(),
            });
        }
    }
    None
}

/// Ordered group of >= MIN_FRAMES numbered frames in one directory
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Directory-qualified identity, e.g. `/renders/shot_[##].png`
    key: String,
    folder: PathBuf,
    prefix: String,
    ext: String,
    /// Absolute frame paths, ascending by parsed frame number
    frames: Vec<PathBuf>,
    /// Zero-pad width observed on the lowest-index frame (display only)
    digits: usize,
}

impl Sequence {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame path by position in the sequence (not by frame number)
    pub fn frame(&self, idx: usize) -> Option<&Path> {
        self.frames.get(idx).map(|p| p.as_path())
    }

    /// Caption shown under the tile: `folder/prefix[####].ext (Nf)`
    pub fn caption(&self) -> String {
        let folder = self
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pad = "#".repeat(self.digits);
        format!(
            "{}/{}[{}].{}  ({}f)",
            folder,
            self.prefix,
            pad,
            self.ext,
            self.frames.len()
        )
    }
}

/// Group matched files of one directory into sequences.
///
/// Grouping key is (prefix, ext); members are sorted by frame number
/// ascending (numeric, never lexical); groups below MIN_FRAMES are
/// dropped. The recorded digit width comes from the lowest-index frame.
pub fn build_sequences(dir: &Path, files: &[(String, FrameMatch)]) -> Vec<Sequence> {
    let mut groups: BTreeMap<(String, String), Vec<(u64, String, usize)>> = BTreeMap::new();

    for (name, m) in files {
        groups
            .entry((m.prefix.clone(), m.ext.clone()))
            .or_default()
            .push((m.index, name.clone(), m.digits));
    }

    let mut sequences = Vec::new();
    for ((prefix, ext), mut members) in groups {
        members.sort_by_key(|(index, _, _)| *index);
        if members.len() < MIN_FRAMES {
            debug!(
                "Skipping group {}*.{} in {}: only {} frame(s)",
                prefix,
                ext,
                dir.display(),
                members.len()
            );
            continue;
        }

        let digits = members[0].2;
        let frames: Vec<PathBuf> = members.iter().map(|(_, name, _)| dir.join(name)).collect();
        let key = dir
            .join(format!("{}[##].{}", prefix, ext))
            .to_string_lossy()
            .into_owned();

        sequences.push(Sequence {
            key,
            folder: dir.to_path_buf(),
            prefix,
            ext,
            frames,
            digits,
        });
    }

    sequences
}

/// Scan a root directory tree for sequences.
///
/// Walks recursively; each directory is grouped independently so
/// identically named sequences in different folders stay distinct.
/// Unreadable directories are skipped with a warning, never fatal.
/// Result is sorted by key, case-insensitive, for a stable grid order.
pub fn scan(root: &Path) -> Vec<Sequence> {
    let mut sequences = Vec::new();
    scan_dir(root, &mut sequences);
    sequences.sort_by_key(|s| s.key().to_lowercase());
    debug!("Scan of {} found {} sequence(s)", root.display(), sequences.len());
    sequences
}

fn scan_dir(dir: &Path, out: &mut Vec<Sequence>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut files: Vec<(String, FrameMatch)> = Vec::new();
    let mut subdirs: Vec<PathBuf> = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            // Hidden directories (including the thumbnail cache) are
            // never scanned
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            subdirs.push(path);
        } else if file_type.is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Cheap extension pre-filter before the regex pass
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();
            if !IMAGE_EXTS.contains(&ext.as_str()) {
                continue;
            }
            if let Some(m) = match_frame(&name) {
                files.push((name, m));
            }
        }
    }

    out.extend(build_sequences(dir, &files));

    for sub in subdirs {
        scan_dir(&sub, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_separator_pattern() {
        let m = match_frame("shot_0007.png").unwrap();
        assert_eq!(m.prefix, "shot");
        assert_eq!(m.ext, "png");
        assert_eq!(m.index, 7);
        assert_eq!(m.digits, 4);
    }

    #[test]
    fn test_match_bare_pattern() {
        let m = match_frame("render042.JPG").unwrap();
        assert_eq!(m.prefix, "render");
        assert_eq!(m.ext, "jpg");
        assert_eq!(m.index, 42);
        assert_eq!(m.digits, 3);
    }

    #[test]
    fn test_separator_pattern_wins() {
        // Both patterns could match; the separator form strips the dot
        let m = match_frame("plate.000123.tif").unwrap();
        assert_eq!(m.prefix, "plate");
        assert_eq!(m.index, 123);
        assert_eq!(m.digits, 6);
    }

    #[test]
    fn test_digit_width_bounds() {
        // 2 digits: too short, 7 digits: too long
        assert!(match_frame("shot_01.png").is_none());
        assert!(match_frame("shot_0000001.png").is_none());
        assert!(match_frame("shot_001.png").is_some());
        assert!(match_frame("shot_000001.png").is_some());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(match_frame("shot_0001.exr").is_none());
        assert!(match_frame("shot_0001.txt").is_none());
        assert!(match_frame("shot_0001").is_none());
    }

    #[test]
    fn test_case_insensitive_ext_lowercased() {
        let m = match_frame("A_0001.TIFF").unwrap();
        assert_eq!(m.ext, "tiff");
    }

    fn matches(names: &[&str]) -> Vec<(String, FrameMatch)> {
        names
            .iter()
            .filter_map(|n| match_frame(n).map(|m| (n.to_string(), m)))
            .collect()
    }

    #[test]
    fn test_two_frames_never_a_sequence() {
        let dir = Path::new("/renders");
        let seqs = build_sequences(dir, &matches(&["b_001.jpg", "b_002.jpg"]));
        assert!(seqs.is_empty());

        let seqs = build_sequences(dir, &matches(&["b_001.jpg", "b_002.jpg", "b_003.jpg"]));
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].len(), 3);
    }

    #[test]
    fn test_numeric_ordering_not_lexical() {
        let dir = Path::new("/renders");
        // Lexical order would be 010, 011, 009
        let seqs = build_sequences(
            dir,
            &matches(&["frame_010.png", "frame_009.png", "frame_011.png"]),
        );
        assert_eq!(seqs.len(), 1);
        let names: Vec<String> = (0..3)
            .map(|i| {
                seqs[0]
                    .frame(i)
                    .unwrap()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["frame_009.png", "frame_010.png", "frame_011.png"]);
    }

    #[test]
    fn test_groups_split_by_extension() {
        let dir = Path::new("/renders");
        let seqs = build_sequences(
            dir,
            &matches(&[
                "a_001.png",
                "a_002.png",
                "a_003.png",
                "a_001.jpg",
                "a_002.jpg",
                "a_003.jpg",
            ]),
        );
        assert_eq!(seqs.len(), 2);
    }

    #[test]
    fn test_digit_width_from_first_frame() {
        let dir = Path::new("/renders");
        let seqs = build_sequences(
            dir,
            &matches(&["s_0999.png", "s_1000.png", "s_1001.png", "s_1002.png"]),
        );
        assert_eq!(seqs[0].digits(), 4);
        assert!(seqs[0].caption().contains("[####]"));
    }

    #[test]
    fn test_scan_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for i in 1..=10 {
            std::fs::write(root.join(format!("a_{:03}.png", i)), b"x").unwrap();
        }
        std::fs::write(root.join("b_001.jpg"), b"x").unwrap();
        std::fs::write(root.join("b_002.jpg"), b"x").unwrap();

        let seqs = scan(root);
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].len(), 10);
        assert_eq!(seqs[0].prefix(), "a");
    }

    #[test]
    fn test_scan_same_prefix_different_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for sub in ["left", "right"] {
            let dir = root.join(sub);
            std::fs::create_dir(&dir).unwrap();
            for i in 1..=3 {
                std::fs::write(dir.join(format!("cam_{:04}.png", i)), b"x").unwrap();
            }
        }

        let seqs = scan(root);
        assert_eq!(seqs.len(), 2);
        assert_ne!(seqs[0].key(), seqs[1].key());
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".seqwall_cache");
        std::fs::create_dir(&hidden).unwrap();
        for i in 1..=3 {
            std::fs::write(hidden.join(format!("x_{:03}.png", i)), b"x").unwrap();
        }
        assert!(scan(tmp.path()).is_empty());
    }

    #[test]
    fn test_scan_missing_root_yields_nothing() {
        let seqs = scan(Path::new("/nonexistent/seqwall/root"));
        assert!(seqs.is_empty());
    }
}
