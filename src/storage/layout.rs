use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::core::error::Result;

pub const TEMP_SUFFIX: &str = ".tmp";

/// A finished segment found in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub sequence: u64,
    pub path: PathBuf,
}

/// Directory structure of one database instance.
///
/// Finished segments are `<N>.<ext>`, files being written are
/// `<N>.<ext>.tmp`. A higher `N` is a newer segment.
#[derive(Debug, Clone)]
pub struct SegmentLayout {
    pub base_dir: PathBuf,
    pub extension: String,
}

impl SegmentLayout {
    pub fn new(base_dir: PathBuf, extension: &str) -> Self {
        SegmentLayout {
            base_dir,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    pub fn segment_path(&self, sequence: u64) -> PathBuf {
        self.base_dir.join(format!("{}.{}", sequence, self.extension))
    }

    pub fn temp_path(&self, sequence: u64) -> PathBuf {
        self.base_dir.join(format!("{}.{}{}", sequence, self.extension, TEMP_SUFFIX))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    /// Finished segments, newest first. A missing directory has no segments.
    pub fn list_segments(&self) -> Result<Vec<SegmentFile>> {
        // Keyed by MAX - sequence so ascending order is newest first
        let mut sorted = BTreeMap::new();

        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.base_dir.display(), "no such directory, no segments");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if let Some(sequence) = self.parse_sequence(&path) {
                sorted.insert(u64::MAX - sequence, SegmentFile { sequence, path });
            }
        }

        Ok(sorted.into_values().collect())
    }

    /// Highest sequence number in use, if any segment exists.
    pub fn last_sequence(&self) -> Result<Option<u64>> {
        Ok(self.list_segments()?.first().map(|s| s.sequence))
    }

    /// Sequence number of a finished segment path (`<N>.<ext>`).
    pub fn parse_sequence(&self, path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(self.extension.as_str())?.strip_suffix('.')?;
        // u64::from_str also takes a leading '+'
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse::<u64>().ok()
    }

    fn is_temp(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
            .is_some_and(|n| self.parse_sequence(Path::new(n)).is_some())
    }

    /// Removes temp files left behind by an interrupted flush.
    pub fn clean_temp_files(&self) -> Result<usize> {
        self.remove_matching(|path| self.is_temp(path))
    }

    /// Removes every segment and temp file. Other files are left alone.
    pub fn remove_all_segments(&self) -> Result<usize> {
        self.remove_matching(|path| self.is_temp(path) || self.parse_sequence(path).is_some())
    }

    fn remove_matching(&self, matches: impl Fn(&Path) -> bool) -> Result<usize> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if !matches(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove file");
                    return Err(e.into());
                }
            }
        }
        Ok(removed)
    }
}
