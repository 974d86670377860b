use std::fs;
use std::path::{Path, PathBuf};

use crate::takeover::domain::takeover_process::TakeoverError;

/// Media files handed to the takeover player, re-read on every launch so
/// content swapped in between takeovers is picked up.
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl MediaPlaylist {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Matching files in name order. An empty playlist is an error: there is
    /// nothing to take over the screen with.
    pub fn list(&self) -> Result<Vec<PathBuf>, TakeoverError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| TakeoverError::MediaDir {
            dir: self.dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.matches(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(TakeoverError::NoMedia {
                dir: self.dir.clone(),
            });
        }
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4() -> Vec<String> {
        vec!["mp4".to_string()]
    }

    #[test]
    fn test_lists_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp4"), b"").unwrap();
        fs::write(dir.path().join("A.MP4"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let files = MediaPlaylist::new(dir.path(), &mp4()).list().unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.MP4", "b.mp4"]);
    }

    #[test]
    fn test_empty_directory_is_no_media() {
        let dir = tempfile::tempdir().unwrap();

        let result = MediaPlaylist::new(dir.path(), &mp4()).list();

        assert!(matches!(result, Err(TakeoverError::NoMedia { .. })));
    }

    #[test]
    fn test_missing_directory_is_media_dir_error() {
        let result = MediaPlaylist::new("/nonexistent/videos", &mp4()).list();
        assert!(matches!(result, Err(TakeoverError::MediaDir { .. })));
    }

    #[test]
    fn test_picks_up_new_files_between_launches() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = MediaPlaylist::new(dir.path(), &mp4());
        assert!(playlist.list().is_err());

        fs::write(dir.path().join("new.mp4"), b"").unwrap();

        assert_eq!(playlist.list().unwrap().len(), 1);
    }
}
