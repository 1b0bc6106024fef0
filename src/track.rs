use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Reference to an audio file on disk.
///
/// The path is made absolute on creation when possible; the file itself is
/// not touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef {
    path: PathBuf,
}

impl TrackRef {
    pub fn new(path: impl Into<PathBuf>) -> TrackRef {
        let path = path.into();
        let path = std::path::absolute(&path).unwrap_or(path);
        TrackRef { path }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last path component, lossily converted to UTF-8.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(OsStr::to_string_lossy)
            .unwrap_or_default()
            .into_owned()
    }

    /// Text from the last `.` of the file name, lower-cased, dot included.
    /// Empty when the file name has no dot.
    pub fn suffix(&self) -> String {
        let file_name = self.file_name();
        file_name
            .rfind('.')
            .map(|dot| file_name[dot..].to_ascii_lowercase())
            .unwrap_or_default()
    }
}

impl From<PathBuf> for TrackRef {
    fn from(path: PathBuf) -> Self {
        TrackRef::new(path)
    }
}

impl From<&Path> for TrackRef {
    fn from(path: &Path) -> Self {
        TrackRef::new(path)
    }
}

impl From<&str> for TrackRef {
    fn from(path: &str) -> Self {
        TrackRef::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_become_absolute() {
        let track = TrackRef::new("some/dir/Track.FLAC");
        assert!(track.path().is_absolute());
        assert!(track.path().ends_with("some/dir/Track.FLAC"));
    }

    #[test]
    fn file_name_and_suffix() {
        let track = TrackRef::new("/music/cover-test-png.MP3");
        assert_eq!(track.file_name(), "cover-test-png.MP3");
        assert_eq!(track.suffix(), ".mp3");
    }

    #[test]
    fn no_suffix() {
        let track = TrackRef::new("/music/README");
        assert_eq!(track.suffix(), "");
    }
}
