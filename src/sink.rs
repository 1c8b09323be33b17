use crate::error::{MediaError, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Destination for every file a run produces.
///
/// Without a root directory the sink is disabled and nothing may be written.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    root: Option<PathBuf>,
}

impl OutputSink {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { root: None }
    }

    pub fn from_root(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Creates the root directory. A no-op when disabled.
    pub fn initialize(&self) -> Result<()> {
        if let Some(ref root) = self.root {
            if root.exists() && !root.is_dir() {
                return Err(MediaError::config(format!(
                    "Output path exists and is not a directory: {}",
                    root.display()
                )));
            }
            fs::create_dir_all(root)?;
        }
        Ok(())
    }

    /// Relative location of a converted entry: `<archive>/<fileid>.<ext>`.
    pub fn entry_path(archive_name: &str, file_id: u32, extension: &str) -> PathBuf {
        Path::new(archive_name).join(format!("{}.{}", file_id, extension))
    }

    /// Absolute path for `relative` under the root.
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        let root = self.root.as_ref().ok_or_else(|| MediaError::InvalidPath {
            path: format!(
                "Output is disabled, refusing to resolve {}",
                relative.display()
            ),
        })?;

        validate_relative_path(relative)?;
        Ok(root.join(relative))
    }

    /// Writes `data` to `relative`, replacing any existing file. The content
    /// lands in a temporary file first so a crash never leaves a torn file.
    pub fn write(&self, relative: &Path, data: &[u8]) -> Result<PathBuf> {
        let dest = self.resolve(relative)?;
        let parent = dest.parent().ok_or_else(|| MediaError::InvalidPath {
            path: format!("No parent directory for {}", dest.display()),
        })?;
        fs::create_dir_all(parent)?;

        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(data)?;
        staged.flush()?;
        staged.persist(&dest).map_err(|e| MediaError::Io(e.error))?;

        debug!("Wrote {} bytes to {}", data.len(), dest.display());
        Ok(dest)
    }

    pub fn remove(&self, relative: &Path) -> Result<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    pub fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).map(|p| p.exists()).unwrap_or(false)
    }
}

fn validate_relative_path(path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();

    if path.as_os_str().is_empty() {
        return Err(MediaError::InvalidPath {
            path: "Empty output path".to_string(),
        });
    }

    // Only plain names, so nothing escapes the root
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(MediaError::InvalidPath {
            path: format!("Output path must stay inside the output root: {}", path_str),
        });
    }

    if path_str.len() > 4096 {
        return Err(MediaError::InvalidPath {
            path: format!("Path too long: {} characters", path_str.len()),
        });
    }

    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        let invalid_chars = ['<', '>', ':', '"', '|', '?', '*'];
        if name.chars().any(|c| invalid_chars.contains(&c) || c.is_control()) {
            return Err(MediaError::InvalidPath {
                path: format!("Name contains invalid characters: {}", name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_path() {
        assert_eq!(
            OutputSink::entry_path("terrain", 15000, "slp"),
            PathBuf::from("terrain/15000.slp")
        );
    }

    #[test]
    fn test_write_creates_parents_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path().join("out"));
        sink.initialize().unwrap();

        let relative = Path::new("sounds/5000.wav");
        let written = sink.write(relative, b"first").unwrap();
        assert_eq!(written, temp_dir.path().join("out/sounds/5000.wav"));
        sink.write(relative, b"second").unwrap();

        assert_eq!(fs::read(&written).unwrap(), b"second");
        let leftovers = fs::read_dir(temp_dir.path().join("out/sounds")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let relative = Path::new("sounds/1.wav");

        sink.write(relative, b"RIFF").unwrap();
        assert!(sink.exists(relative));
        sink.remove(relative).unwrap();
        assert!(!sink.exists(relative));
        sink.remove(relative).unwrap();
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());

        assert!(sink.write(Path::new("../escape.bin"), b"x").is_err());
        assert!(sink.write(Path::new("/tmp/abs.bin"), b"x").is_err());
        assert!(sink.write(Path::new("bad|name/1.bin"), b"x").is_err());
        assert!(sink.write(Path::new(""), b"x").is_err());
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let sink = OutputSink::disabled();
        assert!(!sink.is_enabled());
        assert!(sink.initialize().is_ok());
        assert!(matches!(
            sink.write(Path::new("a/1.bin"), b"x"),
            Err(MediaError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_initialize_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("taken");
        fs::write(&file, b"x").unwrap();

        let err = OutputSink::new(&file).initialize().unwrap_err();
        assert!(err.is_fatal());
    }
}
