//! Media source - where preload fetches actually read bytes from.
//!
//! `MediaSource` is the seam between the preloader and storage. `FileSource`
//! serves local files: `file://` URLs and plain paths (relative ones resolve
//! against the source root). Remote URLs are rejected, as are files whose
//! extension does not match the declared media kind.

use anyhow::{Context, Result, bail, ensure};
use std::path::{Path, PathBuf};

use crate::entities::Media;
use crate::utils::media::kind_for_path;

/// Fetch backend used by the preloader and the renderer
pub trait MediaSource: Send + Sync {
    /// Read the complete asset. Errors on unreachable, empty or mistyped media.
    fn fetch(&self, media: &Media) -> Result<Vec<u8>>;
}

#[derive(Clone, Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a media URL onto the filesystem
    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        if url.starts_with("http://") || url.starts_with("https://") {
            bail!("Remote media is not reachable from a file source: {}", url);
        }
        let raw = url.strip_prefix("file://").unwrap_or(url);
        let end = raw.find(['?', '#']).unwrap_or(raw.len());
        let path = Path::new(&raw[..end]);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }
}

impl MediaSource for FileSource {
    fn fetch(&self, media: &Media) -> Result<Vec<u8>> {
        let path = self.resolve(&media.url)?;
        match kind_for_path(&path) {
            Some(kind) if kind == media.kind => {}
            Some(kind) => bail!(
                "Media {} declared as {} but looks like {}",
                path.display(),
                media.kind,
                kind
            ),
            None => bail!("Unsupported media type: {}", path.display()),
        }

        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read media: {}", path.display()))?;
        ensure!(!bytes.is_empty(), "Empty media file: {}", path.display());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("storyplay_source_{}_{}", name, std::process::id()));
        let _ = fs::create_dir_all(&dir);
        dir
    }

    #[test]
    fn test_resolve_relative_and_file_url() {
        let source = FileSource::new("/media");
        assert_eq!(source.resolve("a/b.jpg").unwrap(), PathBuf::from("/media/a/b.jpg"));
        assert_eq!(source.resolve("file:///tmp/x.png").unwrap(), PathBuf::from("/tmp/x.png"));
        assert_eq!(source.resolve("c.jpg?w=400").unwrap(), PathBuf::from("/media/c.jpg"));
        assert!(source.resolve("https://example.com/a.jpg").is_err());
    }

    #[test]
    fn test_fetch_reads_matching_kind() {
        let root = temp_root("fetch");
        fs::write(root.join("ok.jpg"), b"jpeg-bytes").unwrap();
        fs::write(root.join("clip.mp4"), b"mp4-bytes").unwrap();
        fs::write(root.join("empty.png"), b"").unwrap();
        let source = FileSource::new(&root);

        assert_eq!(source.fetch(&Media::image("ok.jpg", 5000)).unwrap(), b"jpeg-bytes");
        assert!(source.fetch(&Media::video("clip.mp4", 8000)).is_ok());

        // Kind mismatch, unsupported extension, missing and empty files all fail
        assert!(source.fetch(&Media::video("ok.jpg", 5000)).is_err());
        assert!(source.fetch(&Media::image("notes.txt", 5000)).is_err());
        assert!(source.fetch(&Media::image("missing.jpg", 5000)).is_err());
        assert!(source.fetch(&Media::image("empty.png", 5000)).is_err());

        let _ = fs::remove_dir_all(&root);
    }
}
