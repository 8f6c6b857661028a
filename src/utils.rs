//! Utility functions and constants
//!
//! **Used by**: media source (kind checks), feed validation

/// Media file type detection
pub mod media {
    use std::path::Path;

    use crate::entities::MediaKind;

    /// Supported video file extensions
    pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "webm", "m4v", "mkv"];

    /// Supported image file extensions
    pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

    /// Detect media kind from a path extension
    pub fn kind_for_path(path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if VIDEO_EXTS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    /// Detect media kind from a URL, ignoring query string and fragment
    pub fn kind_for_url(url: &str) -> Option<MediaKind> {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        kind_for_path(Path::new(&url[..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::media::*;
    use std::path::Path;
    use crate::entities::MediaKind;

    #[test]
    fn test_kind_detection() {
        assert_eq!(kind_for_url("clips/ForBiggerBlazes.MP4"), Some(MediaKind::Video));
        assert_eq!(kind_for_path(Path::new("photo.jpeg")), Some(MediaKind::Image));
        assert_eq!(kind_for_url("https://cdn/x/photo.jpg?w=400&h=600#top"), Some(MediaKind::Image));
        assert_eq!(kind_for_url("notes.txt"), None);
        assert_eq!(kind_for_url("no_extension"), None);
    }
}
