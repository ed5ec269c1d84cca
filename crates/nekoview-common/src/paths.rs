//! Path and URL helpers for image file extensions.

use std::path::Path;

/// List of recognised image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use nekoview_common::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("nekos.moe_abc.png")));
/// assert!(!is_image_file(Path::new("notes.txt")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Extract a recognised image extension from the last path segment of a URL.
///
/// Query strings and fragments are ignored. Returns the extension lowercased.
///
/// # Examples
///
/// ```
/// use nekoview_common::paths::extension_from_url;
///
/// assert_eq!(
///     extension_from_url("https://cdn.example/a/b/1234.JPG?x=1").as_deref(),
///     Some("jpg"),
/// );
/// assert_eq!(extension_from_url("https://nekos.moe/image/abc"), None);
/// ```
pub fn extension_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file_case_insensitive() {
        assert!(is_image_file(Path::new("a.PNG")));
        assert!(is_image_file(Path::new("/tmp/e621_42.webp")));
        assert!(!is_image_file(Path::new("a")));
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://static1.e621.net/data/ab/cd/abcd.png").as_deref(),
            Some("png")
        );
        assert_eq!(
            extension_from_url("https://cdn.waifu.im/7261.jpeg#frag").as_deref(),
            Some("jpeg")
        );
        assert_eq!(extension_from_url("https://host/file.txt"), None);
        assert_eq!(extension_from_url("https://host.with.dots/"), None);
    }
}
