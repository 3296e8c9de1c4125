use std::path::Path;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Detects MIME type based on file extension
pub fn from_path(path: &Path) -> Option<MimeType> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(from_extension)
}

/// Detects MIME type from file extension string
fn from_extension(ext: &str) -> Option<MimeType> {
    let ext_lower = ext.to_lowercase();
    match ext_lower.as_str() {
        "jpg" | "jpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "bmp" => Some(MimeType::new("image", "bmp")),
        "tiff" | "tif" => Some(MimeType::new("image", "tiff")),
        "heic" => Some(MimeType::new("image", "heic")),
        _ => None,
    }
}

/// Lowercased extension of an uploaded file name, if it is a safe, short token.
pub fn safe_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_lowercase())
}

/// Image MIME type for an upload: a declared `image/*` type wins, then the
/// file extension, then JPEG.
pub fn image_mime_type(file_name: &str, declared: Option<&str>) -> String {
    if let Some(declared) = declared.filter(|d| d.starts_with("image/")) {
        return declared.to_string();
    }
    from_path(Path::new(file_name))
        .map(|m| m.to_string())
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
}

impl MimeType {
    fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let mime = from_path(Path::new("photo.PNG")).unwrap();
        assert_eq!(mime.type_(), "image");
        assert_eq!(mime.subtype(), "png");
        assert_eq!(mime.to_string(), "image/png");

        assert_eq!(from_path(Path::new("a.jpeg")).unwrap().to_string(), "image/jpeg");
        assert!(from_path(Path::new("notes.txt")).is_none());
        assert!(from_path(Path::new("no_extension")).is_none());
    }

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("Holiday.JPG"), Some("jpg".to_string()));
        assert_eq!(safe_extension("capture.webp"), Some("webp".to_string()));
        assert_eq!(safe_extension("blob"), None);
        assert_eq!(safe_extension("weird.j?g"), None);
        assert_eq!(safe_extension("x.averyveryverylongext"), None);
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("a.png", Some("image/webp")), "image/webp");
        assert_eq!(image_mime_type("a.png", Some("application/octet-stream")), "image/png");
        assert_eq!(image_mime_type("a.png", None), "image/png");
        assert_eq!(image_mime_type("blob", None), "image/jpeg");
    }
}
