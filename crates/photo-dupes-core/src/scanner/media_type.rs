use crate::storage::MediaGroup;
use std::path::Path;

/// Extensions recognised by the scan, upper-cased with the leading dot.
pub const PHOTO_EXTENSIONS: &[&str] = &[
    ".BMP", ".EPS", ".GIF", ".ICO", ".JPEG", ".JPG", ".PCX", ".PNG", ".PSD", ".TIF", ".TIFF",
    ".WEBP",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".3GP", ".AVI", ".M4V", ".MOV", ".MP", ".MP3", ".MP4", ".MPG", ".MTS", ".WMV",
];

/// Photo extensions the hash pass can decode. Every fingerprint kind applies.
pub const HASHABLE_PHOTO_EXTENSIONS: &[&str] = &[
    ".BMP", ".GIF", ".JPEG", ".JPG", ".PNG", ".TIF", ".TIFF", ".WEBP",
];

/// Video extensions the hash pass accepts. Digest only.
pub const HASHABLE_VIDEO_EXTENSIONS: &[&str] = &[
    ".3GP", ".AVI", ".MOV", ".MP", ".MP4", ".MPG", ".MTS", ".WMV",
];

/// `img.jpg` -> `.JPG`. `None` when the path has no extension.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_uppercase()))
}

pub fn classify(ext: &str) -> MediaGroup {
    let ext = ext.to_uppercase();
    if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        MediaGroup::Photo
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaGroup::Video
    } else {
        MediaGroup::Unknown
    }
}

pub fn is_hashable(ext: &str) -> bool {
    let ext = ext.to_uppercase();
    HASHABLE_PHOTO_EXTENSIONS.contains(&ext.as_str())
        || HASHABLE_VIDEO_EXTENSIONS.contains(&ext.as_str())
}

pub fn supports_perceptual(ext: &str) -> bool {
    HASHABLE_PHOTO_EXTENSIONS.contains(&ext.to_uppercase().as_str())
}
