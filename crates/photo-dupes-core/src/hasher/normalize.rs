use ::exif::{In, Reader, Tag};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use thiserror::Error;
use tracing::trace;

pub const GRID_WIDTH: usize = 9;
pub const GRID_HEIGHT: usize = 8;

/// 9 columns by 8 rows of BT.601 luma, row major.
pub type LumaGrid = [[u8; GRID_WIDTH]; GRID_HEIGHT];

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The bytes are not a container any decoder recognises.
    #[error("unknown image format")]
    UnknownFormat,

    /// Recognised container, but the payload is corrupt or truncated.
    #[error("invalid image content: {0}")]
    InvalidContent(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl NormalizeError {
    /// Decode failures stick to the record; I/O failures are retried on a later pass.
    pub fn is_sticky(&self) -> bool {
        !matches!(self, NormalizeError::Io(_))
    }
}

// Decoding always happens from memory, so an I/O error out of the decoder
// means the data ended early.
fn map_image_error(err: ImageError) -> NormalizeError {
    match err {
        ImageError::Unsupported(_) => NormalizeError::UnknownFormat,
        other => NormalizeError::InvalidContent(other.to_string()),
    }
}

/// EXIF `Orientation` (1-8), if the bytes carry one.
pub fn exif_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Undo the camera rotation recorded in EXIF so the image is upright.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Decode `bytes` (format guessed from content) and auto-orient the result.
pub fn load_oriented(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(NormalizeError::UnknownFormat);
    }
    let img = reader.decode().map_err(map_image_error)?;
    match exif_orientation(bytes) {
        Some(orientation) if orientation != 1 => {
            trace!("Applying EXIF orientation {}", orientation);
            Ok(apply_orientation(img, orientation))
        }
        _ => Ok(img),
    }
}

/// Shrink to 9x8 ignoring aspect ratio and convert to grayscale.
pub fn luma_grid(img: &DynamicImage) -> LumaGrid {
    let small = img
        .resize_exact(GRID_WIDTH as u32, GRID_HEIGHT as u32, FilterType::CatmullRom)
        .to_rgb8();
    let mut grid = [[0u8; GRID_WIDTH]; GRID_HEIGHT];
    for (y, row) in grid.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            let [r, g, b] = small.get_pixel(x as u32, y as u32).0;
            *cell = bt601_luma(r, g, b);
        }
    }
    grid
}

pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

pub fn normalize_bytes(bytes: &[u8]) -> Result<LumaGrid, NormalizeError> {
    Ok(luma_grid(&load_oriented(bytes)?))
}

pub fn normalize_path(path: &Path) -> Result<LumaGrid, NormalizeError> {
    let bytes = fs::read(path)?;
    normalize_bytes(&bytes)
}
