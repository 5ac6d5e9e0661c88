use super::normalize::{luma_grid, LumaGrid, GRID_WIDTH};
use image::DynamicImage;

/// Compare each pixel with its right neighbour, row by row. A bit is set when
/// the left pixel is strictly darker. The first comparison lands in bit 63.
pub fn difference_hash(grid: &LumaGrid) -> u64 {
    let mut hash = 0u64;
    for row in grid {
        for x in 0..GRID_WIDTH - 1 {
            hash = (hash << 1) | u64::from(row[x] < row[x + 1]);
        }
    }
    hash
}

pub fn difference_hash_image(img: &DynamicImage) -> u64 {
    difference_hash(&luma_grid(img))
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_alternating_first_row_sets_top_byte() {
        let mut grid: LumaGrid = [[0; 9]; 8];
        grid[0] = [10, 20, 10, 20, 10, 20, 10, 20, 10];
        let hash = difference_hash(&grid);
        assert_eq!(hash >> 56, 0b1010_1010);
        assert_eq!(hash & 0x00FF_FFFF_FFFF_FFFF, 0);
    }

    #[test]
    fn test_flat_grid_is_zero() {
        assert_eq!(difference_hash(&[[128; 9]; 8]), 0);
    }

    #[test]
    fn test_equal_neighbours_do_not_set_bits() {
        let grid: LumaGrid = [[5, 5, 6, 6, 7, 7, 8, 8, 9]; 8];
        // Only the strictly increasing steps (x = 1, 3, 5, 7) count.
        assert_eq!(difference_hash(&grid), 0x5555_5555_5555_5555);
    }

    #[test]
    fn test_rising_rows_set_every_bit() {
        let grid: LumaGrid = [[0, 1, 2, 3, 4, 5, 6, 7, 8]; 8];
        assert_eq!(difference_hash(&grid), u64::MAX);
    }

    #[test]
    fn test_last_row_fills_low_byte() {
        let mut grid: LumaGrid = [[0; 9]; 8];
        grid[7] = [0, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(difference_hash(&grid), 0xFF);
    }

    #[test]
    fn test_deterministic_for_same_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(120, 90, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
        }));
        let first = difference_hash_image(&img);
        let second = difference_hash_image(&img.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
    }
}
