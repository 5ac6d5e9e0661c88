use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};

/// Average and DCT hashers, both producing 8x8 = 64 bit hashes.
///
/// Building a DCT hasher precomputes its transform tables, so the hash pass
/// creates one set per worker thread and reuses it.
pub struct LibraryHashers {
    average: Hasher,
    perceptual: Hasher,
}

impl LibraryHashers {
    pub fn new() -> Self {
        Self {
            average: HasherConfig::new()
                .hash_size(8, 8)
                .hash_alg(HashAlg::Mean)
                .to_hasher(),
            perceptual: HasherConfig::new()
                .hash_size(8, 8)
                .hash_alg(HashAlg::Median)
                .preproc_dct()
                .to_hasher(),
        }
    }

    pub fn average_hash(&self, img: &DynamicImage) -> u64 {
        pack(&self.average.hash_image(img))
    }

    pub fn perceptual_hash(&self, img: &DynamicImage) -> u64 {
        pack(&self.perceptual.hash_image(img))
    }
}

impl Default for LibraryHashers {
    fn default() -> Self {
        Self::new()
    }
}

/// First hash byte becomes the most significant byte.
fn pack(hash: &ImageHash) -> u64 {
    let bytes = hash.as_bytes();
    let mut packed = [0u8; 8];
    let len = bytes.len().min(8);
    packed[..len].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(packed)
}
