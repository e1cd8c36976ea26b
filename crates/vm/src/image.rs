//! Loading images: decode, verify, share.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use lso_common::{BytecodeImage, ImageDigest};

use crate::error::LoadError;

/// An image that passed verification. Cheap to clone; every clone shares
/// the same program.
#[derive(Debug, Clone)]
pub struct VerifiedImage {
    image: Arc<BytecodeImage>,
    digest: ImageDigest,
}

impl VerifiedImage {
    pub fn digest(&self) -> ImageDigest {
        self.digest
    }

    /// Whether both handles refer to the same loaded program.
    pub fn shares(&self, other: &VerifiedImage) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl Deref for VerifiedImage {
    type Target = BytecodeImage;

    fn deref(&self) -> &BytecodeImage {
        &self.image
    }
}

/// Verify a decoded image.
pub fn load(image: BytecodeImage) -> Result<VerifiedImage, LoadError> {
    lso_verifier::verify(&image).map_err(LoadError::Verify)?;
    let digest = image.digest();
    Ok(VerifiedImage {
        image: Arc::new(image),
        digest,
    })
}

/// Decode and verify image bytes.
pub fn load_bytes(bytes: &[u8]) -> Result<VerifiedImage, LoadError> {
    load(BytecodeImage::decode(bytes)?)
}

/// Loaded images by content digest, so that instances of the same
/// script share one program.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<ImageDigest, VerifiedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached image for `bytes`, loading it on first sight.
    pub fn load(&mut self, bytes: &[u8]) -> Result<VerifiedImage, LoadError> {
        let digest = ImageDigest::of(bytes);
        if let Some(hit) = self.images.get(&digest) {
            return Ok(hit.clone());
        }
        let image = load_bytes(bytes)?;
        self.images.insert(digest, image.clone());
        Ok(image)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop images no instance holds any more. Returns how many.
    pub fn evict_unused(&mut self) -> usize {
        let before = self.images.len();
        self.images
            .retain(|_, image| Arc::strong_count(&image.image) > 1);
        before - self.images.len()
    }
}
