//! Perceptual fingerprints for images.
//!
//! A fingerprint summarises the coarse luminance structure of an image so
//! that re-encoded, resized or lightly recompressed copies land within a few
//! bits of each other.
//!
//! # Algorithm
//!
//! Mean hash over a 16×16 grid, computed with `image_hasher`:
//! the image is resampled to 16×16 with a bilinear filter, converted to
//! luminance, and every cell at or above the grid mean sets one bit.
//!
//! The result is a fixed 256-bit vector in the byte layout `image_hasher`
//! produces.
//!
//! # Usage
//!
//! ```no_run
//! use repost_core::fingerprint::{hash_bytes, Fingerprint};
//!
//! let a = hash_bytes(&std::fs::read("a.png").unwrap()).unwrap();
//! let b: Fingerprint = "a:00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff"
//!     .parse()
//!     .unwrap();
//! let near = a.distance(&b) <= 24;
//! ```

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RepostError, Result};

/// Side length of the sampling grid.
pub const GRID_SIZE: u32 = 16;

/// Fingerprint width in bits. Constant across the whole store.
pub const FINGERPRINT_BITS: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// Fingerprint width in bytes.
pub const FINGERPRINT_BYTES: usize = FINGERPRINT_BITS / 8;

/// Tag prefixed to the canonical encoding, naming the hash family.
const ALGORITHM_TAG: &str = "a:";

/// A fixed-width 256-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    /// Create a fingerprint from raw bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    /// Raw bit vector.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    /// Number of differing bits between two fingerprints.
    pub fn distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Canonical string encoding used as store key and wire format.
    pub fn to_canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ALGORITHM_TAG, hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = RepostError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s.strip_prefix(ALGORITHM_TAG).ok_or_else(|| {
            RepostError::InvalidFingerprint(format!("missing '{ALGORITHM_TAG}' tag: {s:?}"))
        })?;

        let bytes = hex::decode(body)
            .map_err(|e| RepostError::InvalidFingerprint(format!("invalid hex: {e}")))?;

        let bytes: [u8; FINGERPRINT_BYTES] = bytes.try_into().map_err(|v: Vec<u8>| {
            RepostError::InvalidFingerprint(format!(
                "expected {FINGERPRINT_BYTES} bytes, got {}",
                v.len()
            ))
        })?;

        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn hasher() -> Hasher {
    HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .hash_size(GRID_SIZE, GRID_SIZE)
        .resize_filter(FilterType::Triangle)
        .to_hasher()
}

/// Compute the fingerprint of a decoded image.
pub fn hash_image(image: &DynamicImage) -> Result<Fingerprint> {
    let hash = hasher().hash_image(image);
    let bytes: [u8; FINGERPRINT_BYTES] = hash.as_bytes().try_into().map_err(|_| {
        RepostError::InvalidFingerprint(format!(
            "hasher produced {} bytes, expected {FINGERPRINT_BYTES}",
            hash.as_bytes().len()
        ))
    })?;
    Ok(Fingerprint(bytes))
}

/// Decode raw image bytes and compute their fingerprint.
///
/// Supports JPEG, PNG, GIF, WebP and BMP.
pub fn hash_bytes(image_data: &[u8]) -> Result<Fingerprint> {
    let image = image::load_from_memory(image_data)
        .map_err(|e| RepostError::Decode(format!("Failed to decode image: {e}")))?;
    hash_image(&image)
}

/// Check if the provided bytes appear to be a decodable image format.
pub fn is_supported_image(data: &[u8]) -> bool {
    image::guess_format(data).is_ok()
}
