use clap::ValueEnum;
use image::DynamicImage;
use image::imageops::FilterType;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FALLBACK_PREFIX: &str = "ahash-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FingerprintAlgorithm {
    /// DCT perceptual hash, robust to recompression and resizing
    #[default]
    Phash,
    /// Coarse 8x8 average-brightness hash
    Ahash,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid fingerprint: {0:?}")]
pub struct FingerprintParseError(String);

/// A 64-bit perceptual hash tagged with the algorithm that produced it.
///
/// Hashes from different algorithms never match: their distance is the
/// maximum, [`Fingerprint::BITS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Primary(u64),
    Fallback(u64),
}

impl Fingerprint {
    pub const BITS: u32 = 64;

    /// Hamming distance between two fingerprints of the same kind.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        match (self, other) {
            (Fingerprint::Primary(a), Fingerprint::Primary(b))
            | (Fingerprint::Fallback(a), Fingerprint::Fallback(b)) => (a ^ b).count_ones(),
            _ => Self::BITS,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Primary(bits) => write!(f, "{:016x}", bits),
            Fingerprint::Fallback(bits) => write!(f, "{}{:016x}", FALLBACK_PREFIX, bits),
        }
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FingerprintParseError(s.to_string());
        let (hex, fallback) = match s.strip_prefix(FALLBACK_PREFIX) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if hex.is_empty() || hex.len() > 16 {
            return Err(invalid());
        }
        let bits = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
        Ok(if fallback {
            Fingerprint::Fallback(bits)
        } else {
            Fingerprint::Primary(bits)
        })
    }
}

/// Computes fingerprints for decoded images with the configured algorithm.
pub struct Fingerprinter {
    algorithm: FingerprintAlgorithm,
    phash: Hasher,
}

impl Fingerprinter {
    pub fn new(algorithm: FingerprintAlgorithm) -> Self {
        let phash = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { algorithm, phash }
    }

    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    pub fn fingerprint(&self, image: &DynamicImage) -> Fingerprint {
        match self.algorithm {
            FingerprintAlgorithm::Phash => {
                let hash = self.phash.hash_image(image);
                Fingerprint::Primary(pack_bits(hash.as_bytes()))
            }
            FingerprintAlgorithm::Ahash => Fingerprint::Fallback(average_hash(image)),
        }
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(FingerprintAlgorithm::default())
    }
}

/// 8x8 grayscale thumbnail; a bit is set where the pixel is brighter than
/// the mean. Row-major, most significant bit first.
pub fn average_hash(image: &DynamicImage) -> u64 {
    let thumb = image.grayscale().resize_exact(8, 8, FilterType::Triangle).to_luma8();
    let pixels: Vec<u32> = thumb.pixels().map(|p| u32::from(p.0[0])).collect();
    let sum: u32 = pixels.iter().sum();
    let count = pixels.len() as u32;

    pixels
        .iter()
        .fold(0u64, |acc, &p| (acc << 1) | u64::from(p * count > sum))
}

fn pack_bits(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
