use crate::core::duplicate::ClusterId;
use crate::core::perceptual::Fingerprint;

/// One downloaded image that passed every filter.
///
/// Only `cluster_id` changes after construction; it is filled in by the
/// duplicate detector once the crawl has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub filename: String,
    pub source_page: String,
    pub source_image_url: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
    pub fingerprint: Fingerprint,
    pub cluster_id: Option<ClusterId>,
}

impl Candidate {
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Ranking key inside a cluster: bigger file first, then bigger area.
    pub fn quality_key(&self) -> (usize, u64) {
        (self.byte_size, self.pixel_area())
    }

    /// Strictly better than `other`; ties keep the incumbent.
    pub fn is_better_than(&self, other: &Candidate) -> bool {
        self.quality_key() > other.quality_key()
    }
}
