// Near-duplicate clustering over perceptual fingerprints.
//
// Clustering is a single streaming pass in discovery order: each candidate
// is compared against every existing group's probe fingerprint, oldest group
// first, and joins the first one within the threshold. The result depends on
// input order, so callers must pass candidates exactly as discovered.

use crate::core::candidate::Candidate;
use crate::core::perceptual::Fingerprint;
use log::debug;
use std::fmt;

/// Maximum Hamming distance (inclusive) for two images to be near-duplicates.
pub const PHASH_DISTANCE_THRESHOLD: u32 = 6;

/// Cluster label, numbered from 1 in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster-{:03}", self.0)
    }
}

/// A group of near-identical images being built up during clustering.
struct DuplicateGroup {
    id: ClusterId,
    // Fixed at creation; new candidates are matched against this only.
    probe: Fingerprint,
    members: Vec<Candidate>,
    best: usize,
}

impl DuplicateGroup {
    fn new(id: ClusterId, mut candidate: Candidate) -> Self {
        candidate.cluster_id = Some(id);
        Self {
            id,
            probe: candidate.fingerprint,
            members: vec![candidate],
            best: 0,
        }
    }

    fn add(&mut self, mut candidate: Candidate) {
        candidate.cluster_id = Some(self.id);
        if candidate.is_better_than(&self.members[self.best]) {
            self.best = self.members.len();
        }
        self.members.push(candidate);
    }

    fn into_representative(mut self) -> Candidate {
        self.members.swap_remove(self.best)
    }
}

pub struct DuplicateDetector {
    pub threshold: u32,
}

impl DuplicateDetector {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Partition `candidates` into clusters and return one representative
    /// per cluster, in cluster-creation order, each with its `cluster_id` set.
    pub fn cluster(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut groups: Vec<DuplicateGroup> = Vec::new();

        for candidate in candidates {
            let matched = groups
                .iter_mut()
                .find(|group| group.probe.distance(&candidate.fingerprint) <= self.threshold);

            match matched {
                Some(group) => {
                    debug!("{} joins {}", candidate.filename, group.id);
                    group.add(candidate);
                }
                None => {
                    let id = ClusterId(groups.len() as u32 + 1);
                    groups.push(DuplicateGroup::new(id, candidate));
                }
            }
        }

        groups
            .into_iter()
            .map(DuplicateGroup::into_representative)
            .collect()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(PHASH_DISTANCE_THRESHOLD)
    }
}
