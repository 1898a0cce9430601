pub mod catalog;
pub mod config;
pub mod detect;
pub mod epoch;
pub mod propagation;
pub mod report;
pub mod session;
pub mod spatial;
pub mod sweep;

use serde::{Deserialize, Serialize};

/// Propagated position of one catalog object at a single epoch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackedObject {
    pub id: u32,
    /// Earth-centred inertial position, in Earth radii.
    pub pos: [f64; 3],
}

impl TrackedObject {
    pub fn new(id: u32, pos: [f64; 3]) -> Self {
        TrackedObject { id, pos }
    }

    pub fn distance(&self, other: &TrackedObject) -> f64 {
        self.distance_to_point(other.pos)
    }

    pub fn distance_to_point(&self, p: [f64; 3]) -> f64 {
        let dx = self.pos[0] - p[0];
        let dy = self.pos[1] - p[1];
        let dz = self.pos[2] - p[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.pos.iter().all(|c| c.is_finite())
    }
}

/// A tracked object whose nearest neighbour lies within the risk tolerance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConjunctionRecord {
    pub subject_id: u32,
    pub other_id: u32,
    pub distance: f64,
    /// Position of the subject, for highlighting.
    pub pos: [f64; 3],
}

/// Best neighbour found so far for a subject during a detection pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub index: usize,
    pub id: u32,
    pub distance: f64,
}

impl Candidate {
    /// Closer wins; equal distances go to the lower catalog id.
    pub(crate) fn beats(&self, current: Option<&Candidate>) -> bool {
        match current {
            None => true,
            Some(best) => {
                self.distance < best.distance
                    || (self.distance == best.distance && self.id < best.id)
            }
        }
    }
}

pub(crate) fn conjunction(subject: &TrackedObject, best: &Candidate) -> ConjunctionRecord {
    ConjunctionRecord {
        subject_id: subject.id,
        other_id: best.id,
        distance: best.distance,
        pos: subject.pos,
    }
}
