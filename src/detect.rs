use std::collections::TryReserveError;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::report::RiskReport;
use crate::spatial::octree::{Octree, CAPACITY, MAX_DEPTH};
use crate::sweep::local_optimum::find_local_optimum;
use crate::TrackedObject;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("tolerance {0} must be a finite, non-negative distance")]
    InvalidTolerance(f64),
    #[error("octree allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Conjunction detection strategy, chosen once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    #[default]
    Octree,
    Iterative,
}

/// Octree shape limits used by [`Detector::Octree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OctreeLimits {
    pub capacity: usize,
    pub max_depth: usize,
}

impl Default for OctreeLimits {
    fn default() -> Self {
        OctreeLimits {
            capacity: CAPACITY,
            max_depth: MAX_DEPTH,
        }
    }
}

impl Detector {
    /// Runs one detection pass over an immutable snapshot of states.
    /// `iterations` only applies to [`Detector::Iterative`].
    pub fn detect(
        self,
        states: &[TrackedObject],
        tolerance: f64,
        iterations: usize,
    ) -> Result<RiskReport, DetectionError> {
        self.detect_with(states, tolerance, iterations, OctreeLimits::default())
    }

    pub fn detect_with(
        self,
        states: &[TrackedObject],
        tolerance: f64,
        iterations: usize,
        limits: OctreeLimits,
    ) -> Result<RiskReport, DetectionError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(DetectionError::InvalidTolerance(tolerance));
        }
        info!(
            "running {:?} detection over {} objects, tolerance {}",
            self,
            states.len(),
            tolerance
        );
        let records = match self {
            Detector::Octree => {
                Octree::with_limits(states, limits.capacity, limits.max_depth)?
                    .find_risky_debris(tolerance)
            }
            Detector::Iterative => find_local_optimum(states, tolerance, iterations),
        };
        Ok(RiskReport::new(records))
    }
}

/// Runs detection on tokio's blocking pool so the caller's loop keeps going.
/// Dropping the handle discards the result.
pub fn detect_in_background(
    detector: Detector,
    states: Arc<[TrackedObject]>,
    tolerance: f64,
    iterations: usize,
    limits: OctreeLimits,
) -> JoinHandle<Result<RiskReport, DetectionError>> {
    tokio::task::spawn_blocking(move || detector.detect_with(&states, tolerance, iterations, limits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(report: &RiskReport) -> Vec<u32> {
        let mut ids: Vec<u32> = report.records().iter().map(|r| r.subject_id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let states = [TrackedObject::new(1, [0.0; 3])];
        assert!(matches!(
            Detector::Octree.detect(&states, -1.0, 1),
            Err(DetectionError::InvalidTolerance(_))
        ));
        assert!(Detector::Iterative.detect(&states, f64::NAN, 1).is_err());
    }

    #[test]
    fn empty_snapshot_yields_empty_reports() {
        for detector in [Detector::Octree, Detector::Iterative] {
            assert!(detector.detect(&[], 0.01, 8).unwrap().is_empty());
        }
    }

    #[test]
    fn detector_names_round_trip_through_json() {
        let json = serde_json::to_string(&Detector::Iterative).unwrap();
        assert_eq!(json, "\"iterative\"");
        let back: Detector = serde_json::from_str("\"octree\"").unwrap();
        assert_eq!(back, Detector::Octree);
    }

    #[tokio::test]
    async fn background_detection_returns_the_report() {
        let states: Arc<[TrackedObject]> = vec![
            TrackedObject::new(1, [0.0, 0.0, 0.0]),
            TrackedObject::new(2, [0.0, 0.0, 0.0001]),
            TrackedObject::new(3, [10.0, 10.0, 10.0]),
        ]
        .into();
        let report = detect_in_background(Detector::Octree, states, 0.01, 1, OctreeLimits::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&report), vec![1, 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_detectors_agree_at_convergence(
            points in prop::collection::vec(
                (-2.0f64..2.0, -2.0f64..2.0, -2.0f64..2.0),
                0..80,
            ),
            tolerance in 0.0f64..1.0,
        ) {
            let states: Vec<TrackedObject> = points
                .iter()
                .enumerate()
                .map(|(i, &(x, y, z))| TrackedObject::new(i as u32 * 3 + 1, [x, y, z]))
                .collect();
            let octree = Detector::Octree.detect(&states, tolerance, 0).unwrap();
            let iterative = Detector::Iterative.detect(&states, tolerance, 64).unwrap();
            prop_assert_eq!(ids(&octree), ids(&iterative));
            prop_assert!(octree.records().iter().all(|r| r.subject_id != r.other_id));
        }
    }
}
