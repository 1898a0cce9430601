pub mod kepler;

use log::{debug, trace, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use thiserror::Error;

use crate::catalog::{Catalog, OrbitalElementRecord};
use crate::epoch::Epoch;
use crate::TrackedObject;

pub use kepler::SecularJ2;

/// A record whose elements cannot produce a position at the requested epoch.
/// Only that record is skipped; the rest of the batch is unaffected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PropagationDegeneracy {
    #[error("eccentricity {eccentricity} is outside [0, 1)")]
    HyperbolicOrbit { eccentricity: f64 },
    #[error("mean motion {mean_motion} rev/day is not positive")]
    NonPositiveMeanMotion { mean_motion: f64 },
    #[error("perigee radius {perigee_radius} is below the surface")]
    Decayed { perigee_radius: f64 },
    #[error("Kepler's equation did not converge for eccentricity {eccentricity}")]
    KeplerDivergence { eccentricity: f64 },
    #[error("position is not finite")]
    NonFinite,
}

/// Maps one element record to a position at an epoch.
///
/// Implementations must be pure: the result may depend only on `record` and
/// `epoch`.
pub trait PropagationModel: Sync {
    fn position(
        &self,
        record: &OrbitalElementRecord,
        epoch: Epoch,
    ) -> Result<[f64; 3], PropagationDegeneracy>;
}

/// Output of one propagation call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Propagation {
    /// Render buffer, active satellites only, in catalog order.
    pub positions: Vec<[f32; 3]>,
    /// Every propagated record, in catalog order; input to risk detection.
    pub states: Vec<TrackedObject>,
    /// Records skipped for this call.
    pub skipped: Vec<(u32, PropagationDegeneracy)>,
}

pub fn propagate(epoch: Epoch, catalog: &Catalog) -> Propagation {
    propagate_with(&SecularJ2, epoch, catalog)
}

pub fn propagate_with<M: PropagationModel>(
    model: &M,
    epoch: Epoch,
    catalog: &Catalog,
) -> Propagation {
    let records = catalog.records();

    #[cfg(feature = "parallel")]
    let results: Vec<_> = records
        .par_iter()
        .map(|record| model.position(record, epoch))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = records
        .iter()
        .map(|record| model.position(record, epoch))
        .collect();

    let mut out = Propagation {
        positions: Vec::with_capacity(catalog.active_count()),
        states: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };

    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(pos) => {
                if record.class.is_renderable() {
                    out.positions
                        .push([pos[0] as f32, pos[1] as f32, pos[2] as f32]);
                }
                out.states.push(TrackedObject::new(record.id, pos));
            }
            Err(err) => {
                debug!("skipping object {} at epoch {}: {}", record.id, epoch.0, err);
                out.skipped.push((record.id, err));
            }
        }
    }

    if out.skipped.is_empty() {
        trace!("propagated {} objects to epoch {}", out.states.len(), epoch.0);
    } else {
        warn!(
            "propagated {} objects to epoch {}, skipped {}",
            out.states.len(),
            epoch.0,
            out.skipped.len()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::leo;
    use crate::catalog::ObjectClass;
    use proptest::prelude::*;

    fn mixed_catalog() -> Catalog {
        Catalog::new(vec![
            leo(1, ObjectClass::Active, 0.0),
            leo(2, ObjectClass::Debris, 45.0),
            leo(3, ObjectClass::Active, 90.0),
            leo(4, ObjectClass::Debris, 135.0),
        ])
    }

    #[test]
    fn empty_catalog_yields_empty_outputs() {
        let out = propagate(Epoch(27_029.0), &Catalog::default());
        assert!(out.positions.is_empty());
        assert!(out.states.is_empty());
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn positions_cover_active_records_and_states_cover_all() {
        let out = propagate(Epoch(27_029.25), &mixed_catalog());
        assert_eq!(out.positions.len(), 2);
        let ids: Vec<u32> = out.states.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(out.positions[1][0], out.states[2].pos[0] as f32);
    }

    #[test]
    fn degenerate_record_is_skipped_without_failing_the_batch() {
        let mut bad = leo(9, ObjectClass::Debris, 0.0);
        bad.eccentricity = 1.2;
        let mut records = mixed_catalog().records().to_vec();
        records.insert(1, bad);
        let out = propagate(Epoch(27_029.0), &Catalog::new(records));
        assert_eq!(out.states.len(), 4);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].0, 9);
        assert!(out.states.iter().all(|s| s.id != 9));
    }

    #[test]
    fn each_record_depends_only_on_itself() {
        let catalog = mixed_catalog();
        let alone = Catalog::new(vec![catalog.records()[2].clone()]);
        let epoch = Epoch(27_031.5);
        let full = propagate(epoch, &catalog);
        let single = propagate(epoch, &alone);
        assert_eq!(full.states[2], single.states[0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_propagation_is_deterministic(offset_days in -10.0f64..10.0) {
            let catalog = mixed_catalog();
            let epoch = Epoch(27_029.0 + offset_days);
            let a = propagate(epoch, &catalog);
            let b = propagate(epoch, &catalog);
            let bits = |p: &Propagation| -> Vec<u64> {
                p.states.iter().flat_map(|s| s.pos.map(f64::to_bits)).collect()
            };
            prop_assert_eq!(bits(&a), bits(&b));
            prop_assert_eq!(a.positions, b.positions);
        }
    }
}
