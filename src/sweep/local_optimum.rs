use log::{debug, info};

use crate::{conjunction, Candidate, ConjunctionRecord, TrackedObject};

/// Rank window scanned on each side during the first pass; doubles every pass.
pub const INITIAL_WINDOW: usize = 8;

/// Per-object scan progress along the x-sorted order.
#[derive(Clone, Copy, Debug)]
struct Frontier {
    /// Next rank to look at below / above the object, if that side is still open.
    below: Option<usize>,
    above: Option<usize>,
}

impl Frontier {
    fn is_open(&self) -> bool {
        self.below.is_some() || self.above.is_some()
    }
}

/// Iterative nearest-neighbour refinement.
///
/// Objects are sorted by x. Each pass widens the rank window every still-open
/// object scans on both sides and tightens its best candidate. A side closes
/// once the x gap alone exceeds the best distance found, so the open set
/// shrinks pass by pass. The scan stops after `max_iterations` passes or once
/// no object can improve any further, at which point the result equals the
/// exact nearest neighbour within `tolerance` for every object. A pass that
/// finds nothing closer does not end the scan while any side is still open.
pub fn find_local_optimum(
    states: &[TrackedObject],
    tolerance: f64,
    max_iterations: usize,
) -> Vec<ConjunctionRecord> {
    let states: Vec<TrackedObject> = states.iter().filter(|s| s.is_finite()).copied().collect();
    if states.len() < 2 || tolerance.is_nan() || tolerance < 0.0 {
        return Vec::new();
    }
    let states = states.as_slice();

    let mut order: Vec<usize> = (0..states.len()).collect();
    order.sort_by(|&a, &b| {
        states[a].pos[0]
            .total_cmp(&states[b].pos[0])
            .then(states[a].id.cmp(&states[b].id))
    });
    let last = order.len() - 1;

    let mut best: Vec<Option<Candidate>> = vec![None; states.len()];
    let mut frontier: Vec<Frontier> = (0..order.len())
        .map(|rank| Frontier {
            below: rank.checked_sub(1),
            above: (rank < last).then_some(rank + 1),
        })
        .collect();
    let mut open: Vec<usize> = (0..order.len()).collect();

    let mut passes = 0;
    while passes < max_iterations && !open.is_empty() {
        let window = INITIAL_WINDOW.saturating_mul(2usize.saturating_pow(passes.min(63) as u32));
        let mut improved = 0usize;

        for &rank in &open {
            let subject = order[rank];
            let lowest = rank.saturating_sub(window);
            let highest = rank.saturating_add(window).min(last);
            let mut f = frontier[rank];

            while let Some(r) = f.below {
                if r < lowest {
                    break;
                }
                if !consider(states, subject, order[r], tolerance, &mut best[subject], &mut improved) {
                    f.below = None;
                    break;
                }
                f.below = r.checked_sub(1);
            }
            while let Some(r) = f.above {
                if r > highest {
                    break;
                }
                if !consider(states, subject, order[r], tolerance, &mut best[subject], &mut improved) {
                    f.above = None;
                    break;
                }
                f.above = (r < last).then_some(r + 1);
            }
            frontier[rank] = f;
        }

        open.retain(|&rank| frontier[rank].is_open());
        passes += 1;
        debug!(
            "pass {}: window {}, {} improvements, {} objects still open",
            passes,
            window,
            improved,
            open.len()
        );
    }

    let risky: Vec<ConjunctionRecord> = states
        .iter()
        .zip(&best)
        .filter_map(|(subject, best)| best.as_ref().map(|b| conjunction(subject, b)))
        .collect();
    info!(
        "iterative scan: {} of {} objects within {} after {} passes",
        risky.len(),
        states.len(),
        tolerance,
        passes
    );
    risky
}

/// Evaluates `other` against the subject's best candidate.
/// Returns false once the x gap alone rules out this and every farther rank.
fn consider(
    states: &[TrackedObject],
    subject: usize,
    other: usize,
    tolerance: f64,
    best: &mut Option<Candidate>,
    improved: &mut usize,
) -> bool {
    let bound = best.map_or(tolerance, |b| b.distance);
    let gap = (states[other].pos[0] - states[subject].pos[0]).abs();
    if gap > bound {
        return false;
    }
    let distance = states[subject].distance(&states[other]);
    if distance <= tolerance {
        let candidate = Candidate {
            index: other,
            id: states[other].id,
            distance,
        };
        if candidate.beats(best.as_ref()) {
            *best = Some(candidate);
            *improved += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn line(n: usize, spacing: f64) -> Vec<TrackedObject> {
        (0..n)
            .map(|i| TrackedObject::new(i as u32 + 1, [i as f64 * spacing, 0.0, 0.0]))
            .collect()
    }

    #[test]
    fn close_pair_reports_each_other() {
        let s = vec![
            TrackedObject::new(1, [0.0, 0.0, 0.0]),
            TrackedObject::new(2, [0.0, 0.0, 0.0001]),
            TrackedObject::new(3, [10.0, 10.0, 10.0]),
        ];
        let risky = find_local_optimum(&s, 0.01, 10);
        assert_eq!(risky.len(), 2);
        assert_eq!((risky[0].subject_id, risky[0].other_id), (1, 2));
        assert_eq!((risky[1].subject_id, risky[1].other_id), (2, 1));
        assert_approx_eq!(risky[0].distance, 0.0001, 1e-12);
    }

    #[test]
    fn fewer_than_two_objects_report_nothing() {
        assert!(find_local_optimum(&[], 1.0, 10).is_empty());
        assert!(find_local_optimum(&line(1, 1.0), 1.0, 10).is_empty());
    }

    #[test]
    fn zero_iterations_report_nothing() {
        assert!(find_local_optimum(&line(4, 0.1), 1.0, 0).is_empty());
    }

    /// Many objects share an x coordinate but are spread in y, so the true
    /// neighbour of the last object sits far away in rank order.
    fn crowded_column() -> Vec<TrackedObject> {
        let mut s: Vec<TrackedObject> = (0..40)
            .map(|i| TrackedObject::new(i + 1, [0.0, i as f64, 0.0]))
            .collect();
        s.push(TrackedObject::new(100, [0.0, 0.05, 0.0]));
        s
    }

    #[test]
    fn small_budget_can_miss_distant_ranks() {
        let s = crowded_column();
        let early = find_local_optimum(&s, 0.1, 1);
        let converged = find_local_optimum(&s, 0.1, 64);
        assert!(early.len() < converged.len());
        let mut ids: Vec<u32> = converged.iter().map(|r| r.subject_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 100]);
    }

    #[test]
    fn passes_without_improvement_do_not_stop_the_scan() {
        // Windows of 8, 16 and 32 ranks find nothing; the fourth pass reaches rank 40.
        let s = crowded_column();
        assert!(find_local_optimum(&s, 0.1, 3).is_empty());
        let found = find_local_optimum(&s, 0.1, 4);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.subject_id == 1 || r.subject_id == 100));
    }

    #[test]
    fn coincident_objects_all_qualify_at_zero_distance() {
        let s: Vec<TrackedObject> = (0..5).map(|i| TrackedObject::new(i + 1, [0.0; 3])).collect();
        let risky = find_local_optimum(&s, 0.001, 8);
        assert_eq!(risky.len(), 5);
        assert!(risky.iter().all(|r| r.distance == 0.0 && r.subject_id != r.other_id));
    }
}
