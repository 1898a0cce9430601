//! Two-body Kepler propagation with J2 secular drift and a mean-motion drag term.
//!
//! Lengths are in Earth radii and time in minutes internally; the element
//! records carry degrees, revolutions per day and epochs in days.

use std::f64::consts::TAU;

use crate::catalog::OrbitalElementRecord;
use crate::epoch::Epoch;

use super::{PropagationDegeneracy, PropagationModel};

/// sqrt(GM) in Earth radii^1.5 per minute (WGS-72).
pub const KE: f64 = 0.074_366_916_133_173_4;
/// Second zonal harmonic (WGS-72).
pub const J2: f64 = 1.082_616e-3;

const MINUTES_PER_DAY: f64 = 1440.0;
const KEPLER_MAX_ITERATIONS: usize = 50;
const KEPLER_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SecularJ2;

impl SecularJ2 {
    /// Solve Kepler's equation M = E - e*sin(E) for E with Newton's method.
    pub fn solve_eccentric_anomaly(
        mean_anomaly: f64,
        eccentricity: f64,
    ) -> Result<f64, PropagationDegeneracy> {
        let m = mean_anomaly.rem_euclid(TAU);
        let mut e_anomaly = if eccentricity < 0.8 {
            m
        } else {
            std::f64::consts::PI
        };

        for _ in 0..KEPLER_MAX_ITERATIONS {
            let f = e_anomaly - eccentricity * e_anomaly.sin() - m;
            let f_prime = 1.0 - eccentricity * e_anomaly.cos();
            let delta = f / f_prime;
            e_anomaly -= delta;
            if delta.abs() < KEPLER_TOLERANCE {
                return Ok(e_anomaly);
            }
        }
        Err(PropagationDegeneracy::KeplerDivergence { eccentricity })
    }
}

impl PropagationModel for SecularJ2 {
    fn position(
        &self,
        record: &OrbitalElementRecord,
        epoch: Epoch,
    ) -> Result<[f64; 3], PropagationDegeneracy> {
        let e = record.eccentricity;
        if !(0.0..1.0).contains(&e) {
            return Err(PropagationDegeneracy::HyperbolicOrbit { eccentricity: e });
        }

        let dt_days = epoch.since(record.epoch);
        let n_now = record.mean_motion_rev_per_day + 2.0 * record.drag * dt_days;
        if record.mean_motion_rev_per_day <= 0.0 || n_now <= 0.0 {
            return Err(PropagationDegeneracy::NonPositiveMeanMotion {
                mean_motion: n_now,
            });
        }

        // Secular rates are taken from the elements at their own epoch so the
        // solution stays smooth in `epoch`.
        let n0 = record.mean_motion_rev_per_day * TAU / MINUTES_PER_DAY;
        let a0 = (KE / n0).powf(2.0 / 3.0);
        let a_now = (KE / (n_now * TAU / MINUTES_PER_DAY)).powf(2.0 / 3.0);
        if a_now * (1.0 - e) < 1.0 {
            return Err(PropagationDegeneracy::Decayed {
                perigee_radius: a_now * (1.0 - e),
            });
        }

        let incl = record.inclination_deg.to_radians();
        let cos_i = incl.cos();
        let beta2 = 1.0 - e * e;
        let p0 = a0 * beta2;
        let j2_factor = 0.75 * J2 * n0 / (p0 * p0);
        let raan_rate = -2.0 * j2_factor * cos_i;
        let argp_rate = j2_factor * (5.0 * cos_i * cos_i - 1.0);
        let mean_rate = n0 + j2_factor * beta2.sqrt() * (3.0 * cos_i * cos_i - 1.0);

        let dt_min = dt_days * MINUTES_PER_DAY;
        let raan = record.raan_deg.to_radians() + raan_rate * dt_min;
        let argp = record.arg_perigee_deg.to_radians() + argp_rate * dt_min;
        let mean_anomaly = record.mean_anomaly_deg.to_radians()
            + mean_rate * dt_min
            + TAU * record.drag * dt_days * dt_days;

        let e_anomaly = Self::solve_eccentric_anomaly(mean_anomaly, e)?;
        let half = e_anomaly / 2.0;
        let true_anomaly = 2.0 * ((1.0 + e).sqrt() * half.sin()).atan2((1.0 - e).sqrt() * half.cos());
        let radius = a_now * (1.0 - e * e_anomaly.cos());

        let u = argp + true_anomaly;
        let (sin_u, cos_u) = u.sin_cos();
        let (sin_raan, cos_raan) = raan.sin_cos();
        let sin_i = incl.sin();

        let pos = [
            radius * (cos_raan * cos_u - sin_raan * sin_u * cos_i),
            radius * (sin_raan * cos_u + cos_raan * sin_u * cos_i),
            radius * sin_u * sin_i,
        ];
        if pos.iter().all(|c| c.is_finite()) {
            Ok(pos)
        } else {
            Err(PropagationDegeneracy::NonFinite)
        }
    }
}
