use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detect::{Detector, OctreeLimits};
use crate::spatial::octree::{CAPACITY, MAX_DEPTH, MAX_DEPTH_LIMIT};

pub const TOLERANCE_VAR: &str = "DEBRIS_TOLERANCE";
pub const ITERATIONS_VAR: &str = "DEBRIS_ITERATIONS";
pub const DETECTOR_VAR: &str = "DEBRIS_DETECTOR";
pub const OCTREE_CAPACITY_VAR: &str = "DEBRIS_OCTREE_CAPACITY";
pub const OCTREE_MAX_DEPTH_VAR: &str = "DEBRIS_OCTREE_MAX_DEPTH";

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Defaults for detection runs that do not specify their own parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: f64,
    pub iterations: usize,
    pub detector: Detector,
    pub octree_capacity: usize,
    pub octree_max_depth: usize,
    /// Rows of the risk table a display shows.
    pub render_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tolerance: 0.001,
            iterations: 8,
            detector: Detector::Octree,
            octree_capacity: CAPACITY,
            octree_max_depth: MAX_DEPTH,
            render_rows: 10,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `DEBRIS_*` variables set in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        if let Some(v) = parse_var(&lookup, TOLERANCE_VAR, "non-negative distance")? {
            config.tolerance = v;
        }
        if !config.tolerance.is_finite() || config.tolerance < 0.0 {
            return Err(invalid(TOLERANCE_VAR, config.tolerance.to_string(), "non-negative distance"));
        }
        if let Some(v) = parse_var(&lookup, ITERATIONS_VAR, "iteration count")? {
            config.iterations = v;
        }
        if let Some(v) = parse_var(&lookup, OCTREE_CAPACITY_VAR, "leaf capacity")? {
            config.octree_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, OCTREE_MAX_DEPTH_VAR, "tree depth")? {
            config.octree_max_depth = v;
        }
        if config.octree_max_depth > MAX_DEPTH_LIMIT {
            return Err(invalid(
                OCTREE_MAX_DEPTH_VAR,
                config.octree_max_depth.to_string(),
                "tree depth (at most 64)",
            ));
        }
        if let Some(raw) = lookup(DETECTOR_VAR) {
            config.detector = match raw.trim().to_ascii_lowercase().as_str() {
                "octree" => Detector::Octree,
                "iterative" => Detector::Iterative,
                _ => return Err(invalid(DETECTOR_VAR, raw, "detector (octree|iterative)")),
            };
        }
        Ok(config)
    }

    pub fn octree_limits(&self) -> OctreeLimits {
        OctreeLimits {
            capacity: self.octree_capacity,
            max_depth: self.octree_max_depth,
        }
    }
}

fn invalid(var: &'static str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value,
        expected,
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(var, raw, expected)),
    }
}
