use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    /// Operational satellite; drawn by the display layer.
    Active,
    Debris,
}

impl ObjectClass {
    pub fn is_renderable(self) -> bool {
        matches!(self, ObjectClass::Active)
    }
}

/// Mean orbital elements of one tracked object, as loaded from an element set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElementRecord {
    pub id: u32,
    pub class: ObjectClass,
    pub inclination_deg: f64,
    /// Right ascension of the ascending node.
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
    /// Epoch the elements were fitted at.
    pub epoch: Epoch,
    /// First time derivative of mean motion divided by two, rev/day².
    #[serde(default)]
    pub drag: f64,
}

/// Immutable set of element records, loaded once per process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<OrbitalElementRecord>", into = "Vec<OrbitalElementRecord>")]
pub struct Catalog {
    records: Vec<OrbitalElementRecord>,
    id_index: HashMap<u32, usize>,
}

impl Catalog {
    /// Builds the catalog. Later records reusing an id are dropped, first one wins.
    pub fn new(records: Vec<OrbitalElementRecord>) -> Self {
        let mut kept = Vec::with_capacity(records.len());
        let mut id_index = HashMap::with_capacity(records.len());
        for record in records {
            if id_index.contains_key(&record.id) {
                warn!("duplicate catalog id {}, record dropped", record.id);
                continue;
            }
            id_index.insert(record.id, kept.len());
            kept.push(record);
        }
        Catalog {
            records: kept,
            id_index,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OrbitalElementRecord] {
        &self.records
    }

    pub fn index_of_id(&self, id: u32) -> Option<usize> {
        self.id_index.get(&id).copied()
    }

    pub fn get(&self, id: u32) -> Option<&OrbitalElementRecord> {
        self.index_of_id(id).map(|idx| &self.records[idx])
    }

    pub fn active_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.class.is_renderable())
            .count()
    }

    pub fn debris_count(&self) -> usize {
        self.len() - self.active_count()
    }
}

impl From<Vec<OrbitalElementRecord>> for Catalog {
    fn from(records: Vec<OrbitalElementRecord>) -> Self {
        Catalog::new(records)
    }
}

impl From<Catalog> for Vec<OrbitalElementRecord> {
    fn from(catalog: Catalog) -> Self {
        catalog.records
    }
}
