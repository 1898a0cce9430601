use serde::{Deserialize, Serialize};

use crate::ConjunctionRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Id,
    Distance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Output of one detection pass. Records arrive unordered; consumers sort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskReport {
    records: Vec<ConjunctionRecord>,
}

impl RiskReport {
    pub fn new(records: Vec<ConjunctionRecord>) -> Self {
        RiskReport { records }
    }

    pub fn records(&self) -> &[ConjunctionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ConjunctionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable sort; ties keep their current relative order.
    pub fn sort(&mut self, key: SortKey, order: SortOrder) {
        self.records.sort_by(|a, b| {
            let ord = match key {
                SortKey::Id => a.subject_id.cmp(&b.subject_id),
                SortKey::Distance => a.distance.total_cmp(&b.distance),
            };
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }

    pub fn sorted(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort(key, order);
        self
    }

    /// First `n` rows, as shown in the risk table.
    pub fn top(&self, n: usize) -> &[ConjunctionRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Subject positions as a single-precision render buffer.
    pub fn risky_positions(&self) -> Vec<[f32; 3]> {
        self.records
            .iter()
            .map(|r| [r.pos[0] as f32, r.pos[1] as f32, r.pos[2] as f32])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject_id: u32, distance: f64) -> ConjunctionRecord {
        ConjunctionRecord {
            subject_id,
            other_id: subject_id + 1000,
            distance,
            pos: [subject_id as f64, 0.0, 0.0],
        }
    }

    fn sample() -> RiskReport {
        RiskReport::new(vec![record(5, 0.02), record(2, 0.03), record(9, 0.01)])
    }

    fn subject_ids(report: &RiskReport) -> Vec<u32> {
        report.records().iter().map(|r| r.subject_id).collect()
    }

    #[test]
    fn sorts_by_id_both_ways() {
        let report = sample().sorted(SortKey::Id, SortOrder::Ascending);
        assert_eq!(subject_ids(&report), vec![2, 5, 9]);
        let report = report.sorted(SortKey::Id, SortOrder::Descending);
        assert_eq!(subject_ids(&report), vec![9, 5, 2]);
    }

    #[test]
    fn sorts_by_distance_both_ways() {
        let mut report = sample();
        report.sort(SortKey::Distance, SortOrder::Ascending);
        assert_eq!(subject_ids(&report), vec![9, 5, 2]);
        report.sort(SortKey::Distance, SortOrder::Descending);
        assert_eq!(subject_ids(&report), vec![2, 5, 9]);
    }

    #[test]
    fn top_is_clamped_to_length() {
        let report = sample();
        assert_eq!(report.top(2).len(), 2);
        assert_eq!(report.top(10).len(), 3);
        assert!(RiskReport::default().top(10).is_empty());
    }

    #[test]
    fn render_buffer_follows_record_order() {
        let report = sample().sorted(SortKey::Id, SortOrder::Ascending);
        assert_eq!(
            report.risky_positions(),
            vec![[2.0, 0.0, 0.0], [5.0, 0.0, 0.0], [9.0, 0.0, 0.0]]
        );
    }
}
