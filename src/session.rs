//! Control state owned by the caller's render loop: the simulation clock and
//! the latest risk report with its selection.

use log::{info, warn};

use crate::catalog::Catalog;
use crate::detect::{DetectionError, Detector};
use crate::epoch::{from_calendar, to_calendar, Datetime, Epoch, InvalidDateError, SECONDS_PER_DAY};
use crate::propagation::propagate;
use crate::report::{RiskReport, SortKey, SortOrder};
use crate::ConjunctionRecord;

pub const MIN_SPEED_EXPONENT: i32 = -1;
pub const MAX_SPEED_EXPONENT: i32 = 9;

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationClock {
    base: Epoch,
    elapsed_seconds: f64,
    paused: bool,
    speed_exponent: i32,
    invalid_input: bool,
}

impl SimulationClock {
    /// Starts paused at `base`, running at real time once resumed.
    pub fn new(base: Epoch) -> Self {
        SimulationClock {
            base,
            elapsed_seconds: 0.0,
            paused: true,
            speed_exponent: 0,
            invalid_input: false,
        }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.base.advance(self.elapsed_seconds / SECONDS_PER_DAY)
    }

    pub fn current_calendar(&self) -> Result<Datetime, InvalidDateError> {
        to_calendar(self.current_epoch())
    }

    /// Advances simulated time by `frame_seconds` of wall time, scaled by the
    /// speed multiplier. No-op while paused.
    pub fn tick(&mut self, frame_seconds: f64) {
        if !self.paused {
            self.elapsed_seconds += frame_seconds * self.speed_multiplier();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn speed_exponent(&self) -> i32 {
        self.speed_exponent
    }

    pub fn speed_multiplier(&self) -> f64 {
        10f64.powi(self.speed_exponent)
    }

    pub fn faster(&mut self) {
        self.speed_exponent = (self.speed_exponent + 1).min(MAX_SPEED_EXPONENT);
    }

    pub fn slower(&mut self) {
        self.speed_exponent = (self.speed_exponent - 1).max(MIN_SPEED_EXPONENT);
    }

    /// Jumps to a calendar instant. On invalid input the current epoch is
    /// kept and [`Self::invalid_input`] stays raised until the next valid edit.
    pub fn set_calendar(&mut self, datetime: Datetime) -> Result<Epoch, InvalidDateError> {
        match from_calendar(datetime) {
            Ok(epoch) => {
                self.base = epoch;
                self.elapsed_seconds = 0.0;
                self.invalid_input = false;
                Ok(epoch)
            }
            Err(err) => {
                warn!("rejected calendar edit {:?}: {}", datetime, err);
                self.invalid_input = true;
                Err(err)
            }
        }
    }

    pub fn invalid_input(&self) -> bool {
        self.invalid_input
    }
}

/// Latest risk report plus the row the user picked, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskView {
    report: RiskReport,
    selected: Option<u32>,
}

impl RiskView {
    pub fn report(&self) -> &RiskReport {
        &self.report
    }

    /// Swaps in a new report as a whole and drops the selection.
    pub fn replace(&mut self, report: RiskReport) {
        self.report = report;
        self.selected = None;
    }

    pub fn clear(&mut self) {
        self.replace(RiskReport::default());
    }

    /// Selection follows the record, not the row, across re-sorts.
    pub fn sort(&mut self, key: SortKey, order: SortOrder) {
        self.report.sort(key, order);
    }

    pub fn select(&mut self, row: usize) -> Option<&ConjunctionRecord> {
        let record = self.report.records().get(row)?;
        self.selected = Some(record.subject_id);
        Some(record)
    }

    pub fn selected(&self) -> Option<&ConjunctionRecord> {
        let id = self.selected?;
        self.report.records().iter().find(|r| r.subject_id == id)
    }

    pub fn selected_position(&self) -> Option<[f32; 3]> {
        self.selected()
            .map(|r| [r.pos[0] as f32, r.pos[1] as f32, r.pos[2] as f32])
    }

    /// Pauses the clock, propagates the catalog at the current epoch and
    /// replaces the report with a fresh detection pass.
    pub fn run(
        &mut self,
        clock: &mut SimulationClock,
        catalog: &Catalog,
        detector: Detector,
        tolerance: f64,
        iterations: usize,
    ) -> Result<&RiskReport, DetectionError> {
        clock.pause();
        let snapshot = propagate(clock.current_epoch(), catalog);
        let report = detector.detect(&snapshot.states, tolerance, iterations)?;
        info!("{} risky objects at epoch {}", report.len(), clock.current_epoch().0);
        self.replace(report);
        Ok(&self.report)
    }
}
