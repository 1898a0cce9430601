use std::sync::Arc;

use anyhow::Context;
use debris_engine::catalog::Catalog;
use debris_engine::config::{ConfigError, EngineConfig};
use debris_engine::detect::{detect_in_background, Detector};
use debris_engine::epoch::{from_calendar, to_calendar, Datetime, Epoch};
use debris_engine::propagation::propagate;
use debris_engine::report::{SortKey, SortOrder};
use debris_engine::{ConjunctionRecord, TrackedObject};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static CONFIG: Lazy<Result<EngineConfig, ConfigError>> = Lazy::new(EngineConfig::from_env);

fn config() -> Result<&'static EngineConfig, ConfigError> {
    CONFIG.as_ref().map_err(Clone::clone)
}

/// Calendar label for a detection run. Epochs with no calendar date still
/// detect and fall back to the raw day count.
fn epoch_label(epoch: Epoch) -> String {
    match to_calendar(epoch) {
        Ok(datetime) => datetime.to_string(),
        Err(err) => {
            warn!("no calendar label for epoch {}: {}", epoch.days(), err);
            format!("epoch {}", epoch.days())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineRequest {
    Propagate {
        epoch: Epoch,
        catalog: Catalog,
    },
    Detect {
        epoch: Epoch,
        catalog: Catalog,
        tolerance: Option<f64>,
        iterations: Option<usize>,
        detector: Option<Detector>,
        sort: Option<SortSpec>,
    },
    ToCalendar {
        epoch: Epoch,
    },
    FromCalendar {
        datetime: Datetime,
    },
}

#[derive(Debug, Deserialize)]
struct SortSpec {
    key: SortKey,
    order: SortOrder,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineResponse {
    Propagate {
        positions: Vec<[f32; 3]>,
        states: Vec<TrackedObject>,
        skipped: Vec<SkippedResult>,
    },
    Detect {
        at: String,
        records: Vec<ConjunctionRecord>,
    },
    Calendar {
        datetime: Datetime,
        display: String,
    },
    Epoch {
        epoch: Epoch,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize)]
struct SkippedResult {
    id: u32,
    reason: String,
}

async fn respond(req: EngineRequest) -> anyhow::Result<EngineResponse> {
    match req {
        EngineRequest::Propagate { epoch, catalog } => {
            let out = propagate(epoch, &catalog);
            let skipped = out
                .skipped
                .into_iter()
                .map(|(id, err)| SkippedResult {
                    id,
                    reason: err.to_string(),
                })
                .collect();
            Ok(EngineResponse::Propagate {
                positions: out.positions,
                states: out.states,
                skipped,
            })
        }
        EngineRequest::Detect {
            epoch,
            catalog,
            tolerance,
            iterations,
            detector,
            sort,
        } => {
            let config = config()?;
            let at = epoch_label(epoch);
            let snapshot: Arc<[TrackedObject]> = propagate(epoch, &catalog).states.into();
            let detector = detector.unwrap_or(config.detector);
            let mut report = detect_in_background(
                detector,
                snapshot,
                tolerance.unwrap_or(config.tolerance),
                iterations.unwrap_or(config.iterations),
                config.octree_limits(),
            )
            .await
            .context("detection task failed")?
            .with_context(|| format!("{:?} detection failed", detector))?;
            if let Some(spec) = sort {
                report.sort(spec.key, spec.order);
            }
            info!("{} risky objects at {}", report.len(), at);
            Ok(EngineResponse::Detect {
                at,
                records: report.into_records(),
            })
        }
        EngineRequest::ToCalendar { epoch } => {
            let datetime = to_calendar(epoch)?;
            Ok(EngineResponse::Calendar {
                datetime,
                display: datetime.to_string(),
            })
        }
        EngineRequest::FromCalendar { datetime } => Ok(EngineResponse::Epoch {
            epoch: from_calendar(datetime)?,
        }),
    }
}

async fn handler(event: LambdaEvent<EngineRequest>) -> Result<EngineResponse, Error> {
    match respond(event.payload).await {
        Ok(response) => Ok(response),
        Err(err) => Ok(EngineResponse::Error {
            message: format!("{:#}", err),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    info!("engine configuration: {:?}", config()?);
    let func = service_fn(handler);
    lambda_runtime::run(func).await
}
