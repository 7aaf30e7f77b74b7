//! Summary of one pipeline run, logged at the end and written next to the
//! rasters as `report.json`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::NodeId;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub stages: Vec<StageReport>,
    pub transitions: Vec<TransitionReport>,
    pub chains: usize,
    pub records: usize,
    pub rasters: Vec<RasterReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub table: String,
    pub points: usize,
    pub nodes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    pub source: String,
    pub target: String,
    pub table: String,
    pub cost_rows: usize,
    pub polygons: PolygonReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RasterReport {
    pub column: String,
    pub outcome: RasterOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RasterOutcome {
    Written { path: PathBuf },
    Failed { error: String },
    /// No stage-1 point has a connected chain.
    Skipped,
}

impl RasterReport {
    pub fn written(column: &str, path: PathBuf) -> Self {
        Self {
            column: column.to_string(),
            outcome: RasterOutcome::Written { path },
        }
    }

    pub fn skipped(column: &str) -> Self {
        Self {
            column: column.to_string(),
            outcome: RasterOutcome::Skipped,
        }
    }

    pub fn failed(column: &str, error: &Error) -> Self {
        Self {
            column: column.to_string(),
            outcome: RasterOutcome::Failed {
                error: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PolygonReport {
    pub table: String,
    pub built: usize,
    /// Candidates under three tributary points, or for which the engine
    /// returned no geometry.
    pub skipped: usize,
    pub failed: Vec<NodeFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeFailure {
    pub node: NodeId,
    pub error: String,
}

impl RunReport {
    pub fn log_summary(&self) {
        log::info!("run {} finished", self.run_id);
        log::info!("{} chain(s), {} stage-1 record(s)", self.chains, self.records);

        for t in &self.transitions {
            log::info!(
                "{} -> {}: {} cost row(s); polygons built {}, skipped {}, failed {}",
                t.source,
                t.target,
                t.cost_rows,
                t.polygons.built,
                t.polygons.skipped,
                t.polygons.failed.len()
            );
        }

        let count = |pred: fn(&RasterOutcome) -> bool| {
            self.rasters.iter().filter(|r| pred(&r.outcome)).count()
        };
        log::info!(
            "rasters: {} written, {} failed, {} skipped",
            count(|o| matches!(o, RasterOutcome::Written { .. })),
            count(|o| matches!(o, RasterOutcome::Failed { .. })),
            count(|o| matches!(o, RasterOutcome::Skipped))
        );
    }

    pub async fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("report.json");
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(Error::io(&path))?;

        Ok(path)
    }
}
