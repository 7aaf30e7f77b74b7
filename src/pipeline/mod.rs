//! The accumulated multi-stage cost pipeline:
//! snap -> pairwise costs -> chain composition -> {rasters, service areas}.

pub mod chain;
pub mod context;
pub mod pairwise;
pub mod raster;
pub mod service_area;
pub mod snap;

pub use context::RunContext;

use crate::error::{Error, Result};
use crate::grid::GridBuilder;
use crate::oracle::NetworkOracle;
use crate::report::{RunReport, StageReport, TransitionReport};
use crate::store::ArtifactStore;

/// Runs every step in order. Derived names are checked before anything is
/// written. Snapping, pairwise costs and chain composition abort the run on
/// error; raster and polygon failures are recorded in the report.
pub async fn run(
    ctx: &RunContext,
    oracle: &dyn NetworkOracle,
    store: &dyn ArtifactStore,
    grid: &dyn GridBuilder,
) -> Result<RunReport> {
    log::info!(
        "run {}: {} stage(s), output in {}",
        ctx.run_id(),
        ctx.stages.len(),
        ctx.output_dir.display()
    );
    ctx.tables.check(&ctx.stages)?;

    tokio::fs::create_dir_all(&ctx.output_dir)
        .await
        .map_err(Error::io(&ctx.output_dir))?;

    let mut relations = Vec::with_capacity(ctx.stages.len());
    for stage in ctx.stages.iter() {
        relations.push(snap::snap(ctx, oracle, store, stage).await?);
    }

    let mut tables = Vec::with_capacity(relations.len() - 1);
    for pair in relations.windows(2) {
        tables.push(pairwise::pairwise_cost(ctx, oracle, store, &pair[0], &pair[1]).await?);
    }

    let chain = chain::cumulative(&chain::compose(&tables)?);
    let surfaces = chain::attach_points(&chain, &relations[0]);
    log::info!(
        "{} connected chain(s) cover {} of {} point(s) of {}",
        chain.rows.len(),
        surfaces.records.len(),
        relations[0].points.len(),
        ctx.stages.first()
    );

    let rasters = raster::export_rasters(ctx, grid, &surfaces).await?;

    let mut transitions = Vec::with_capacity(tables.len());
    for (source, costs) in relations.iter().zip(&tables) {
        let polygons = service_area::build_service_areas(ctx, oracle, store, source, costs).await?;
        transitions.push(TransitionReport {
            source: costs.source.to_string(),
            target: costs.target.to_string(),
            table: ctx.tables.cost_table(&costs.source)?.as_str().to_string(),
            cost_rows: costs.len(),
            polygons,
        });
    }

    let stages = relations
        .iter()
        .map(|relation| {
            Ok(StageReport {
                stage: relation.stage.to_string(),
                table: ctx.tables.node_relation(&relation.stage)?.as_str().to_string(),
                points: relation.points.len(),
                nodes: relation.distinct_nodes().len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let report = RunReport {
        run_id: ctx.run_id().to_string(),
        stages,
        transitions,
        chains: chain.rows.len(),
        records: surfaces.records.len(),
        rasters,
    };

    match report.write(&ctx.output_dir).await {
        Ok(path) => log::info!("report written to {}", path.display()),
        Err(e) => log::warn!("could not write run report: {e}"),
    }

    Ok(report)
}
