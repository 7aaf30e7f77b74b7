use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};

use crate::error::{Error, Result};
use crate::ident::Ident;
use crate::model::{CostTable, NodeId, NodeRelation, PolygonVertex, ServicePolygon};
use crate::oracle::NetworkOracle;
use crate::report::{NodeFailure, PolygonReport};
use crate::store::ArtifactStore;

use super::RunContext;

/// A polygon needs at least this many tributary points.
pub const MIN_POLYGON_POINTS: usize = 3;

enum NodeOutcome {
    Built,
    Skipped,
    Failed(Error),
}

/// Groups the source stage's points by the destination node their hop ends
/// at. Points with non-finite coordinates are left out.
pub fn tributaries(source: &NodeRelation, costs: &CostTable) -> BTreeMap<NodeId, Vec<PolygonVertex>> {
    let mut groups: BTreeMap<NodeId, Vec<PolygonVertex>> =
        costs.end_nodes().into_iter().map(|node| (node, Vec::new())).collect();

    for point in &source.points {
        if !(point.x.is_finite() && point.y.is_finite()) {
            continue;
        }
        if let Some(hop) = costs.hop(point.node) {
            groups.entry(hop.end).or_default().push(PolygonVertex {
                id: point.id,
                x: point.x,
                y: point.y,
            });
        }
    }

    groups
}

/// Builds one service polygon per destination node of a stage transition
/// into `poligono_<source>_<run>`. Creating the table is fatal on failure;
/// a single node's failure is recorded and the others proceed.
pub async fn build_service_areas(
    ctx: &RunContext,
    oracle: &dyn NetworkOracle,
    store: &dyn ArtifactStore,
    source: &NodeRelation,
    costs: &CostTable,
) -> Result<PolygonReport> {
    let table = ctx.tables.polygons(&costs.source)?;
    let key = costs.target.id_column()?;

    ctx.guard(
        "create polygon table",
        store.reset_polygon_table(&table, &key, ctx.srid),
    )
    .await?;

    let (table_ref, key_ref) = (&table, &key);
    let outcomes: Vec<(NodeId, NodeOutcome)> = stream::iter(tributaries(source, costs))
        .map(move |(node, vertices)| async move {
            let outcome = build_node(ctx, oracle, store, table_ref, key_ref, node, &vertices).await;
            (node, outcome)
        })
        .buffer_unordered(ctx.polygon_concurrency)
        .collect()
        .await;

    let mut report = PolygonReport {
        table: table.as_str().to_string(),
        ..PolygonReport::default()
    };
    for (node, outcome) in outcomes {
        match outcome {
            NodeOutcome::Built => report.built += 1,
            NodeOutcome::Skipped => report.skipped += 1,
            NodeOutcome::Failed(e) if e.is_cancelled() => return Err(e),
            NodeOutcome::Failed(e) => {
                log::warn!("{}: polygon for node {node} failed: {e}", costs.source);
                report.failed.push(NodeFailure {
                    node,
                    error: e.to_string(),
                });
            }
        }
    }
    report.failed.sort_by_key(|f| f.node);

    log::info!(
        "{} -> {}: {} polygon(s) in {}, {} skipped, {} failed",
        costs.source,
        costs.target,
        report.built,
        report.table,
        report.skipped,
        report.failed.len()
    );

    Ok(report)
}

async fn build_node(
    ctx: &RunContext,
    oracle: &dyn NetworkOracle,
    store: &dyn ArtifactStore,
    table: &Ident,
    key: &Ident,
    node: NodeId,
    vertices: &[PolygonVertex],
) -> NodeOutcome {
    if vertices.len() < MIN_POLYGON_POINTS {
        log::debug!("node {node}: {} tributary point(s), skipped", vertices.len());
        return NodeOutcome::Skipped;
    }

    let wkt = match ctx
        .guard("polygon construction", oracle.points_as_polygon(vertices, ctx.srid))
        .await
    {
        Ok(Some(wkt)) => wkt,
        Ok(None) => {
            log::debug!("node {node}: no polygon returned");
            return NodeOutcome::Skipped;
        }
        Err(e) => return NodeOutcome::Failed(e),
    };

    let polygon = ServicePolygon {
        node,
        wkt,
        srid: ctx.srid,
    };
    match ctx
        .guard("persist polygon", store.insert_polygon(table, key, &polygon))
        .await
    {
        Ok(()) => NodeOutcome::Built,
        Err(e) => NodeOutcome::Failed(e),
    }
}
