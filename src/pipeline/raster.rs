use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::grid::{GridBuilder, GridRequest};
use crate::model::{CostRecord, CostSurfaceInput};
use crate::report::RasterReport;

use super::RunContext;

/// Value field of every exported point layer.
pub const Z_FIELD: &str = "costo";

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    crs: Crs,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct Crs {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: CrsProperties,
}

#[derive(Serialize)]
struct CrsProperties {
    name: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: FeatureProperties,
    geometry: Point,
}

#[derive(Serialize)]
struct FeatureProperties {
    id: i64,
    costo: f64,
}

#[derive(Serialize)]
struct Point {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

/// `{id, geometry, costo}` point layer for one cumulative cost column.
fn point_layer<'a>(
    column: &'a str,
    index: usize,
    records: &[CostRecord],
    srid: i32,
) -> FeatureCollection<'a> {
    FeatureCollection {
        kind: "FeatureCollection",
        name: column,
        crs: Crs {
            kind: "name",
            properties: CrsProperties {
                name: format!("urn:ogc:def:crs:EPSG::{srid}"),
            },
        },
        features: records
            .iter()
            .map(|record| Feature {
                kind: "Feature",
                properties: FeatureProperties {
                    id: record.id,
                    costo: record.cumulative[index],
                },
                geometry: Point {
                    kind: "Point",
                    coordinates: [record.x, record.y],
                },
            })
            .collect(),
    }
}

/// Exports one raster per cost column. A failing column is reported and the
/// next one still runs; only cancellation stops the loop.
pub async fn export_rasters(
    ctx: &RunContext,
    grid: &dyn GridBuilder,
    input: &CostSurfaceInput,
) -> Result<Vec<RasterReport>> {
    if input.records.is_empty() {
        log::info!(
            "no connected chains, skipping {} raster(s)",
            input.columns.len()
        );
        return Ok(input.columns.iter().map(|c| RasterReport::skipped(c)).collect());
    }

    let mut reports = Vec::with_capacity(input.columns.len());

    for (index, column) in input.columns.iter().enumerate() {
        match export_raster(ctx, grid, column, index, &input.records).await {
            Ok(path) => {
                log::info!("{column}: raster written to {}", path.display());
                reports.push(RasterReport::written(column, path));
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                log::warn!("{column}: raster export failed: {e}");
                reports.push(RasterReport::failed(column, &e));
            }
        }
    }

    Ok(reports)
}

/// `index` addresses `columns`; every record carries one value per column.
async fn export_raster(
    ctx: &RunContext,
    grid: &dyn GridBuilder,
    column: &str,
    index: usize,
    records: &[CostRecord],
) -> Result<PathBuf> {
    let vector = ctx.output_dir.join(format!("{column}.geojson"));
    let raster = ctx
        .output_dir
        .join(format!("{column}.{}", ctx.raster_extension));

    let layer = serde_json::to_vec(&point_layer(column, index, records, ctx.srid))?;
    ctx.guard("write point layer", write(&vector, layer)).await?;

    let request = GridRequest {
        layer: column.to_string(),
        z_field: Z_FIELD.to_string(),
        input: vector,
        output: raster.clone(),
    };
    ctx.guard(&format!("grid builder for {column}"), grid.build(&request))
        .await?;

    Ok(raster)
}

async fn write(path: &Path, contents: Vec<u8>) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(Error::io(path))
}
