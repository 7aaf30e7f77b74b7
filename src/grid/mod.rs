//! Raster gridding, delegated to an external tool.

pub mod gdal;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// Inverse-distance-weighting parameters handed to the grid builder.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationParams {
    pub power: f64,
    pub smoothing: f64,
    pub radius1: f64,
    pub radius2: f64,
    pub angle: f64,
    pub max_points: u32,
    pub min_points: u32,
    pub nodata: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            smoothing: 0.0,
            radius1: 0.0,
            radius2: 0.0,
            angle: 0.0,
            max_points: 0,
            min_points: 0,
            nodata: 0.0,
        }
    }
}

impl InterpolationParams {
    /// `gdal_grid -a` algorithm string.
    pub fn algorithm(&self) -> String {
        format!(
            "invdist:power={:?}:smoothing={:?}:radius1={:?}:radius2={:?}:angle={:?}:max_points={}:min_points={}:nodata={:?}",
            self.power,
            self.smoothing,
            self.radius1,
            self.radius2,
            self.angle,
            self.max_points,
            self.min_points,
            self.nodata,
        )
    }
}

/// One raster to build from a point layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub layer: String,
    pub z_field: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// File extension of rasters written in `format`.
pub fn raster_extension(format: &str) -> String {
    match format {
        "GTiff" | "COG" => "tif".to_string(),
        "AAIGrid" => "asc".to_string(),
        "netCDF" => "nc".to_string(),
        "HFA" => "img".to_string(),
        other => other.to_lowercase(),
    }
}

#[async_trait]
pub trait GridBuilder: Send + Sync {
    async fn build(&self, request: &GridRequest) -> Result<()>;
}
