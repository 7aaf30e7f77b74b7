use std::env::VarError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;

use crate::grid::InterpolationParams;

pub const REQUIRED_VARIABLES: &[&str] = &["STAGES", "PG_URL (or PG_HOST and PG_DATABASE)"];

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Url(String),
    Params {
        host: String,
        port: u16,
        user: Option<String>,
        password: Option<String>,
        database: String,
    },
}

impl DatabaseConfig {
    /// Connection target with credentials masked, for logging.
    pub fn redacted(&self) -> String {
        match self {
            DatabaseConfig::Url(url) => match (url.find("://"), url.rfind('@')) {
                (Some(scheme), Some(at)) if at > scheme => {
                    format!("{}://***@{}", &url[..scheme], &url[at + 1..])
                }
                _ => url.clone(),
            },
            DatabaseConfig::Params {
                host,
                port,
                user,
                database,
                ..
            } => format!(
                "{}@{host}:{port}/{database}",
                user.as_deref().unwrap_or("<default>")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub stages: Vec<String>,
    pub cost_field: String,
    pub network_table: String,
    pub vertices_table: String,
    pub output_dir: PathBuf,
    pub srid: i32,
    pub run_id: Option<String>,
    pub gdal_grid: String,
    pub grid_format: String,
    pub interpolation: InterpolationParams,
    pub external_timeout: Duration,
    pub polygon_concurrency: usize,
}

impl Config {
    pub fn env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name))
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let vars = Vars { lookup };

        let database = match vars.optional("PG_URL")? {
            Some(url) => DatabaseConfig::Url(url),
            None => DatabaseConfig::Params {
                host: vars.required("PG_HOST")?,
                port: vars.parsed("PG_PORT", 5432)?,
                user: vars.optional("PG_USER")?,
                password: vars.optional("PG_PASSWORD")?,
                database: vars.required("PG_DATABASE")?,
            },
        };

        let stages = vars
            .required("STAGES")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let defaults = InterpolationParams::default();
        let interpolation = InterpolationParams {
            power: vars.parsed("IDW_POWER", defaults.power)?,
            smoothing: vars.parsed("IDW_SMOOTHING", defaults.smoothing)?,
            radius1: vars.parsed("IDW_RADIUS1", defaults.radius1)?,
            radius2: vars.parsed("IDW_RADIUS2", defaults.radius2)?,
            angle: vars.parsed("IDW_ANGLE", defaults.angle)?,
            max_points: vars.parsed("IDW_MAX_POINTS", defaults.max_points)?,
            min_points: vars.parsed("IDW_MIN_POINTS", defaults.min_points)?,
            nodata: vars.parsed("IDW_NODATA", defaults.nodata)?,
        };

        let srid: i32 = vars.parsed("SRID", 32615)?;
        if srid <= 0 {
            return Err(anyhow!("SRID must be positive, got {srid}"));
        }

        let polygon_concurrency: usize = vars.parsed("POLYGON_CONCURRENCY", 4)?;
        if polygon_concurrency == 0 {
            return Err(anyhow!("POLYGON_CONCURRENCY must be at least 1"));
        }

        Ok(Self {
            database,
            stages,
            cost_field: vars.or("COST_FIELD", "costo")?,
            network_table: vars.or("NETWORK_TABLE", "red")?,
            vertices_table: vars.or("VERTICES_TABLE", "red_vertices_pgr")?,
            output_dir: PathBuf::from(vars.or("OUTPUT_DIR", "idw")?),
            srid,
            run_id: vars.optional("RUN_ID")?,
            gdal_grid: vars.or("GDAL_GRID", "gdal_grid")?,
            grid_format: vars.or("GRID_FORMAT", "GTiff")?,
            interpolation,
            external_timeout: Duration::from_secs(vars.parsed("EXTERNAL_TIMEOUT_SECS", 600)?),
            polygon_concurrency,
        })
    }

    pub fn log(&self) {
        log::info!("database: {}", self.database.redacted());
        log::info!("stages: {}", self.stages.join(" -> "));
        log::info!(
            "network: edges {}, vertices {}, cost field {}",
            self.network_table,
            self.vertices_table,
            self.cost_field
        );
        log::info!("output dir: {}", self.output_dir.display());
        log::info!("srid: {}", self.srid);
        log::info!(
            "grid builder: {} ({}, {})",
            self.gdal_grid,
            self.grid_format,
            self.interpolation.algorithm()
        );
        log::info!("external call timeout: {}s", self.external_timeout.as_secs());
        log::info!("polygon concurrency: {}", self.polygon_concurrency);
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    fn optional(&self, name: &str) -> anyhow::Result<Option<String>> {
        match (self.lookup)(name) {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(anyhow!("{name} value is not valid unicode")),
        }
    }

    fn required(&self, name: &str) -> anyhow::Result<String> {
        self.optional(name)?
            .ok_or_else(|| anyhow!("{name} not set"))
    }

    fn or(&self, name: &str, default: &str) -> anyhow::Result<String> {
        Ok(self.optional(name)?.unwrap_or_else(|| default.to_string()))
    }

    fn parsed<T>(&self, name: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name)? {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e| anyhow!("{name}: cannot parse {value:?}: {e}")),
            None => Ok(default),
        }
    }
}
