use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::grid::raster_extension;
use crate::ident::{Ident, RunId, Stages, TableNames};

/// Everything one pipeline run needs besides its collaborators. Derived
/// artifacts are named through `tables` and written below `output_dir`, both
/// scoped to the run id.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub stages: Stages,
    pub tables: TableNames,
    pub cost_field: Ident,
    pub output_dir: PathBuf,
    pub raster_extension: String,
    pub srid: i32,
    pub timeout: Duration,
    pub polygon_concurrency: usize,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let run = match &config.run_id {
            Some(id) => RunId::parse(id)?,
            None => RunId::generate(),
        };

        let stages = Stages::new(&config.stages)?;
        let output_dir = config.output_dir.join(run.as_str());
        let tables = TableNames::new(run);
        tables.check(&stages)?;

        Ok(Self {
            stages,
            cost_field: Ident::parse(&config.cost_field)?,
            output_dir,
            tables,
            raster_extension: raster_extension(&config.grid_format),
            srid: config.srid,
            timeout: config.external_timeout,
            polygon_concurrency: config.polygon_concurrency.max(1),
            cancel,
        })
    }

    pub fn run_id(&self) -> &RunId {
        self.tables.run()
    }

    /// Awaits an external call, giving up when the run is cancelled or the
    /// call outlives the configured timeout.
    pub async fn guard<T, E, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Error::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn from_config_scopes_outputs_by_run() {
        let config = Config::from_lookup(|name| match name {
            "PG_URL" => Ok("postgres://localhost/cadenas".to_string()),
            "STAGES" => Ok("etapa1,etapa2".to_string()),
            "RUN_ID" => Ok("r42".to_string()),
            "OUTPUT_DIR" => Ok("out".to_string()),
            _ => Err(std::env::VarError::NotPresent),
        })
        .unwrap();

        let ctx = RunContext::from_config(&config, CancellationToken::new()).unwrap();

        assert_eq!(ctx.run_id().as_str(), "r42");
        assert_eq!(ctx.output_dir, PathBuf::from("out").join("r42"));
        assert_eq!(ctx.raster_extension, "tif");
        assert_eq!(
            ctx.tables.cost_table(ctx.stages.first()).unwrap().as_str(),
            "dist_etapa1_r42"
        );
    }

    #[test]
    fn from_config_rejects_unsafe_names() {
        let config = Config::from_lookup(|name| match name {
            "PG_URL" => Ok("postgres://localhost/cadenas".to_string()),
            "STAGES" => Ok("etapa1,etapa2\"; drop table red; --".to_string()),
            _ => Err(std::env::VarError::NotPresent),
        })
        .unwrap();

        let err = RunContext::from_config(&config, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn from_config_rejects_overlong_and_clashing_names() {
        let long = format!("{},{}", "a".repeat(30), "b".repeat(30));
        let config = |stages: String| {
            Config::from_lookup(move |name| match name {
                "PG_URL" => Ok("postgres://localhost/cadenas".to_string()),
                "STAGES" => Ok(stages.clone()),
                _ => Err(std::env::VarError::NotPresent),
            })
            .unwrap()
        };

        let err = RunContext::from_config(&config(long), CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err = RunContext::from_config(&config("a,b_c,a_b,c".to_string()), CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Stages(_)));
    }

    #[tokio::test]
    async fn guard_times_out() {
        let mut ctx = testing::context(&["a", "b"], std::env::temp_dir());
        ctx.timeout = Duration::from_millis(20);

        let err = ctx
            .guard("slow call", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { ref operation, .. } if operation == "slow call"));
    }

    #[tokio::test]
    async fn guard_observes_cancellation() {
        let ctx = testing::context(&["a", "b"], std::env::temp_dir());
        let cancel = ctx.cancel.clone();

        let call = ctx.guard("pending call", std::future::pending::<Result<()>>());
        cancel.cancel();

        assert!(call.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn guard_passes_results_through() {
        let ctx = testing::context(&["a", "b"], std::env::temp_dir());
        let value = ctx.guard("fast call", async { Ok::<_, Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
