use cost_chains::config::{Config, REQUIRED_VARIABLES};
use cost_chains::db::Database;
use cost_chains::grid::gdal::GdalGrid;
use cost_chains::ident::Ident;
use cost_chains::oracle::pgrouting::PgRouting;
use cost_chains::pipeline::{self, RunContext};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::env().inspect_err(|e| {
        log::error!(
            "config: {e}. Check all required environment variables ({}) are set.",
            REQUIRED_VARIABLES.join(", ")
        );
    })?;

    config.log();

    let cancel = CancellationToken::new();
    let ctx = RunContext::from_config(&config, cancel.clone())?;

    let database = Database::connect(&config.database).await?;
    log::info!("Connected to database ({})", config.database.redacted());

    let oracle = PgRouting::new(
        database.clone(),
        Ident::parse(&config.network_table)?,
        Ident::parse(&config.vertices_table)?,
    );
    let grid = GdalGrid::new(
        config.gdal_grid.clone(),
        config.grid_format.clone(),
        config.interpolation.clone(),
    );

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let outcome = pipeline::run(&ctx, &oracle, &database, &grid).await;
    database.pool.close().await;

    outcome?.log_summary();

    Ok(())
}
