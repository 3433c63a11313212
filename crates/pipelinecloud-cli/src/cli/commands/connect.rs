use pipelinecloud_core::{
    ConnectionStrategy, DatabaseConnection, DatabaseDriver, Pipeline, StrategyKind,
    LIST_TABLES_SQL,
};
use tracing::{error, info, warn};

#[cfg(feature = "odbc")]
use pipelinecloud_core::{connect::odbc::OdbcDriver, PipelineError};

use super::{load_pipeline, report_error};
use crate::cli::args::ConnectArgs;
use crate::cli::commands::precheck::gate;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};

pub async fn run(args: ConnectArgs) -> anyhow::Result<i32> {
    if args.skip_precheck {
        warn!("precheck skipped");
    } else if !gate() {
        return Ok(EXIT_CONFIG_ERROR);
    }

    let pipeline = match load_pipeline() {
        Ok(p) => p,
        Err(e) => return Ok(report_error(&e)),
    };

    let strategy = StrategyKind::from(args.strategy).strategy();
    connect_with_backend(&pipeline, strategy.as_ref(), args.list_tables).await
}

#[cfg(feature = "odbc")]
async fn connect_with_backend(
    pipeline: &Pipeline,
    strategy: &dyn ConnectionStrategy,
    list_tables: bool,
) -> anyhow::Result<i32> {
    let driver = match OdbcDriver::new() {
        Ok(d) => d,
        Err(e) => return Ok(report_error(&PipelineError::from(e))),
    };
    run_with_driver(pipeline, strategy, &driver, list_tables).await
}

#[cfg(not(feature = "odbc"))]
async fn connect_with_backend(
    _pipeline: &Pipeline,
    _strategy: &dyn ConnectionStrategy,
    _list_tables: bool,
) -> anyhow::Result<i32> {
    eprintln!("error: no database driver backend compiled in; rebuild with `--features odbc`");
    Ok(crate::exit_codes::EXIT_CONNECT_ERROR)
}

/// Authenticate, connect, optionally list tables, and close.
#[cfg_attr(not(feature = "odbc"), allow(dead_code))]
pub(crate) async fn run_with_driver<D: DatabaseDriver>(
    pipeline: &Pipeline,
    strategy: &dyn ConnectionStrategy,
    driver: &D,
    list_tables: bool,
) -> anyhow::Result<i32> {
    let mut conn = match pipeline.connect(strategy, driver).await {
        Ok(c) => c,
        Err(e) => return Ok(report_error(&e)),
    };

    if list_tables {
        match conn.query_column(LIST_TABLES_SQL) {
            Ok(tables) => {
                println!("Tables in the database:");
                for table in &tables {
                    println!("  {table}");
                }
                info!(count = tables.len(), "listed tables");
            }
            Err(e) => error!(error = %e, "Error listing tables"),
        }
    }

    if let Err(e) = conn.close() {
        warn!(error = %e, "error closing connection");
    }
    Ok(EXIT_SUCCESS)
}
