use tracing::info;

use crate::cli::args::{ConnectArgs, StrategyArg};

/// Precheck, then connect with the attribute strategy and list tables.
pub async fn run() -> anyhow::Result<i32> {
    info!("Running full check");
    super::connect::run(ConnectArgs {
        strategy: StrategyArg::Attribute,
        skip_precheck: false,
        list_tables: true,
    })
    .await
}
