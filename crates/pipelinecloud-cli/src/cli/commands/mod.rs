use pipelinecloud_core::{Pipeline, PipelineError, PipelineResult, Settings};

use super::args::*;

pub mod connect;
pub mod full_check;
pub mod precheck;
pub mod token;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Precheck(args) => precheck::run(args),
        Command::Token(args) => token::run(args).await,
        Command::Connect(args) => connect::run(args).await,
        Command::FullCheck => full_check::run().await,
    }
}

/// Settings from the environment, then the pipeline.
pub(crate) fn load_pipeline() -> PipelineResult<Pipeline> {
    Pipeline::new(Settings::from_env()?)
}

/// Print a flow error and map it to its exit code.
pub(crate) fn report_error(err: &PipelineError) -> i32 {
    eprintln!("error: {err}");
    err.exit_code()
}
