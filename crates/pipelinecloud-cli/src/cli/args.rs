use clap::{Args, Parser, Subcommand, ValueEnum};
use pipelinecloud_core::StrategyKind;

#[derive(Parser, Debug)]
#[command(
    name = "pipelinecloud",
    version,
    about = "Certificate-authenticated Azure SQL connectivity checks"
)]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify configuration and the certificate bundle without any network call
    Precheck(PrecheckArgs),
    /// Acquire an access token and print its metadata (never the token)
    Token(TokenArgs),
    /// Acquire a token and open one database connection
    Connect(ConnectArgs),
    /// Precheck, then connect with the attribute strategy and list tables
    FullCheck,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrategyArg {
    /// Token in pre-connection attribute 1256
    #[default]
    Attribute,
    /// Token inside the URL-encoded connection string
    Embedded,
}

impl From<StrategyArg> for StrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Attribute => StrategyKind::Attribute,
            StrategyArg::Embedded => StrategyKind::Embedded,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PrecheckArgs {
    #[arg(long, value_enum, default_value_t, env = "PIPELINECLOUD_FORMAT")]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// Also print the decoded (unverified) claims
    #[arg(long)]
    pub claims: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    #[arg(long, value_enum, default_value_t, env = "PIPELINECLOUD_STRATEGY")]
    pub strategy: StrategyArg,

    /// Skip the readiness gate
    #[arg(long)]
    pub skip_precheck: bool,

    /// List base tables after connecting
    #[arg(long)]
    pub list_tables: bool,
}
