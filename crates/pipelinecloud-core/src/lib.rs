//! Certificate-authenticated access to Azure SQL.
//!
//! - [`precheck`]: readiness gate over configuration and the PEM bundle.
//! - [`auth`]: client-credential token acquisition with a signed assertion.
//! - [`token_attr`]: packing a token for pre-connection attribute 1256.
//! - [`connect`]: the two connection strategies and the driver seam.
//! - [`pipeline`]: token then connection, in one call.

pub mod auth;
pub mod cert;
pub mod config;
pub mod connect;
pub mod error;
pub mod pipeline;
pub mod precheck;
pub mod token_attr;

// Convenience re-exports
pub use auth::{AccessTokenResult, ClientCertificateAuthenticator};
pub use config::{ConfigKey, ConfigSource, EnvSource, MapSource, Settings};
pub use connect::{
    connect, AttributeStrategy, ConnectionRequest, ConnectionStrategy, DatabaseConnection,
    DatabaseDriver, DatabaseTarget, DriverConnectString, EmbeddedStrategy, PreConnectAttributes,
    StrategyKind, LIST_TABLES_SQL,
};
pub use error::{
    AuthError, CertificateError, ConfigError, ConnectError, EncodeError, PipelineError,
    PipelineResult, TokenDecodeError,
};
pub use pipeline::Pipeline;
pub use precheck::{precheck_report, run_precheck, CheckOutcome, PrecheckReport};
pub use token_attr::{encode_token_attribute, SQL_COPT_SS_ACCESS_TOKEN};
