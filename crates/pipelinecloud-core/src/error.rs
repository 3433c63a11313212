//! Error types for the authentication and connection pipeline.
//!
//! Each component owns a narrow error enum; [`PipelineError`] wraps them for
//! callers that drive the whole flow and need a single exit code.

use std::path::PathBuf;

/// One or more required configuration values are missing or empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required configuration: {}", missing.join(", "))]
pub struct ConfigError {
    /// Environment names of every missing key, in check order.
    pub missing: Vec<String>,
}

/// Certificate bundle could not be used as a signing credential.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// No certificate path was configured.
    #[error("certificate path is not configured")]
    PathNotConfigured,

    /// The configured path does not exist.
    #[error("PEM file not found at path: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read PEM file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file parsed to zero PEM blocks.
    #[error("PEM file is empty or invalid: {}", path.display())]
    Empty { path: PathBuf },

    /// A block was found but its body is not valid.
    #[error("malformed PEM block '{label}': {reason}")]
    Malformed { label: String, reason: String },

    /// The first block is not a private key.
    #[error("PEM file does not contain a valid private key: {}", path.display())]
    MissingPrivateKey { path: PathBuf },

    /// The configured thumbprint is not a hex SHA-1 digest.
    #[error("invalid certificate thumbprint: {reason}")]
    InvalidThumbprint { reason: String },
}

/// The identity provider did not issue a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Provider answered with an error instead of a token.
    #[error("failed to acquire token: {error}: {description}")]
    Rejected { error: String, description: String },

    /// Transport failure talking to the token endpoint.
    #[error("network error: {message}")]
    Network { message: String },

    /// Response could not be understood.
    #[error("invalid response from token endpoint: {message}")]
    InvalidResponse { message: String },

    /// The client assertion could not be signed.
    #[error("failed to sign client assertion: {message}")]
    Signing { message: String },

    /// Authority URL could not be built from the configured host and tenant.
    #[error("invalid authority '{authority}': {message}")]
    InvalidAuthority { authority: String, message: String },

    /// Signing credential could not be loaded.
    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Claim inspection failed. Diagnostic only; never blocks a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode token claims: {reason}")]
pub struct TokenDecodeError {
    pub reason: String,
}

/// Token cannot be represented in the driver attribute layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Interleaved buffer length does not fit the 32-bit prefix.
    #[error("access token too long for attribute buffer: {len} bytes")]
    TooLong { len: usize },
}

/// The driver refused the connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Native driver error text.
    #[error("error connecting to SQL Server: {message}")]
    Driver { message: String },

    /// A statement failed on an open connection.
    #[error("error executing query: {message}")]
    Query { message: String },

    /// Token could not be packed for the driver.
    #[error(transparent)]
    Encoding(#[from] EncodeError),

    /// Connection string could not be decoded for the driver.
    #[error("invalid connection string encoding: {message}")]
    InvalidConnectionString { message: String },

    /// A pre-connection attribute could not be applied.
    #[error("error setting pre-connection attribute {key}: {message}")]
    Attribute { key: i32, message: String },
}

/// Any failure of the authenticate-and-connect flow.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl PipelineError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Certificate(_) => 1,
            Self::Auth(AuthError::Certificate(_)) => 1,
            Self::Auth(_) => 2,
            Self::Connect(ConnectError::Encoding(_)) | Self::Encode(_) => 4,
            Self::Connect(_) => 3,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
