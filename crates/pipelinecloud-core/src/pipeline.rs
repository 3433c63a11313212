//! Authenticate-then-connect flow.

use tracing::{info, instrument};

use crate::auth::{AccessTokenResult, ClientCertificateAuthenticator};
use crate::config::Settings;
use crate::connect::{connect, ConnectionStrategy, DatabaseDriver, DatabaseTarget};
use crate::error::PipelineResult;

/// One configured tenant, application and database.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    authenticator: ClientCertificateAuthenticator,
}

impl Pipeline {
    /// Load the signing credential and prepare the token client.
    pub fn new(settings: Settings) -> PipelineResult<Self> {
        let authenticator = ClientCertificateAuthenticator::new(&settings)?;
        Ok(Self {
            settings,
            authenticator,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn target(&self) -> DatabaseTarget {
        DatabaseTarget::from(&self.settings)
    }

    /// Request a fresh token. Nothing is cached between calls.
    #[instrument(skip(self), fields(authority = %self.authenticator.authority()))]
    pub async fn acquire_token(&self) -> PipelineResult<AccessTokenResult> {
        let token = self.authenticator.authenticate().await?;
        info!(
            expires_at = %token.expires_at.to_rfc3339(),
            "Access token acquired"
        );
        Ok(token)
    }

    /// Acquire a token and open one connection with it.
    ///
    /// The driver is never called when token acquisition fails.
    pub async fn connect<'d, D: DatabaseDriver>(
        &self,
        strategy: &dyn ConnectionStrategy,
        driver: &'d D,
    ) -> PipelineResult<D::Connection<'d>> {
        let token = self.acquire_token().await?;
        let conn = connect(driver, strategy, &self.target(), token.token())?;
        Ok(conn)
    }
}
