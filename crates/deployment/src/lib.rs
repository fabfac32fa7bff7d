use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    attachment::{AttachmentError, AttachmentService},
    auth::AuthService,
    config::{Config, ConfigError},
    project::ProjectService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Service locator handed to every request handler. The server crate is
/// generic over this so route tests can run against a local wiring.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>
    where
        Self: Sized;

    fn config(&self) -> &Arc<RwLock<Config>>;
    fn db(&self) -> &DBService;
    fn auth(&self) -> &AuthService;
    fn project(&self) -> &ProjectService;
    fn attachment(&self) -> &AttachmentService;
}
