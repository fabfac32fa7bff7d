use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    attachment::AttachmentService,
    auth::AuthService,
    config::{Config, load_config_from_file, save_config_to_file},
    project::ProjectService,
};
use tokio::sync::RwLock;
use utils::assets::config_path;

/// Single-process wiring of the database and services.
#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    auth: AuthService,
    project: ProjectService,
    attachment: AttachmentService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;

        let (secret, token_ttl_hours, max_attachment_size_bytes) = {
            let config = config.read().await;
            (
                config.token_secret.clone(),
                config.token_ttl_hours,
                config.max_attachment_size_bytes,
            )
        };

        let db = DBService::new().await?;
        let auth = AuthService::new(secret, token_ttl_hours);
        let project = ProjectService::new();
        let attachment = AttachmentService::new(max_attachment_size_bytes)?;

        Ok(Self {
            config,
            db,
            auth,
            project,
            attachment,
        })
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn project(&self) -> &ProjectService {
        &self.project
    }

    fn attachment(&self) -> &AttachmentService {
        &self.attachment
    }
}

impl LocalDeployment {
    async fn load_runtime_config() -> Result<Arc<RwLock<Config>>, DeploymentError> {
        let path = config_path();
        let mut raw_config = load_config_from_file(&path).await;

        // An explicit JWT_SECRET wins over the generated one; useful for
        // multi-instance setups sharing tokens.
        if let Ok(secret) = std::env::var("JWT_SECRET")
            && !secret.trim().is_empty()
        {
            raw_config.token_secret = secret;
        }

        save_config_to_file(&raw_config, &path).await?;
        Ok(Arc::new(RwLock::new(raw_config)))
    }
}
