//! CLI Common Utilities
//!
//! Shared initialization for CLI commands: configuration, credential and
//! the collaborators built from them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Credential;
use crate::config::{Config, ConfigLoader};
use crate::generation::{GenerationOrchestrator, GenerationSettings};
use crate::inference::build_provider;
use crate::service::StudioService;
use crate::storage::{DefaultFetcher, SharedFetcher, SharedStore, StorageFallbackWriter, build_store};
use crate::upload::UploadCoordinator;
use crate::types::Result;

/// Command execution context
///
/// Created once per invocation; each accessor builds a fresh collaborator
/// from the loaded configuration.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// `None` when no token is configured; commands fail with an auth error
    pub credential: Option<Credential>,
}

impl CommandContext {
    /// Load the layered configuration, or a single file when `config_path` is set
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let credential = config.auth.credential();
        Self { config, credential }
    }

    pub fn store(&self) -> Result<SharedStore> {
        build_store(&self.config.storage, self.config.inference.client_timeout_secs)
    }

    pub fn fetcher(&self) -> Result<SharedFetcher> {
        Ok(Arc::new(DefaultFetcher::new(
            self.config.inference.client_timeout_secs,
        )?))
    }

    /// Coordinator whose writer carries the upload retry policy
    pub fn upload_coordinator(&self) -> Result<UploadCoordinator> {
        let upload = &self.config.upload;
        let writer = StorageFallbackWriter::new(
            self.store()?,
            self.config.retry.policy(upload.max_attempts, upload.timeout_ms),
            self.delete_timeout(),
        );
        Ok(UploadCoordinator::new(writer))
    }

    /// Studio service with the fast-fail storage writer
    pub fn studio_service(&self) -> Result<StudioService> {
        let storage = &self.config.storage;
        let writer = StorageFallbackWriter::new(
            self.store()?,
            self.config
                .retry
                .policy(storage.write_attempts, storage.write_timeout_ms),
            self.delete_timeout(),
        );
        let orchestrator = GenerationOrchestrator::new(
            build_provider(&self.config.inference)?,
            self.fetcher()?,
            writer,
            GenerationSettings::from_config(&self.config),
        );
        Ok(StudioService::new(
            orchestrator,
            self.config.generation.clone(),
        ))
    }

    fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.config.storage.delete_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    #[test]
    fn test_default_context_has_no_credential() {
        let ctx = CommandContext::from_config(Config::default());
        assert!(ctx.credential.is_none());
        assert_eq!(ctx.store().unwrap().name(), "unconfigured");
    }

    #[tokio::test]
    async fn test_builds_collaborators_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.token = Some("secret".to_string());
        config.storage.backend = StorageBackend::Local;
        config.storage.local_dir = dir.path().join("objects");

        let ctx = CommandContext::from_config(config);
        assert!(ctx.credential.is_some());
        assert_eq!(ctx.store().unwrap().name(), "local");
        assert!(ctx.upload_coordinator().unwrap().is_ready_to_submit());
        assert!(ctx.studio_service().is_ok());
    }
}
