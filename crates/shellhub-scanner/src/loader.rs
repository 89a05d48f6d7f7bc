//! Content loading through resource drivers.

use crate::driver::DriverFactory;
use crate::orchestrator::OrchestratorHandle;
use crate::registry::{Task, TaskKind, TaskRegistry};
use crate::ScanError;
use async_trait::async_trait;
use shellhub_core::{Document, Environment};
use shellhub_index::{ContentCache, ContentLoader, DocumentIndex, IndexError};
use std::sync::Arc;
use tracing::debug;

/// Loads document content on a cache miss by asking the source's driver.
///
/// Each load is registered as a `Load` task of the orchestrator's owner, so
/// a deferred reset waits for it to finish.
pub struct DriverContentLoader {
    index: DocumentIndex,
    cache: Arc<ContentCache>,
    registry: Arc<TaskRegistry>,
    drivers: Arc<dyn DriverFactory>,
    orchestrator: OrchestratorHandle,
}

impl DriverContentLoader {
    pub fn new(
        index: DocumentIndex,
        cache: Arc<ContentCache>,
        registry: Arc<TaskRegistry>,
        drivers: Arc<dyn DriverFactory>,
        orchestrator: OrchestratorHandle,
    ) -> Self {
        Self {
            index,
            cache,
            registry,
            drivers,
            orchestrator,
        }
    }

    async fn read(&self, document: &Document) -> Result<Environment, IndexError> {
        let key = document.key().to_string();
        let source = self
            .index
            .get_endpoint(&document.source)
            .await?
            .ok_or_else(|| IndexError::Load {
                key: key.clone(),
                message: format!("unknown source {}", document.source),
            })?;

        let drivers = Arc::clone(&self.drivers);
        let document = document.without_content();
        let result = tokio::task::spawn_blocking(move || -> Result<Environment, ScanError> {
            let mut driver = drivers.create(&source)?;
            driver.open()?;
            let content = driver.read_environment(&document);
            driver.close();
            content
        })
        .await?;

        result.map_err(|e| IndexError::Load {
            key,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ContentLoader for DriverContentLoader {
    async fn load(&self, document: &Document) -> Result<Arc<Environment>, IndexError> {
        if let Some(content) = &document.content {
            return Ok(Arc::clone(content));
        }

        let task_id = self.registry.create();
        self.registry.set(
            task_id,
            Task {
                owner: self.orchestrator.owner(),
                name: document.source.clone(),
                kind: TaskKind::Load,
            },
        );
        debug!(document = %document.key(), task = %task_id, "Loading content");

        let result = self
            .cache
            .get_or_load(&document.key(), || self.read(document))
            .await;

        self.registry.delete(task_id);
        self.orchestrator.notify_drained();
        result
    }
}
