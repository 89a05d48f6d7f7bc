//! Asynchronous document index.
//!
//! Storage calls run on the blocking pool so a slow query never stalls the
//! control plane; no lock is held across an `.await`.

use crate::filter::Filter;
use crate::store::Store;
use crate::IndexError;
use shellhub_core::{Cursor, Document, Page, PagingConfig, Source};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Durable, keyset-paginated index of document metadata.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct DocumentIndex {
    store: Arc<Store>,
    paging: PagingConfig,
    defaults: Arc<Vec<Source>>,
}

impl DocumentIndex {
    /// Open the index stored at `path`.
    ///
    /// `defaults` is the source set seeded into an empty index and restored
    /// by [`DocumentIndex::reset`].
    pub fn open(
        path: &Path,
        paging: PagingConfig,
        defaults: Vec<Source>,
    ) -> Result<Self, IndexError> {
        Ok(Self::with_store(Store::open(path)?, paging, defaults))
    }

    /// In-memory index, mostly for tests.
    pub fn in_memory(paging: PagingConfig, defaults: Vec<Source>) -> Result<Self, IndexError> {
        Ok(Self::with_store(Store::open_in_memory()?, paging, defaults))
    }

    fn with_store(store: Store, paging: PagingConfig, defaults: Vec<Source>) -> Self {
        Self {
            store: Arc::new(store),
            paging,
            defaults: Arc::new(defaults),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, IndexError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, IndexError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    pub fn paging(&self) -> &PagingConfig {
        &self.paging
    }

    pub fn default_endpoints(&self) -> &[Source] {
        &self.defaults
    }

    /// Seed the default sources if the index has none. Returns how many were added.
    pub async fn seed_defaults(&self) -> Result<usize, IndexError> {
        let defaults = Arc::clone(&self.defaults);
        let seeded = self.run(move |s| s.seed(&defaults)).await?;
        if seeded > 0 {
            info!(seeded, "Seeded default endpoints");
        }
        Ok(seeded)
    }

    pub async fn list_endpoints(&self) -> Result<Vec<Source>, IndexError> {
        self.run(|s| s.list_endpoints()).await
    }

    pub async fn get_endpoint(&self, name: &str) -> Result<Option<Source>, IndexError> {
        let name = name.to_string();
        self.run(move |s| s.get_endpoint(&name)).await
    }

    /// Store a new source; `false` if the name is taken.
    pub async fn add_endpoint(&self, source: Source) -> Result<bool, IndexError> {
        self.run(move |s| s.add_endpoint(&source)).await
    }

    /// Remove a source and cascade to its documents and elements.
    pub async fn remove_endpoint(&self, name: &str) -> Result<bool, IndexError> {
        let name = name.to_string();
        self.run(move |s| s.remove_endpoint(&name)).await
    }

    /// One page of documents. The cursor limit is clamped to the configured bounds.
    pub async fn page(
        &self,
        cursor: Cursor,
        filter: Option<Filter>,
        language: Option<String>,
    ) -> Result<Page, IndexError> {
        let cursor = Cursor {
            limit: self.paging.clamp(cursor.limit),
            ..cursor
        };
        let page = self
            .run(move |s| s.page(&cursor, filter.as_ref(), language.as_deref()))
            .await?;
        debug!(items = page.items.len(), "Served page");
        Ok(page)
    }

    /// First page with the default limit.
    pub async fn first_page(&self, filter: Option<Filter>) -> Result<Page, IndexError> {
        self.page(Cursor::first(self.paging.default_limit), filter, None)
            .await
    }

    /// Look a document up by id or asset id, within `source` if given.
    pub async fn find(
        &self,
        source: Option<&str>,
        id_or_asset_id: &str,
    ) -> Result<Option<Document>, IndexError> {
        let source = source.map(str::to_string);
        let id = id_or_asset_id.to_string();
        self.run(move |s| s.find(source.as_deref(), &id)).await
    }

    pub async fn get(&self, source: &str, id: &str) -> Result<Option<Document>, IndexError> {
        let (source, id) = (source.to_string(), id.to_string());
        self.run(move |s| s.get(&source, &id)).await
    }

    pub async fn count(&self, source: Option<&str>) -> Result<usize, IndexError> {
        let source = source.map(str::to_string);
        self.run(move |s| s.count(source.as_deref())).await
    }

    /// Unfiltered listing of one source, used to diff scans.
    pub async fn get_container_documents(&self, source: &str) -> Result<Vec<Document>, IndexError> {
        let source = source.to_string();
        self.run(move |s| s.container_documents(&source)).await
    }

    /// Insert a document; `true` if its key was new.
    pub async fn add(&self, document: Document) -> Result<bool, IndexError> {
        self.run(move |s| s.add(&document)).await
    }

    /// Update a document in place; `true` if its key existed.
    pub async fn update(&self, document: Document) -> Result<bool, IndexError> {
        self.run(move |s| s.update(&document)).await
    }

    pub async fn remove(&self, source: &str, id: &str) -> Result<bool, IndexError> {
        let (source, id) = (source.to_string(), id.to_string());
        self.run(move |s| s.remove(&source, &id)).await
    }

    /// Drop everything and restore the default source set, atomically.
    pub async fn reset(&self) -> Result<(), IndexError> {
        let defaults = Arc::clone(&self.defaults);
        self.run(move |s| s.reset(&defaults)).await?;
        info!(endpoints = self.defaults.len(), "Index reset");
        Ok(())
    }
}
