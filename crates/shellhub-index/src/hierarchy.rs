//! Parent/child relationships between documents.
//!
//! Asset hierarchies are expressed as references between otherwise
//! unrelated documents, either through a bill-of-material style submodel or
//! through reference elements pointing at other shells. The resolver walks
//! those references depth-first, resolving each child through the index.

use crate::index::DocumentIndex;
use crate::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellhub_core::content::SubmodelElement;
use shellhub_core::{DocKey, Document, Environment};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Semantic ids of submodels describing an asset's structure.
pub const HIERARCHY_SEMANTIC_IDS: &[&str] = &[
    "https://admin-shell.io/idta/HierarchicalStructuresEnablingBoM/1/0/Submodel",
    "https://admin-shell.io/idta/HierarchicalStructuresEnablingBoM/1/1/Submodel",
];

/// Supplies the materialized content of a document.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, document: &Document) -> Result<Arc<Environment>, IndexError>;
}

/// One document of a resolved hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub document: Document,
    /// Id of the parent document, `None` for the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::size).sum::<usize>()
    }
}

/// Ids of documents referenced as children by `content`, in discovery order.
///
/// Structure submodels contribute the global asset ids of their nested
/// entities (the entry node describing the document itself is skipped);
/// every other element contributes shell references.
pub fn child_ids(document: &Document, content: &Environment) -> Vec<String> {
    let own_ids = [Some(document.id.as_str()), document.asset_id.as_deref()];
    let mut ids: Vec<String> = Vec::new();
    let mut push = |id: &str| {
        if !own_ids.iter().flatten().any(|own| *own == id) && !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    };

    for submodel in &content.submodels {
        let structural = HIERARCHY_SEMANTIC_IDS
            .iter()
            .any(|id| submodel.has_semantic_id(id));
        if !structural {
            continue;
        }
        for entry in shellhub_core::Flatten::over(std::slice::from_ref(submodel)) {
            if let SubmodelElement::Entity(entity) = entry.item.element {
                if let Some(asset_id) = &entity.global_asset_id {
                    push(asset_id);
                }
            }
        }
    }

    for entry in content.flatten() {
        if let SubmodelElement::ReferenceElement(element) = entry.item.element {
            if let Some(shell_id) = element.value.as_ref().and_then(|r| r.shell_id()) {
                push(shell_id);
            }
        }
    }

    ids
}

type NodeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HierarchyNode, IndexError>> + Send + 'a>>;

/// Computes the descendant tree of a document.
pub struct HierarchyResolver {
    index: DocumentIndex,
    loader: Arc<dyn ContentLoader>,
}

impl HierarchyResolver {
    pub fn new(index: DocumentIndex, loader: Arc<dyn ContentLoader>) -> Self {
        Self { index, loader }
    }

    /// Resolve the full hierarchy below `root`.
    ///
    /// Each (source, id) appears at most once per traversal, so cyclic
    /// references terminate. Children whose content cannot be loaded are
    /// kept as leaves.
    pub async fn resolve(&self, root: &Document) -> Result<HierarchyNode, IndexError> {
        let mut visited = HashSet::new();
        visited.insert(root.key());
        self.node(root.without_content(), root.content.clone(), None, &mut visited)
            .await
    }

    fn node<'a>(
        &'a self,
        document: Document,
        content: Option<Arc<Environment>>,
        parent_id: Option<String>,
        visited: &'a mut HashSet<DocKey>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let content = match content {
                Some(content) => Some(content),
                None => match self.loader.load(&document).await {
                    Ok(content) => Some(content),
                    Err(e) if parent_id.is_some() => {
                        warn!(document = %document.key(), error = %e, "Hierarchy child not loadable");
                        None
                    }
                    Err(e) => return Err(e),
                },
            };

            let mut children = Vec::new();
            if let Some(content) = content {
                for child_id in child_ids(&document, &content) {
                    let Some(child) = self.lookup(&document.source, &child_id).await? else {
                        debug!(parent = %document.key(), child = %child_id, "Unresolved hierarchy reference");
                        continue;
                    };
                    if !visited.insert(child.key()) {
                        continue;
                    }
                    let node = self
                        .node(child, None, Some(document.id.clone()), visited)
                        .await?;
                    children.push(node);
                }
            }

            Ok(HierarchyNode {
                document,
                parent_id,
                children,
            })
        })
    }

    /// Prefer a match in the parent's source, then any source.
    async fn lookup(&self, source: &str, id: &str) -> Result<Option<Document>, IndexError> {
        if let Some(document) = self.index.find(Some(source), id).await? {
            return Ok(Some(document));
        }
        self.index.find(None, id).await
    }
}
