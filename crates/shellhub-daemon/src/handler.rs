//! Request handler for daemon IPC.

use async_trait::async_trait;
use shellhub_core::{
    Channel, CoreError, Cursor, DocKey, Document, IndexChange, Metrics, NotificationHub,
    Subscription,
};
use shellhub_index::{ContentCache, ContentLoader, DocumentIndex, HierarchyResolver, IndexError};
use shellhub_ipc::{DaemonStatus, ErrorCode, Request, RequestHandler, Response, ResponseData};
use shellhub_scanner::{OrchestratorHandle, ScanError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Everything the handler serves requests from.
pub struct Services {
    pub index: DocumentIndex,
    pub cache: Arc<ContentCache>,
    pub hub: Arc<NotificationHub>,
    pub metrics: Arc<Metrics>,
    pub orchestrator: OrchestratorHandle,
    pub loader: Arc<dyn ContentLoader>,
    pub hierarchy: HierarchyResolver,
}

/// Handles incoming IPC requests
pub struct DaemonHandler {
    services: Services,
    shutdown_tx: broadcast::Sender<()>,
}

impl DaemonHandler {
    pub fn new(services: Services, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            services,
            shutdown_tx,
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, Response> {
        let Services {
            index,
            cache,
            hub,
            orchestrator,
            loader,
            hierarchy,
            ..
        } = &self.services;

        let response = match request {
            Request::Ping => Response::ok_with(ResponseData::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }),

            Request::Status => {
                Response::ok_with(ResponseData::Status(Box::new(self.status().await?)))
            }

            Request::ListEndpoints => {
                let endpoints = index.list_endpoints().await.map_err(index_error)?;
                Response::ok_with(ResponseData::Endpoints { endpoints })
            }

            Request::GetEndpoint { name } => match index.get_endpoint(&name).await.map_err(index_error)? {
                Some(endpoint) => Response::ok_with(ResponseData::Endpoint { endpoint }),
                None => return Err(not_found(format!("Unknown endpoint: {}", name))),
            },

            Request::AddEndpoint { endpoint } => {
                orchestrator
                    .add_endpoint(endpoint.clone())
                    .await
                    .map_err(scan_error)?;
                tracing::info!(source = %endpoint.name, url = %endpoint.url, "Endpoint added");
                Response::ok_with(ResponseData::Endpoint { endpoint })
            }

            Request::RemoveEndpoint { name } => {
                let removed = orchestrator.remove_endpoint(&name).await.map_err(scan_error)?;
                if removed {
                    tracing::info!(source = %name, "Endpoint removed");
                }
                Response::ok_with(ResponseData::Removed { removed })
            }

            Request::Page {
                cursor,
                filter,
                language,
            } => {
                let cursor = cursor.unwrap_or_else(|| Cursor::first(index.paging().default_limit));
                let page = index
                    .page(cursor, filter, language)
                    .await
                    .map_err(index_error)?;
                Response::ok_with(ResponseData::Page { page })
            }

            Request::Find { source, id } => {
                let document = index
                    .find(source.as_deref(), &id)
                    .await
                    .map_err(index_error)?;
                Response::ok_with(ResponseData::Document { document })
            }

            Request::GetDocument { source, id } => {
                let document = index.get(&source, &id).await.map_err(index_error)?;
                Response::ok_with(ResponseData::Document { document })
            }

            Request::GetContent { source, id } => {
                let document = self.require(&source, &id).await?;
                let content = loader.load(&document).await.map_err(index_error)?;
                Response::ok_with(ResponseData::Content { content })
            }

            Request::GetHierarchy { source, id } => {
                let document = self.require(&source, &id).await?;
                let root = hierarchy.resolve(&document).await.map_err(index_error)?;
                tracing::debug!(document = %document.key(), nodes = root.size(), "Resolved hierarchy");
                Response::ok_with(ResponseData::Hierarchy { root })
            }

            Request::DeleteDocument { source, id } => {
                let removed = match index.get(&source, &id).await.map_err(index_error)? {
                    Some(document) => {
                        let removed = index.remove(&source, &id).await.map_err(index_error)?;
                        cache.remove(&DocKey::new(&source, &id));
                        if removed {
                            hub.publish_change(IndexChange::Removed { document });
                        }
                        removed
                    }
                    None => false,
                };
                Response::ok_with(ResponseData::Removed { removed })
            }

            Request::Rescan { source } => {
                if index.get_endpoint(&source).await.map_err(index_error)?.is_none() {
                    return Err(not_found(format!("Unknown endpoint: {}", source)));
                }
                orchestrator.request_scan(&source).map_err(scan_error)?;
                Response::ack()
            }

            Request::Reset => {
                let outcome = orchestrator.reset().await.map_err(scan_error)?;
                tracing::info!(?outcome, "Reset requested");
                Response::ok_with(ResponseData::Reset { outcome })
            }

            Request::Subscribe { .. } => {
                return Err(Response::error(
                    ErrorCode::InvalidRequest,
                    "Subscriptions are served by the connection, not the handler",
                ));
            }

            Request::Shutdown => {
                tracing::info!("Shutdown requested");
                let _ = self.shutdown_tx.send(());
                Response::ack()
            }
        };

        Ok(response)
    }

    async fn require(&self, source: &str, id: &str) -> Result<Document, Response> {
        self.services
            .index
            .get(source, id)
            .await
            .map_err(index_error)?
            .ok_or_else(|| not_found(format!("Unknown document: {}/{}", source, id)))
    }

    async fn status(&self) -> Result<DaemonStatus, Response> {
        let Services {
            index,
            cache,
            hub,
            metrics,
            orchestrator,
            ..
        } = &self.services;

        let endpoints = index.list_endpoints().await.map_err(index_error)?;
        let mut documents_by_source = BTreeMap::new();
        for endpoint in &endpoints {
            let count = index.count(Some(&endpoint.name)).await.map_err(index_error)?;
            documents_by_source.insert(endpoint.name.clone(), count);
        }

        Ok(DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: metrics.uptime_secs(),
            endpoints: endpoints.len(),
            documents: index.count(None).await.map_err(index_error)?,
            documents_by_source,
            cached_documents: cache.len(),
            channels: hub.channel_count(),
            metrics: metrics.snapshot(),
            orchestrator: orchestrator.status().await.map_err(scan_error)?,
        })
    }
}

#[async_trait]
impl RequestHandler for DaemonHandler {
    async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let action = request.action();
        let response = self
            .dispatch(request)
            .await
            .unwrap_or_else(|error| error);
        self.services
            .metrics
            .record_operation(action, start.elapsed());
        response
    }

    fn subscribe(&self, channel: Channel) -> Option<Subscription> {
        Some(self.services.hub.subscribe(channel))
    }
}

fn not_found(message: String) -> Response {
    Response::error(ErrorCode::NotFound, message)
}

fn index_error(e: IndexError) -> Response {
    let code = match &e {
        IndexError::Storage(_) | IndexError::Serialization(_) => ErrorCode::Storage,
        IndexError::Load { .. } => ErrorCode::Unavailable,
        IndexError::Core(CoreError::Configuration(_)) => ErrorCode::Configuration,
        IndexError::Core(_) => ErrorCode::InternalError,
    };
    tracing::warn!(error = %e, ?code, "Request failed");
    Response::error(code, e.to_string())
}

fn scan_error(e: ScanError) -> Response {
    let code = match &e {
        ScanError::Configuration(_) | ScanError::Unsupported(_) => ErrorCode::Configuration,
        ScanError::Conflict(_) => ErrorCode::Conflict,
        ScanError::Index(inner) => match inner {
            IndexError::Load { .. } => ErrorCode::Unavailable,
            _ => ErrorCode::Storage,
        },
        ScanError::Stopped => ErrorCode::ShuttingDown,
        _ => ErrorCode::InternalError,
    };
    tracing::warn!(error = %e, ?code, "Request failed");
    Response::error(code, e.to_string())
}
