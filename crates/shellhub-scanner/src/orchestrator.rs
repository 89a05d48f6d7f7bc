//! Scan orchestration.
//!
//! A single supervisor task owns all orchestration state and is driven by
//! a command queue. Each source gets an actor task that applies its scan
//! events to the index, cache and fan-out in emission order. Scans
//! themselves run on worker threads (see [`crate::worker`]) and talk to
//! their source's actor only through a channel.
//!
//! A scan's successor is scheduled when its End is observed, so at most
//! one Scan task per source exists at any time.

use crate::driver::DriverFactory;
use crate::registry::{OwnerId, Task, TaskKind, TaskRegistry};
use crate::watcher::SourceWatcher;
use crate::worker::{self, ScanJob};
use crate::ScanError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shellhub_core::content::SubmodelElement;
use shellhub_core::{
    Channel, Document, Environment, IndexChange, LiveUpdate, LiveValue, Metrics,
    NotificationHub, ScanConfig, ScanDiagnostics, ScanEvent, Source, SourceKind, TaskId,
};
use shellhub_index::{ContentCache, DocumentIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared components the orchestrator writes to.
#[derive(Clone)]
pub struct ScanContext {
    pub index: DocumentIndex,
    pub cache: Arc<ContentCache>,
    pub hub: Arc<NotificationHub>,
    pub registry: Arc<TaskRegistry>,
    pub metrics: Arc<Metrics>,
    pub drivers: Arc<dyn DriverFactory>,
    pub config: ScanConfig,
}

/// Result of a reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOutcome {
    /// The index was reset immediately
    Completed,
    /// Tasks are in flight; the reset runs once they drain
    Deferred,
    /// A reset was already pending
    AlreadyPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub scanning: bool,
    /// A scan was requested while one was in flight
    pub rescan_pending: bool,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub sources: Vec<SourceStatus>,
    pub tasks: usize,
    pub reset_pending: bool,
}

enum Command {
    /// `generation` is set by cooldown timers; a mismatch marks the timer stale.
    Dispatch {
        source: String,
        generation: Option<u64>,
    },
    ScanFinished {
        source: String,
        task_id: TaskId,
        diagnostics: ScanDiagnostics,
    },
    AddEndpoint {
        endpoint: Source,
        reply: oneshot::Sender<Result<(), ScanError>>,
    },
    RemoveEndpoint {
        name: String,
        reply: oneshot::Sender<Result<bool, ScanError>>,
    },
    Reset {
        reply: oneshot::Sender<Result<ResetOutcome, ScanError>>,
    },
    Status {
        reply: oneshot::Sender<OrchestratorStatus>,
    },
    /// A task of this owner other than a scan was deleted
    Drained,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for talking to a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Command>,
    owner: OwnerId,
}

impl OrchestratorHandle {
    /// Owner id under which this orchestrator registers its tasks.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Scan `source` now, or right after the scan in flight ends.
    pub fn request_scan(&self, source: &str) -> Result<(), ScanError> {
        self.send(Command::Dispatch {
            source: source.to_string(),
            generation: None,
        })
    }

    /// Signal that a task of this owner finished outside the scan cycle.
    pub fn notify_drained(&self) {
        let _ = self.tx.send(Command::Drained);
    }

    pub async fn add_endpoint(&self, endpoint: Source) -> Result<(), ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AddEndpoint { endpoint, reply })?;
        rx.await.map_err(|_| ScanError::Stopped)?
    }

    /// Remove a source, its documents and cached content. `false` if unknown.
    pub async fn remove_endpoint(&self, name: &str) -> Result<bool, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RemoveEndpoint {
            name: name.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| ScanError::Stopped)?
    }

    pub async fn reset(&self) -> Result<ResetOutcome, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply })?;
        rx.await.map_err(|_| ScanError::Stopped)?
    }

    pub async fn status(&self) -> Result<OrchestratorStatus, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| ScanError::Stopped)
    }

    /// Stop every source actor and the supervisor.
    pub async fn shutdown(&self) -> Result<(), ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply })?;
        rx.await.map_err(|_| ScanError::Stopped)
    }

    fn send(&self, command: Command) -> Result<(), ScanError> {
        self.tx.send(command).map_err(|_| ScanError::Stopped)
    }
}

/// Entry point for starting the orchestrator.
pub struct Orchestrator;

impl Orchestrator {
    /// Spawn the supervisor and dispatch one scan per known source.
    pub async fn start(ctx: ScanContext) -> Result<OrchestratorHandle, ScanError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = OrchestratorHandle {
            tx: tx.clone(),
            owner: OwnerId::next(),
        };

        let watcher = ctx.config.watch_local_sources.then(|| {
            let requester = handle.clone();
            SourceWatcher::new(ctx.config.debounce(), move |name| {
                if let Err(e) = requester.request_scan(name) {
                    debug!(source = %name, error = %e, "Dropped watcher scan request");
                }
            })
        });

        let mut supervisor = Supervisor {
            ctx,
            owner: handle.owner,
            tx,
            actors: HashMap::new(),
            generation: 0,
            reset_pending: false,
            watcher,
        };
        supervisor.start_all().await?;

        info!(owner = %handle.owner, sources = supervisor.actors.len(), "Orchestrator started");
        tokio::spawn(supervisor.run(rx));
        Ok(handle)
    }
}

struct ActorHandle {
    events: mpsc::UnboundedSender<ScanEvent>,
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
    rescan: bool,
    generation: u64,
}

impl ActorHandle {
    /// Stop the actor without draining its queue, and wait for it.
    async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.join.await;
    }
}

struct Supervisor {
    ctx: ScanContext,
    owner: OwnerId,
    tx: mpsc::UnboundedSender<Command>,
    actors: HashMap<String, ActorHandle>,
    /// Last generation handed out; shared by all actors, past and present
    generation: u64,
    reset_pending: bool,
    watcher: Option<SourceWatcher>,
}

impl Supervisor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Dispatch { source, generation } => self.dispatch(&source, generation),
                Command::ScanFinished {
                    source,
                    task_id,
                    diagnostics,
                } => self.scan_finished(&source, task_id, diagnostics).await,
                Command::AddEndpoint { endpoint, reply } => {
                    let _ = reply.send(self.add_endpoint(endpoint).await);
                }
                Command::RemoveEndpoint { name, reply } => {
                    let _ = reply.send(self.remove_endpoint(&name).await);
                }
                Command::Reset { reply } => {
                    let _ = reply.send(self.request_reset().await);
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                Command::Drained => self.resume_reset().await,
                Command::Shutdown { reply } => {
                    self.stop_all().await;
                    info!(owner = %self.owner, "Orchestrator stopped");
                    let _ = reply.send(());
                    return;
                }
            }
        }
        self.stop_all().await;
    }

    /// Start actors for every stored source and dispatch their first scans.
    async fn start_all(&mut self) -> Result<(), ScanError> {
        let endpoints = self.ctx.index.list_endpoints().await?;
        for endpoint in &endpoints {
            self.start_actor(endpoint);
        }
        for endpoint in &endpoints {
            self.dispatch(&endpoint.name, None);
        }
        Ok(())
    }

    fn start_actor(&mut self, source: &Source) {
        if self.actors.contains_key(&source.name) {
            return;
        }

        let (events, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();
        let actor = SourceActor {
            name: source.name.clone(),
            owner: self.owner,
            ctx: self.ctx.clone(),
            supervisor: self.tx.clone(),
        };
        let join = tokio::spawn(actor.run(rx, stop_rx));

        if source.kind == SourceKind::FileSystem {
            if let Some(watcher) = &mut self.watcher {
                if let Err(e) = watcher.watch(source) {
                    warn!(source = %source.name, error = %e, "Cannot watch source");
                }
            }
        }

        debug!(source = %source.name, "Source actor started");
        self.actors.insert(
            source.name.clone(),
            ActorHandle {
                events,
                stop,
                join,
                rescan: false,
                generation: 0,
            },
        );
    }

    async fn stop_all(&mut self) {
        if let Some(watcher) = &mut self.watcher {
            watcher.clear();
        }
        for (name, actor) in self.actors.drain() {
            actor.stop().await;
            debug!(source = %name, "Source actor stopped");
        }
    }

    fn dispatch(&mut self, name: &str, generation: Option<u64>) {
        if self.reset_pending {
            debug!(source = %name, "Reset pending, dispatch dropped");
            return;
        }
        let Some(actor) = self.actors.get_mut(name) else {
            debug!(source = %name, "Dispatch for unknown source dropped");
            return;
        };
        if generation.is_some_and(|g| g != actor.generation) {
            debug!(source = %name, "Stale cooldown dispatch dropped");
            return;
        }
        if self.ctx.registry.find_by_name(name, TaskKind::Scan).is_some() {
            actor.rescan = true;
            debug!(source = %name, "Scan in flight, rescan queued");
            return;
        }

        self.generation += 1;
        actor.generation = self.generation;
        actor.rescan = false;

        let task_id = self.ctx.registry.create();
        self.ctx.registry.set(
            task_id,
            Task {
                owner: self.owner,
                name: name.to_string(),
                kind: TaskKind::Scan,
            },
        );
        info!(source = %name, task = %task_id, "Dispatching scan");

        let events = actor.events.clone();
        let index = self.ctx.index.clone();
        let drivers = Arc::clone(&self.ctx.drivers);
        let name = name.to_string();
        tokio::spawn(async move {
            let prepared = async {
                let source = index
                    .get_endpoint(&name)
                    .await?
                    .ok_or_else(|| ScanError::Configuration(format!("unknown source {name}")))?;
                let listing = index.get_container_documents(&name).await?;
                Ok::<_, ScanError>((source, listing))
            }
            .await;

            let spawned = prepared.and_then(|(source, listing)| {
                let sink = events.clone();
                let job = ScanJob {
                    task_id,
                    source,
                    listing,
                    drivers,
                };
                worker::spawn_scan(job, move |event| {
                    let _ = sink.send(event);
                })
                .map_err(ScanError::from)
            });

            if let Err(e) = spawned {
                let _ = events.send(ScanEvent::End {
                    task_id,
                    diagnostics: ScanDiagnostics::failed(e.to_string()),
                });
            }
        });
    }

    async fn scan_finished(&mut self, source: &str, task_id: TaskId, diagnostics: ScanDiagnostics) {
        if self.ctx.registry.delete(task_id).is_none() {
            debug!(source = %source, task = %task_id, "Scan result for unknown task discarded");
            return;
        }

        self.ctx.metrics.record_scan(diagnostics.is_failure());
        match &diagnostics.failure {
            None => info!(
                source = %source,
                task = %task_id,
                added = diagnostics.added,
                changed = diagnostics.changed,
                removed = diagnostics.removed,
                warnings = diagnostics.warnings.len(),
                duration_ms = diagnostics.duration_ms,
                "Scan finished"
            ),
            Some(failure) => warn!(
                source = %source,
                task = %task_id,
                error = %failure,
                duration_ms = diagnostics.duration_ms,
                "Scan failed"
            ),
        }

        if self.reset_pending {
            self.resume_reset().await;
            return;
        }

        let Some((rescan, generation)) = self
            .actors
            .get(source)
            .map(|actor| (actor.rescan, actor.generation))
        else {
            debug!(source = %source, "Source removed during scan");
            return;
        };
        if rescan {
            self.dispatch(source, None);
        } else {
            self.schedule(source, generation);
        }
    }

    /// Dispatch `source` again after the cooldown.
    fn schedule(&self, source: &str, generation: u64) {
        let tx = self.tx.clone();
        let source = source.to_string();
        let cooldown = self.ctx.config.cooldown();
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let _ = tx.send(Command::Dispatch {
                source,
                generation: Some(generation),
            });
        });
    }

    async fn add_endpoint(&mut self, endpoint: Source) -> Result<(), ScanError> {
        endpoint.validate()?;
        if !self.ctx.index.add_endpoint(endpoint.clone()).await? {
            return Err(ScanError::Conflict(endpoint.name));
        }

        info!(source = %endpoint.name, kind = %endpoint.kind, "Endpoint added");
        self.start_actor(&endpoint);
        self.ctx.hub.publish_change(IndexChange::EndpointAdded {
            endpoint: endpoint.clone(),
        });
        self.dispatch(&endpoint.name, None);
        Ok(())
    }

    async fn remove_endpoint(&mut self, name: &str) -> Result<bool, ScanError> {
        let Some(endpoint) = self.ctx.index.get_endpoint(name).await? else {
            return Ok(false);
        };

        if let Some(actor) = self.actors.remove(name) {
            actor.stop().await;
        }
        if let Some(watcher) = &mut self.watcher {
            watcher.unwatch(name);
        }
        while let Some(task_id) = self.ctx.registry.find_by_name(name, TaskKind::Scan) {
            self.ctx.registry.delete(task_id);
            debug!(source = %name, task = %task_id, "Abandoned in-flight scan");
        }

        let removed = self.ctx.index.remove_endpoint(name).await?;
        let evicted = self.ctx.cache.remove_source(name);
        info!(source = %name, evicted, "Endpoint removed");
        self.ctx
            .hub
            .publish_change(IndexChange::EndpointRemoved { endpoint });

        self.resume_reset().await;
        Ok(removed)
    }

    async fn request_reset(&mut self) -> Result<ResetOutcome, ScanError> {
        if self.reset_pending {
            return Ok(ResetOutcome::AlreadyPending);
        }
        self.reset_pending = true;

        if self.ctx.registry.is_empty_for(self.owner) {
            self.execute_reset().await?;
            Ok(ResetOutcome::Completed)
        } else {
            info!(owner = %self.owner, "Reset deferred until tasks drain");
            Ok(ResetOutcome::Deferred)
        }
    }

    /// Run a pending reset if this owner has no tasks left.
    async fn resume_reset(&mut self) {
        if self.reset_pending && self.ctx.registry.is_empty_for(self.owner) {
            if let Err(e) = self.execute_reset().await {
                error!(error = %e, "Deferred reset failed");
            }
        }
    }

    async fn execute_reset(&mut self) -> Result<(), ScanError> {
        self.reset_pending = false;
        self.stop_all().await;

        let reset = self.ctx.index.reset().await;
        if reset.is_ok() {
            self.ctx.cache.clear();
            self.ctx.hub.publish_change(IndexChange::Reset);
        }

        self.start_all().await?;
        reset.map_err(ScanError::from)
    }

    fn status(&self) -> OrchestratorStatus {
        let mut sources: Vec<SourceStatus> = self
            .actors
            .iter()
            .map(|(name, actor)| SourceStatus {
                name: name.clone(),
                scanning: self.ctx.registry.find_by_name(name, TaskKind::Scan).is_some(),
                rescan_pending: actor.rescan,
                watched: self
                    .watcher
                    .as_ref()
                    .is_some_and(|w| w.is_watching(name)),
            })
            .collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));

        OrchestratorStatus {
            sources,
            tasks: self.ctx.registry.len(),
            reset_pending: self.reset_pending,
        }
    }
}

/// Applies one source's scan events in order.
struct SourceActor {
    name: String,
    owner: OwnerId,
    ctx: ScanContext,
    supervisor: mpsc::UnboundedSender<Command>,
}

impl SourceActor {
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<ScanEvent>,
        mut stop: oneshot::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut stop => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                ScanEvent::End {
                    task_id,
                    diagnostics,
                } => self.end(task_id, diagnostics),
                event => {
                    let kind = event.name();
                    if let Err(e) = self.apply(event).await {
                        warn!(source = %self.name, event = kind, error = %e, "Failed to apply scan event");
                    }
                }
            }
        }
    }

    fn end(&self, task_id: TaskId, diagnostics: ScanDiagnostics) {
        match self.ctx.registry.get(task_id) {
            Some(task) if task.owner == self.owner && task.name == self.name => {
                let _ = self.supervisor.send(Command::ScanFinished {
                    source: self.name.clone(),
                    task_id,
                    diagnostics,
                });
            }
            Some(task) => {
                debug!(source = %self.name, task = %task_id, owner = %task.owner, "Foreign scan result discarded");
            }
            None => {
                debug!(source = %self.name, task = %task_id, "Scan result for unknown task discarded");
            }
        }
    }

    async fn apply(&self, event: ScanEvent) -> Result<(), ScanError> {
        match event {
            ScanEvent::Added(document) => {
                self.ctx.index.add(document.clone()).await?;
                self.ctx.hub.publish_change(IndexChange::Added {
                    document: document.without_content(),
                });
            }
            ScanEvent::Changed(document) => {
                let key = document.key();
                match &document.content {
                    Some(content) => {
                        self.ctx.cache.refresh(&key, Arc::clone(content));
                    }
                    None => {
                        self.ctx.cache.remove(&key);
                    }
                }
                self.ctx.index.update(document.clone()).await?;
                self.ctx.hub.publish_change(IndexChange::Changed {
                    document: document.without_content(),
                });

                if let Some(content) = &document.content {
                    if self.ctx.hub.has_subscribers(&Channel::document(&key)) {
                        self.ctx.hub.publish_live(live_update(&document, content));
                    }
                }
            }
            ScanEvent::Removed { document, source } => {
                self.ctx.index.remove(&source, &document.id).await?;
                self.ctx.cache.remove(&document.key());
                self.ctx.hub.publish_change(IndexChange::Removed {
                    document: document.without_content(),
                });
            }
            ScanEvent::End { .. } => return Ok(()),
        }
        self.ctx.metrics.record_event_applied();
        Ok(())
    }
}

/// Current property values of a document, for its live channel.
fn live_update(document: &Document, content: &Environment) -> LiveUpdate {
    let values = content
        .flatten()
        .filter(|entry| matches!(entry.item.element, SubmodelElement::Property(_)))
        .flat_map(|entry| {
            let submodel = entry.item.submodel.id.clone();
            entry
                .item
                .values()
                .into_iter()
                .map(move |value| LiveValue {
                    submodel: submodel.clone(),
                    path: entry.path.clone(),
                    value: value.display(),
                })
        })
        .collect();

    LiveUpdate {
        source: document.source.clone(),
        id: document.id.clone(),
        timestamp: Utc::now(),
        values,
    }
}
