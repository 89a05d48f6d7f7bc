//! Isolated scan execution.
//!
//! Each scan runs on its own OS thread with its own driver instance. The
//! thread shares nothing with the control plane; it reports back only
//! through the `emit` callback, and always finishes with exactly one
//! `ScanEvent::End`, even when the driver panics.

use crate::driver::DriverFactory;
use crate::ScanError;
use shellhub_core::{Document, ScanDiagnostics, ScanEvent, Source, TaskId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::debug;

/// Everything a scan needs, moved onto the worker thread.
pub struct ScanJob {
    pub task_id: TaskId,
    pub source: Source,
    /// Documents currently indexed for the source
    pub listing: Vec<Document>,
    pub drivers: Arc<dyn DriverFactory>,
}

/// Start `job` on a dedicated thread.
pub fn spawn_scan<F>(job: ScanJob, mut emit: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut(ScanEvent) + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("scan-{}", job.source.name))
        .spawn(move || {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(&job, &mut emit)));

            let mut diagnostics = match outcome {
                Ok(Ok(diagnostics)) => diagnostics,
                Ok(Err(e)) => ScanDiagnostics::failed(e.to_string()),
                Err(payload) => ScanDiagnostics::failed(panic_message(payload.as_ref())),
            };
            diagnostics.duration_ms = started.elapsed().as_millis() as u64;

            debug!(source = %job.source.name, task = %job.task_id, "Scan thread finished");
            emit(ScanEvent::End {
                task_id: job.task_id,
                diagnostics,
            });
        })
}

fn run(job: &ScanJob, emit: &mut dyn FnMut(ScanEvent)) -> Result<ScanDiagnostics, ScanError> {
    let mut driver = job.drivers.create(&job.source)?;
    driver.open()?;
    let result = driver.scan(&job.listing, emit);
    driver.close();
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("scan panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("scan panicked: {message}")
    } else {
        "scan panicked".to_string()
    }
}
