// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// UI-affine executor for presentation-surface work.
//
// Window changes belong to a UI thread, and the signaling operations must not
// wait for them. Tasks are queued on a FIFO channel and run by one dedicated
// thread, so changes for a session apply in the order they were requested.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use callkit_bridge::traits::PresentationSurface;
use callkit_core::error::Result;
use callkit_core::types::SessionId;
use tracing::{debug, warn};

/// Work queued for the UI thread.
enum SurfaceTask {
    /// Foreground the host app and set the bypass flags.
    Raise(SessionId),
    /// Clear the bypass flags.
    Restore(SessionId),
    /// Signals once everything queued before it has run.
    Barrier(mpsc::Sender<()>),
}

/// Fire-and-forget runner for [`PresentationSurface`] calls.
pub struct UiExecutor {
    tx: Option<mpsc::Sender<SurfaceTask>>,
    thread: Option<JoinHandle<()>>,
    suppressed: Arc<AtomicUsize>,
}

impl UiExecutor {
    /// Start the `callkit-ui` thread.
    pub fn spawn(surface: Arc<dyn PresentationSurface>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<SurfaceTask>();
        let suppressed = Arc::new(AtomicUsize::new(0));
        let failures = Arc::clone(&suppressed);

        let thread = std::thread::Builder::new()
            .name("callkit-ui".into())
            .spawn(move || {
                let soft = |what: &str, session: &SessionId, r: Result<()>| {
                    if let Err(e) = r {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(%session, error = %e, "{what} failed, continuing");
                    }
                };
                while let Ok(task) = rx.recv() {
                    match task {
                        SurfaceTask::Raise(session) => {
                            soft("bring to foreground", &session, surface.bring_to_foreground());
                            soft("set bypass flags", &session, surface.set_bypass_flags());
                            debug!(%session, "presentation raised");
                        }
                        SurfaceTask::Restore(session) => {
                            soft("clear bypass flags", &session, surface.clear_bypass_flags());
                            debug!(%session, "presentation restored");
                        }
                        SurfaceTask::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("UI executor stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
            suppressed,
        })
    }

    fn submit(&self, task: SurfaceTask) {
        let sent = self.tx.as_ref().map(|tx| tx.send(task).is_ok());
        if sent != Some(true) {
            warn!("UI executor is gone, dropping presentation task");
        }
    }

    pub fn raise(&self, session: SessionId) {
        self.submit(SurfaceTask::Raise(session));
    }

    pub fn restore(&self, session: SessionId) {
        self.submit(SurfaceTask::Restore(session));
    }

    /// Block until every task submitted so far has run.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.submit(SurfaceTask::Barrier(done_tx));
        let _ = done_rx.recv();
    }

    /// Presentation failures logged and swallowed so far.
    pub fn suppressed_count(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl Drop for UiExecutor {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
