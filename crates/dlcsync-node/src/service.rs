//! Service lifecycle and runtime wiring.
//!
//! [`ResendService`] is the public entry point for the dlcsync runtime.
//! It owns the log, cursor, coordinator, and peer gates, and feeds a
//! bounded [`TransportEvent`](crate::events::TransportEvent) channel
//! into the event loop.
//!
//! # State machine
//!
//! ```text
//! Initializing ──start()──▶ Running ──shutdown()──▶ ShuttingDown
//! ```
//!
//! Double-start and shutdown-from-initializing are rejected with
//! `DlcSyncError::Config`.

use std::sync::Arc;

use dlcsync_storage::engine::StorageEngine;
use dlcsync_storage::messages::{MessageLog, NewMessage, RecordOutcome};
use dlcsync_storage::outbound::OutboundCursor;
use dlcsync_types::config::SyncConfig;
use dlcsync_types::{DlcSyncError, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::coordinator::ResendCoordinator;
use crate::event_loop;
use crate::events::TransportEvent;
use crate::gate::PeerGates;
use crate::outgoing;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// ServiceState
// ---------------------------------------------------------------------------

/// Lifecycle state of the service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceState {
    /// Components created, event loop not started.
    Initializing,
    /// Event loop is active.
    Running,
    /// Graceful shutdown completed or in progress.
    ShuttingDown,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceRuntime (internal)
// ---------------------------------------------------------------------------

/// Owned runtime state moved into the event loop task.
pub(crate) struct ServiceRuntime {
    pub(crate) log: Arc<MessageLog>,
    pub(crate) coordinator: Arc<ResendCoordinator>,
    pub(crate) gates: Arc<PeerGates>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) event_rx: mpsc::Receiver<TransportEvent>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

// ---------------------------------------------------------------------------
// ResendService
// ---------------------------------------------------------------------------

/// Owns the resend subsystem and its event loop.
pub struct ResendService {
    state: ServiceState,
    log: Arc<MessageLog>,
    coordinator: Arc<ResendCoordinator>,
    gates: Arc<PeerGates>,
    transport: Arc<dyn Transport>,
    event_tx: mpsc::Sender<TransportEvent>,
    shutdown_tx: watch::Sender<bool>,
    runtime: Option<ServiceRuntime>,
    handle: Option<JoinHandle<()>>,
}

impl ResendService {
    /// Creates the service over an opened engine and a transport.
    pub fn new(
        engine: Arc<StorageEngine>,
        transport: Arc<dyn Transport>,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;

        let log = Arc::new(MessageLog::new(Arc::clone(&engine))?);
        let cursor = OutboundCursor::new(engine)?;
        let coordinator = Arc::new(ResendCoordinator::new(cursor));
        let gates = Arc::new(PeerGates::new());

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runtime = ServiceRuntime {
            log: Arc::clone(&log),
            coordinator: Arc::clone(&coordinator),
            gates: Arc::clone(&gates),
            transport: Arc::clone(&transport),
            event_rx,
            shutdown_rx,
        };

        Ok(Self {
            state: ServiceState::Initializing,
            log,
            coordinator,
            gates,
            transport,
            event_tx,
            shutdown_tx,
            runtime: Some(runtime),
            handle: None,
        })
    }

    /// Spawns the event loop.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Config`] if the service was already started.
    pub fn start(&mut self) -> Result<()> {
        let runtime = self.runtime.take().ok_or_else(|| DlcSyncError::Config {
            reason: format!("cannot start service in state {}", self.state),
        })?;

        self.handle = Some(tokio::spawn(event_loop::run_event_loop(runtime)));
        self.state = ServiceState::Running;
        tracing::info!("resend service started");
        Ok(())
    }

    /// Signals shutdown and waits for the event loop to exit.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Config`] if the service is not running.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state != ServiceState::Running {
            return Err(DlcSyncError::Config {
                reason: format!("cannot shut down service in state {}", self.state),
            });
        }
        self.state = ServiceState::ShuttingDown;

        // Receiver dropping with the loop is fine; ignore send failure.
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            handle.await.map_err(|e| DlcSyncError::Config {
                reason: format!("event loop task failed: {e}"),
            })?;
        }

        tracing::info!("resend service stopped");
        Ok(())
    }

    /// Returns the sender the transport adapter feeds events into.
    pub fn event_sender(&self) -> mpsc::Sender<TransportEvent> {
        self.event_tx.clone()
    }

    /// Records and transmits one outbound message through the shared
    /// gates, so sends and resends for a peer never interleave.
    pub fn send_outbound(&self, msg: &NewMessage, body: &[u8]) -> Result<RecordOutcome> {
        outgoing::send_outbound(&self.log, &self.gates, self.transport.as_ref(), msg, body)
    }

    /// Returns the shared message log (lookups, audit listings).
    pub fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    /// Returns the coordinator (state inspection, cursor teardown).
    pub fn coordinator(&self) -> &Arc<ResendCoordinator> {
        &self.coordinator
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state
    }
}
