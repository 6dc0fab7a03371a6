//! Routing of inbound streams to the identify handlers.
//!
//! The transport tags every accepted stream with the protocol it was opened
//! under. The dispatcher answers identify streams, applies push streams and
//! rejects everything else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use ident_proto::consts::{IDENTIFY_PROTOCOL, PUSH_PROTOCOL};
use ident_transport::{BoxSubstream, InboundStream, Incoming, Substream};

use crate::errors::IdentifyError;
use crate::identify::{close, IdentifyService};

// ============================================================================
// Dispatch Statistics
// ============================================================================

/// Counters for inbound stream dispatch.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Total streams received
    pub received: AtomicU64,
    /// Identify streams answered
    pub identify: AtomicU64,
    /// Push streams applied
    pub push: AtomicU64,
    /// Streams under an unregistered protocol
    pub unregistered: AtomicU64,
    /// Streams whose handler returned an error
    pub failed: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            identify: self.identify.load(Ordering::Relaxed),
            push: self.push.load(Ordering::Relaxed),
            unregistered: self.unregistered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics to zero.
    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.identify.store(0, Ordering::Relaxed);
        self.push.store(0, Ordering::Relaxed);
        self.unregistered.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of dispatch statistics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub identify: u64,
    pub push: u64,
    pub unregistered: u64,
    pub failed: u64,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Inbound stream router for the identify protocols.
pub struct Dispatcher {
    service: Arc<IdentifyService>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(service: Arc<IdentifyService>) -> Self {
        Self {
            service,
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Protocol identifiers this dispatcher handles, for the owning node to advertise.
    pub fn protocols(&self) -> [&'static str; 2] {
        [IDENTIFY_PROTOCOL, PUSH_PROTOCOL]
    }

    pub fn service(&self) -> &Arc<IdentifyService> {
        &self.service
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Handle one inbound stream opened under `protocol`.
    pub async fn dispatch<S>(&self, protocol: &str, mut stream: S) -> Result<(), IdentifyError>
    where
        S: Substream,
    {
        DispatchStats::inc(&self.stats.received);

        let result = match protocol {
            IDENTIFY_PROTOCOL => {
                DispatchStats::inc(&self.stats.identify);
                self.service.respond(stream).await
            }
            PUSH_PROTOCOL => {
                DispatchStats::inc(&self.stats.push);
                self.service.respond_to_push(stream).await
            }
            other => {
                DispatchStats::inc(&self.stats.unregistered);
                close(&mut stream).await;
                Err(IdentifyError::UnregisteredProtocol(other.to_string()))
            }
        };

        if result.is_err() {
            DispatchStats::inc(&self.stats.failed);
        }
        result
    }

    /// Handle `stream` on its own task; errors are logged, not returned.
    pub fn spawn(self: &Arc<Self>, protocol: String, stream: BoxSubstream) -> JoinHandle<()> {
        tokio::spawn(self.clone().handle(protocol, stream))
    }

    /// Accept streams from `incoming` until the transport drops its sender,
    /// then wait for the streams still in flight.
    pub async fn run(self: Arc<Self>, mut incoming: Incoming) {
        debug!(protocols = ?self.protocols(), "dispatcher started");
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                next = incoming.recv() => match next {
                    Some(InboundStream { protocol, stream }) => {
                        tasks.spawn(self.clone().handle(protocol, stream));
                    }
                    None => break,
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
        while tasks.join_next().await.is_some() {}
        info!(stats = ?self.stats(), "inbound stream queue closed, dispatcher stopped");
    }

    async fn handle(self: Arc<Self>, protocol: String, stream: BoxSubstream) {
        let peer = stream.remote_peer();
        if let Err(e) = self.dispatch(&protocol, stream).await {
            warn!(peer = %peer, protocol = %protocol, error = %e, "inbound stream failed");
        }
    }
}
