//! The control-message protocol.
//!
//! Controlled pages (and the worker itself) drive cache maintenance
//! through small tagged JSON messages. Every message gets a reply: on the
//! provided reply channel when there is one, else directly to the
//! originating client, else broadcast to all registered clients. Each
//! delivery step is defensive; its failure is swallowed and the next step
//! tried.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::worker::Worker;
use sideout_core::PartitionStats;

/// Identifier of a registered client (an open app instance).
pub type ClientId = u64;

/// Control requests, discriminated by the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    /// Delete all cache partitions.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
    /// Delete icon/favicon/manifest entries across all partitions.
    #[serde(rename = "CLEAR_ICON_CACHE")]
    ClearIconCache,
    /// Report per-partition entry counts and URL lists.
    #[serde(rename = "GET_CACHE_STATS")]
    GetCacheStats,
    /// Force immediate activation.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Claim uncontrolled clients and acknowledge the requester.
    #[serde(rename = "REQUEST_CLAIM")]
    RequestClaim,
    /// Clear the auxiliary diagnostic store.
    #[serde(rename = "CLEAR_SW_DEBUG_DB")]
    ClearDebugDb,
}

/// Reply to a control request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Vec<PartitionStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlReply {
    pub fn success() -> Self {
        Self { ok: true, deleted: None, stats: None, claimed: None, error: None }
    }

    pub fn with_deleted(deleted: u64) -> Self {
        Self { deleted: Some(deleted), ..Self::success() }
    }

    pub fn with_stats(stats: Vec<PartitionStats>) -> Self {
        Self { stats: Some(stats), ..Self::success() }
    }

    pub fn with_claimed(claimed: usize) -> Self {
        Self { claimed: Some(claimed), ..Self::success() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, deleted: None, stats: None, claimed: None, error: Some(message.into()) }
    }
}

/// Notices pushed to registered clients outside the reply channel.
#[derive(Debug, Clone)]
pub enum ClientNotice {
    /// This worker instance now controls the client.
    ControllerChange,
    /// A control reply routed to the client directly or by broadcast.
    Reply(ControlReply),
}

struct ClientHandle {
    sender: mpsc::UnboundedSender<ClientNotice>,
    controlled: bool,
}

/// Registry of open app instances reachable by the worker.
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<HashMap<ClientId, ClientHandle>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Register a client; the receiver carries its notices.
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<ClientNotice>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, ClientHandle { sender, controlled: false });
        (id, receiver)
    }

    /// Remove a client (its page closed).
    pub fn unregister(&self, id: ClientId) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }

    /// Mark every client controlled and notify it; returns how many were
    /// claimed. Send failures are swallowed.
    pub fn claim_all(&self) -> usize {
        let mut clients = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut claimed = 0;
        for handle in clients.values_mut() {
            handle.controlled = true;
            claimed += 1;
            if handle.sender.send(ClientNotice::ControllerChange).is_err() {
                debug!("client receiver gone during claim");
            }
        }
        claimed
    }

    /// Send a notice to one client. Returns false if it is unknown or its
    /// receiver is gone.
    pub fn send_to(&self, id: ClientId, notice: ClientNotice) -> bool {
        let clients = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match clients.get(&id) {
            Some(handle) => handle.sender.send(notice).is_ok(),
            None => false,
        }
    }

    /// Send a notice to every client, swallowing per-client failures.
    /// Returns how many sends succeeded.
    pub fn broadcast(&self, notice: ClientNotice) -> usize {
        let clients = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        clients.values().filter(|h| h.sender.send(notice.clone()).is_ok()).count()
    }

    /// Number of clients currently marked controlled.
    pub fn controlled_count(&self) -> usize {
        let clients = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        clients.values().filter(|h| h.controlled).count()
    }
}

impl Worker {
    /// Handle one control message and deliver its reply.
    ///
    /// A handler failure is caught and turned into a failure reply; no
    /// message is left unanswered.
    pub async fn handle_message(
        &self, request: ControlRequest, origin: Option<ClientId>, channel: Option<oneshot::Sender<ControlReply>>,
    ) {
        let reply = match self.dispatch(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(?request, error = %e, "control message handler failed");
                ControlReply::failure(e.to_string())
            }
        };
        self.deliver_reply(reply, origin, channel);
    }

    async fn dispatch(&self, request: ControlRequest) -> Result<ControlReply, sideout_core::Error> {
        match request {
            ControlRequest::ClearCache => Ok(ControlReply::with_deleted(self.store.clear_all().await?)),
            ControlRequest::ClearIconCache => Ok(ControlReply::with_deleted(self.store.clear_icon_entries().await?)),
            ControlRequest::GetCacheStats => Ok(ControlReply::with_stats(self.store.stats().await?)),
            ControlRequest::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(ControlReply::success())
            }
            ControlRequest::RequestClaim => Ok(ControlReply::with_claimed(self.clients.claim_all())),
            ControlRequest::ClearDebugDb => Ok(ControlReply::with_deleted(self.store.clear_debug_store().await?)),
        }
    }

    /// Three-step defensive reply routing: reply channel, then the
    /// originating client, then broadcast. Failures at each step are
    /// swallowed and the next step tried.
    fn deliver_reply(&self, reply: ControlReply, origin: Option<ClientId>, channel: Option<oneshot::Sender<ControlReply>>) {
        let reply = match channel {
            Some(tx) => match tx.send(reply) {
                Ok(()) => return,
                Err(reply) => {
                    debug!("reply channel closed, falling back to direct client");
                    reply
                }
            },
            None => reply,
        };

        if let Some(id) = origin {
            if self.clients.send_to(id, ClientNotice::Reply(reply.clone())) {
                return;
            }
            debug!(client = id, "originating client unreachable, broadcasting reply");
        }

        self.clients.broadcast(ClientNotice::Reply(reply));
    }
}
