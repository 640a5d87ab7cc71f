/*
 * Copyright (c) 2024, United States Government, as represented by the
 * Administrator of the National Aeronautics and Space Administration.
 * All rights reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License"); you may
 * not use this file except in compliance with the License. You may obtain
 * a copy of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */
//! the transport-agnostic half of a connection: [`WsChannel`] implements
//! `wsactor_core::rpc::Channel` by pushing frames onto an outbound queue a writer task (owned by
//! `client`/`server`, which differ in the concrete sink type) drains. this is the one struct both
//! sides share; everything that actually touches an `axum` or `tokio-tungstenite` socket lives in
//! `client.rs`/`server.rs`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;
use wsactor_core::identity::NodeIdentity;
use wsactor_core::{CoreError, Result, WireEnvelope};

/// a frame queued for the writer task, already translated out of [`WireEnvelope`]. kept separate
/// from `WireEnvelope` because ping/pong/close are protocol-level, not envelope-level.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Text(String),
    Pong(Vec<u8>),
    /// close with an optional WebSocket close code; `None` echoes an empty close frame.
    Close(Option<u16>),
}

/// frames the dispatcher (L7) reacts to, already stripped of whichever concrete `Message` enum
/// (`axum::extract::ws::Message` or `tungstenite::protocol::Message`) produced them.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Text(String),
    Ping(Vec<u8>),
    Pong,
    Binary,
    Close(Option<u16>),
    /// an opcode this protocol has no use for, or a transport-level read error - both are
    /// "protocol error, close the channel" per SPEC_FULL.md §4.6's dispatch table.
    Other,
}

/// close code used when this side terminates a channel because of a protocol violation
/// (SPEC_FULL.md §6, "On protocol error, close with code `protocolError`").
pub const PROTOCOL_ERROR_CLOSE_CODE: u16 = 1002;

/// one connection, from the RPC layer's point of view. cheap to clone (it is always held behind
/// an `Arc`); `send` never touches the socket directly, it only queues onto `outbound` for the
/// writer task to pick up, so multiple callers can hold a reference and send concurrently without
/// their own locking.
pub struct WsChannel {
    peer_node: RwLock<Option<NodeIdentity>>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    closed: AtomicBool,
}

impl WsChannel {
    pub fn new(peer_node: Option<NodeIdentity>, outbound: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        WsChannel { peer_node: RwLock::new(peer_node), outbound, closed: AtomicBool::new(false) }
    }

    /// records the peer's node id once it becomes known - either from a client handshake
    /// (known upfront) or from the `sender` on the first reply/call a server-side channel sees.
    pub fn set_peer_node_id(&self, node_id: NodeIdentity) {
        *self.peer_node.write().unwrap() = Some(node_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl wsactor_core::rpc::Channel for WsChannel {
    async fn send(&self, envelope: WireEnvelope) -> Result<()> {
        if self.is_closed() {
            let node_id = self.peer_node_id().unwrap_or_else(NodeIdentity::random);
            return Err(CoreError::NoChannelToNode { node_id });
        }

        let frame = match envelope {
            WireEnvelope::ConnectionClose {} => OutboundFrame::Close(Some(PROTOCOL_ERROR_CLOSE_CODE)),
            other => OutboundFrame::Text(other.encode()),
        };

        self.outbound.send(frame).map_err(|_| CoreError::NoChannelToNode {
            node_id: self.peer_node_id().unwrap_or_else(NodeIdentity::random),
        })
    }

    fn peer_node_id(&self) -> Option<NodeIdentity> {
        *self.peer_node.read().unwrap()
    }

    fn set_peer_node_id(&self, node_id: NodeIdentity) {
        WsChannel::set_peer_node_id(self, node_id);
    }
}
