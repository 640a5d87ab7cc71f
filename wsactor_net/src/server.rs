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
//! server-mode connection manager (L5): binds with `axum`, accepts WebSocket upgrades, and
//! keeps a `NodeID -> Channel` map. mirrors the reference server crate's
//! `WsService`/`SpaServer::add_connection` split (an `axum` route that upgrades and hands the
//! socket to a per-connection task), generalized from a single shared websocket broadcasting to
//! browser clients into one channel per connecting node.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock, Weak};

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{CloseFrame, Message as AxMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wsactor_core::identity::NodeIdentity;
use wsactor_core::rpc::{ActorSystem, Channel, Manager};
use wsactor_core::{CoreError, WireEnvelope};

use crate::channel::{InboundFrame, OutboundFrame, WsChannel};
use crate::dispatcher;
use crate::errors::{op_failed, NetError, Result};

/// a node identifies itself to the server at connect time via `?node=<hex NodeIdentity>` on the
/// upgrade request - the handshake detail SPEC_FULL.md leaves unspecified for how a server
/// learns a connecting node's identity (see DESIGN.md). absent, the channel is usable for calls
/// *from* that peer but the server cannot address calls back at it until a reply reveals its id.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    node: Option<String>,
}

/// server-mode [`Manager`]: binds a TCP listener, serves an `axum` WebSocket route, and spawns
/// one [`dispatcher::run`] task per accepted connection.
pub struct ServerManager {
    host: String,
    port: u16,
    channels: DashMap<NodeIdentity, Arc<dyn Channel>>,
    system: OnceLock<Weak<ActorSystem>>,
}

impl ServerManager {
    pub fn new(host: impl Into<String>, port: u16) -> Arc<Self> {
        Arc::new(ServerManager { host: host.into(), port, channels: DashMap::new(), system: OnceLock::new() })
    }

    /// binds the listener and serves until the process is asked to shut down (there is no
    /// built-in timeout - the caller drives this as a background task). must be called at most
    /// once; the owning [`ActorSystem`] is recorded so accepted connections can dispatch into it.
    pub async fn serve(self: &Arc<Self>, system: Arc<ActorSystem>) -> Result<()> {
        self.system.set(Arc::downgrade(&system)).map_err(|_| op_failed("ServerManager::serve called more than once"))?;

        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        info!(host = %self.host, port = self.port, "listening for actor connections");

        let router = Router::new().route("/", get(ws_handler)).with_state(self.clone());
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| NetError::OpFailed(format!("server loop exited: {e}")))
    }

    fn system(&self) -> Option<Arc<ActorSystem>> {
        self.system.get().and_then(Weak::upgrade)
    }

    pub fn node_count(&self) -> usize {
        self.channels.len()
    }

    /// the port this manager was configured to bind. SPEC_FULL.md §4.4's `Manager` interface
    /// lists a generic `localPort()`; only the server side has a stable answer for it (a
    /// client's outbound socket has an ephemeral local port with no operational meaning), so it
    /// is exposed here rather than on the shared `Manager` trait.
    pub fn local_port(&self) -> u16 {
        self.port
    }
}

impl Manager for ServerManager {
    fn channel_for(&self, node_id: &NodeIdentity) -> Option<Arc<dyn Channel>> {
        self.channels.get(node_id).map(|entry| entry.value().clone())
    }

    fn associate(&self, node_id: NodeIdentity, channel: Arc<dyn Channel>) {
        // policy from SPEC_FULL.md §9: most recent association wins, the previous channel (if
        // any, and if it is a different one) is closed and its pending replies failed.
        if let Some(previous) = self.channels.insert(node_id, channel.clone()) {
            if !Arc::ptr_eq(&previous, &channel) {
                if let Some(system) = self.system() {
                    system.fail_pending_for_node(node_id, CoreError::NoChannelToNode { node_id });
                }
                tokio::spawn(async move {
                    let _ = previous.send(WireEnvelope::ConnectionClose {}).await;
                });
            }
        }
    }

    fn cancel(&self) {
        for entry in self.channels.iter() {
            let channel = entry.value().clone();
            tokio::spawn(async move {
                let _ = channel.send(WireEnvelope::ConnectionClose {}).await;
            });
        }
        self.channels.clear();
    }
}

async fn ws_handler(
    State(manager): State<Arc<ServerManager>>,
    Query(params): Query<ConnectParams>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let node_id = params.node.as_deref().and_then(|s| s.parse::<NodeIdentity>().ok());
    ws.on_upgrade(move |socket| handle_socket(manager, socket, remote_addr, node_id)).into_response()
}

async fn handle_socket(manager: Arc<ServerManager>, socket: WebSocket, remote_addr: SocketAddr, node_id: Option<NodeIdentity>) {
    let Some(system) = manager.system() else {
        warn!("accepted a connection after the owning actor system was dropped");
        return;
    };

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let channel: Arc<WsChannel> = Arc::new(WsChannel::new(node_id, outbound_tx.clone()));
    let channel_dyn: Arc<dyn Channel> = channel.clone();

    if let Some(node_id) = node_id {
        manager.associate(node_id, channel_dyn.clone());
        debug!(%remote_addr, %node_id, "accepted connection, node self-identified");
    } else {
        debug!(%remote_addr, "accepted connection from an unidentified node");
    }

    let writer = tokio::spawn(run_writer(ws_sink, outbound_rx));
    let frames = ws_stream.map(to_inbound_frame);
    dispatcher::run(frames, system, channel.clone(), outbound_tx, false).await;

    if let Some(node_id) = channel.peer_node_id() {
        manager.channels.remove_if(&node_id, |_, c| Arc::ptr_eq(c, &channel_dyn));
    }
    writer.abort();
    let _ = writer.await;
    debug!(%remote_addr, "connection closed");
}

fn to_inbound_frame(msg: std::result::Result<AxMessage, axum::Error>) -> InboundFrame {
    match msg {
        Ok(AxMessage::Text(text)) => InboundFrame::Text(text.to_string()),
        Ok(AxMessage::Ping(payload)) => InboundFrame::Ping(payload.to_vec()),
        Ok(AxMessage::Pong(_)) => InboundFrame::Pong,
        Ok(AxMessage::Binary(_)) => InboundFrame::Binary,
        Ok(AxMessage::Close(frame)) => InboundFrame::Close(frame.map(|f| f.code)),
        Err(_) => InboundFrame::Other,
    }
}

async fn run_writer(mut sink: impl Sink<AxMessage, Error = axum::Error> + Unpin, mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>) {
    while let Some(frame) = outbound_rx.recv().await {
        let result = match frame {
            OutboundFrame::Text(text) => sink.send(AxMessage::Text(text.into())).await,
            OutboundFrame::Pong(payload) => sink.send(AxMessage::Pong(payload.into())).await,
            OutboundFrame::Close(code) => {
                let frame = code.map(|code| CloseFrame { code, reason: String::new().into() });
                let _ = sink.send(AxMessage::Close(frame)).await;
                break;
            }
        };
        if result.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
