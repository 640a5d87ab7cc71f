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
//! client-mode connection manager (L5): one logical channel to a server, reconnected with
//! bounded exponential backoff on loss. grounded in `odin_common::ws::ws_loop` (dial, select
//! over inbound frames and outbound sends, break out of the inner loop and retry on any error),
//! generalized with a capped backoff instead of a single fixed `reconnect_delay`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::{CloseFrame as TtCloseFrame, Message as TtMessage};
use tracing::{debug, info, warn};
use wsactor_core::identity::NodeIdentity;
use wsactor_core::rpc::{ActorSystem, Channel, Manager};

use crate::channel::{InboundFrame, OutboundFrame, WsChannel};
use crate::dispatcher;
use crate::errors::{connect_error, failed_to_upgrade, Result};

/// client-mode [`Manager`]: dials `host:port`, reconnects with exponential backoff capped at
/// `backoff_max`, and exposes the single resulting channel via [`Manager::default_channel`]
/// (client mode has no node-keyed routing - every call goes to the one server).
pub struct ClientManager {
    url: String,
    backoff_min: Duration,
    backoff_max: Duration,
    channel: RwLock<Option<Arc<WsChannel>>>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl ClientManager {
    /// `local_node` is included as a `?node=` query parameter on the connect URL so the server
    /// can self-identify this node without waiting for a reply to reveal it (see `server.rs`).
    pub fn new(host: impl AsRef<str>, port: u16, local_node: NodeIdentity, backoff_min: Duration, backoff_max: Duration) -> Arc<Self> {
        let url = format!("ws://{}:{}/?node={}", host.as_ref(), port, local_node);
        Arc::new(ClientManager {
            url,
            backoff_min,
            backoff_max,
            channel: RwLock::new(None),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// connects (retrying with backoff on failure) and runs the dispatcher loop until
    /// [`Manager::cancel`] is called or the process exits. intended to be spawned as a
    /// long-running background task, the client-mode analogue of `ServerManager::serve`.
    pub async fn run(self: &Arc<Self>, system: Arc<ActorSystem>) {
        let mut backoff = self.backoff_min;

        while !self.shutdown.load(Ordering::Acquire) {
            match self.connect_once(system.clone()).await {
                Ok(()) => backoff = self.backoff_min,
                Err(error) => warn!(%error, url = %self.url, "websocket connect failed, backing off"),
            }

            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            info!(delay = ?backoff, "reconnecting");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.backoff_max);
        }
    }

    async fn connect_once(&self, system: Arc<ActorSystem>) -> Result<()> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await.map_err(to_connect_error)?;
        let (ws_sink, ws_stream) = stream.split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(WsChannel::new(None, outbound_tx.clone()));
        *self.channel.write().unwrap() = Some(channel.clone());
        self.notify.notify_waiters();
        debug!(url = %self.url, "connected");

        let writer = tokio::spawn(run_writer(ws_sink, outbound_rx));
        let frames = ws_stream.map(to_inbound_frame);
        dispatcher::run(frames, system, channel.clone(), outbound_tx, true).await;

        *self.channel.write().unwrap() = None;
        writer.abort();
        let _ = writer.await;
        Ok(())
    }

    /// awaits the channel being open, per SPEC_FULL.md §4.4's `selectChannel`. used by
    /// [`ActorSystem::remote_call`] via [`Manager::default_channel`] only when a channel isn't
    /// already available; callers that already have one never pay this suspension.
    pub async fn wait_for_channel(&self) -> Arc<WsChannel> {
        loop {
            if let Some(channel) = self.channel.read().unwrap().clone() {
                return channel;
            }
            self.notify.notified().await;
        }
    }
}

impl Manager for ClientManager {
    fn channel_for(&self, _node_id: &NodeIdentity) -> Option<Arc<dyn Channel>> {
        self.default_channel()
    }

    fn default_channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.read().unwrap().clone().map(|c| c as Arc<dyn Channel>)
    }

    fn cancel(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(channel) = self.channel.read().unwrap().clone() {
            channel.mark_closed();
        }
        self.notify.notify_waiters();
    }
}

/// the peer answered with a non-101 HTTP response (`Error::Http`) means we reached something
/// that isn't speaking WebSocket at that URL - an upgrade failure, not a connectivity failure.
/// everything else (DNS, TCP refused, TLS) is a plain connect error.
fn to_connect_error(error: tokio_tungstenite::tungstenite::Error) -> crate::errors::NetError {
    match error {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            failed_to_upgrade(format!("server responded with HTTP status {}", response.status()))
        }
        other => connect_error(format!("{other}")),
    }
}

fn to_inbound_frame(msg: std::result::Result<TtMessage, tokio_tungstenite::tungstenite::Error>) -> InboundFrame {
    match msg {
        Ok(TtMessage::Text(text)) => InboundFrame::Text(text.to_string()),
        Ok(TtMessage::Ping(payload)) => InboundFrame::Ping(payload.to_vec()),
        Ok(TtMessage::Pong(_)) => InboundFrame::Pong,
        Ok(TtMessage::Binary(_)) => InboundFrame::Binary,
        Ok(TtMessage::Close(frame)) => InboundFrame::Close(frame.map(|f| f.code.into())),
        Ok(_) => InboundFrame::Other,
        Err(error) => {
            debug!(%error, "websocket read error, treating as close");
            InboundFrame::Close(None)
        }
    }
}

async fn run_writer(
    mut sink: impl futures_util::Sink<TtMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let result = match frame {
            OutboundFrame::Text(text) => sink.send(TtMessage::Text(text.into())).await,
            OutboundFrame::Pong(payload) => sink.send(TtMessage::Pong(payload.into())).await,
            OutboundFrame::Close(code) => {
                let frame = code.map(|code| TtCloseFrame { code: code.into(), reason: String::new().into() });
                let _ = sink.send(TtMessage::Close(frame)).await;
                break;
            }
        };
        if result.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
