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
//! the frame dispatcher (L7): one instance of [`run`] per open channel, reading decoded
//! [`InboundFrame`]s and routing them per SPEC_FULL.md §4.6's table. shared verbatim by the
//! client and server transports - they differ only in how they turn a native `Message` stream
//! into `InboundFrame`s and how they drain `OutboundFrame`s back onto the wire.

use std::sync::Arc;

use futures_util::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wsactor_core::rpc::{ActorSystem, Channel};
use wsactor_core::{CoreError, WireEnvelope};

use crate::channel::{InboundFrame, OutboundFrame, WsChannel, PROTOCOL_ERROR_CLOSE_CODE};

/// drains `frames` until the stream ends or a close/protocol-error frame is seen, dispatching
/// each one through `system`. never blocks on dispatch: a `Call` is handed to
/// [`ActorSystem::dispatch_incoming`] on a freshly spawned task so a slow actor body cannot stall
/// this loop (SPEC_FULL.md §4.6, "the reader's only synchronous work is decoding and scheduling").
///
/// on exit (for any reason) marks `channel` closed and fails the calls it was carrying: all of
/// them if `client_mode` (there is only one channel), or only those addressed to the channel's
/// associated node otherwise.
pub async fn run<S>(mut frames: S, system: Arc<ActorSystem>, channel: Arc<WsChannel>, outbound: mpsc::UnboundedSender<OutboundFrame>, client_mode: bool)
where
    S: Stream<Item = InboundFrame> + Unpin,
{
    while let Some(frame) = frames.next().await {
        match frame {
            InboundFrame::Text(text) => {
                if handle_text(&system, &channel, &outbound, text).await {
                    break;
                }
            }
            InboundFrame::Ping(payload) => {
                let _ = outbound.send(OutboundFrame::Pong(payload));
            }
            InboundFrame::Pong => {}
            InboundFrame::Binary => {}
            InboundFrame::Close(code) => {
                debug!(?code, "peer closed connection");
                let _ = outbound.send(OutboundFrame::Close(code));
                break;
            }
            InboundFrame::Other => {
                warn!("unexpected frame, treating as a protocol error");
                let _ = outbound.send(OutboundFrame::Close(Some(PROTOCOL_ERROR_CLOSE_CODE)));
                break;
            }
        }
    }

    channel.mark_closed();
    if client_mode {
        system.fail_all_pending(CoreError::NoChannelToNode { node_id: channel.peer_node_id().unwrap_or_else(wsactor_core::identity::NodeIdentity::random) });
    } else if let Some(node_id) = channel.peer_node_id() {
        system.fail_pending_for_node(node_id, CoreError::NoChannelToNode { node_id });
    }
}

/// returns `true` if the reader loop should terminate after this frame (an application-level
/// `ConnectionClose` envelope, per SPEC_FULL.md §4.6).
async fn handle_text(system: &Arc<ActorSystem>, channel: &Arc<WsChannel>, outbound: &mpsc::UnboundedSender<OutboundFrame>, text: String) -> bool {
    let envelope = match WireEnvelope::decode(&text) {
        Ok(envelope) => envelope,
        Err(error) => {
            // forward-compatibility escape hatch (SPEC_FULL.md §4.1): an unknown tag or a
            // malformed frame is logged and dropped, not treated as a protocol error.
            warn!(%error, "failed decoding wire envelope, dropping frame");
            return false;
        }
    };

    if matches!(envelope, WireEnvelope::ConnectionClose {}) {
        let _ = outbound.send(OutboundFrame::Close(None));
        return true;
    }

    let system = system.clone();
    let channel: Arc<dyn Channel> = channel.clone();
    tokio::spawn(async move { system.dispatch_incoming(Some(channel), envelope).await });
    false
}
