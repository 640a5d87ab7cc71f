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
use thiserror::Error;

use crate::identity::{ActorId, CallId, NodeIdentity};

pub type Result<T> = std::result::Result<T, CoreError>;

/// error taxonomy for the actor-system runtime: registry resolution, call correlation,
/// and envelope (de)serialization. transport/handshake errors live in `wsactor_net::NetError`.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("resolve of {id} found an actor of type {found} but expected {expected}")]
    ResolveFailedToMatchActorType { id: ActorId, found: &'static str, expected: &'static str },

    #[error("on-demand resolve of {id} returned a wrongly-typed actor")]
    ResolveFailed { id: ActorId },

    #[error("call target {id} has no nodeID")]
    MissingNodeID { id: ActorId },

    #[error("no channel to node {node_id}")]
    NoChannelToNode { node_id: NodeIdentity },

    #[error("no peers are currently connected")]
    NoPeers,

    #[error("decoder ran out of arguments, expected at least {expected}")]
    NotEnoughArgumentsInEnvelope { expected: usize },

    #[error("failed decoding response: {inner}")]
    FailedDecodingResponse { inner: String },

    #[error("failed decoding value: {inner}")]
    DecodingError { inner: String },

    #[error("reply arrived for unknown or already-resolved call {call_id}")]
    MissingReplyContinuation { call_id: CallId },

    #[error("call {0} timed out")]
    Timeout(CallId),

    #[error("senders dropped before call {0} completed")]
    SendersDropped(CallId),

    #[error("operation failed: {0}")]
    OpFailed(String),
}

pub fn op_failed(msg: impl ToString) -> CoreError {
    CoreError::OpFailed(msg.to_string())
}
