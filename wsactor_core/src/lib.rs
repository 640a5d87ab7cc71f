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
//! transport-agnostic half of the actor-over-websocket runtime: identity, wire envelopes,
//! call/reply correlation, the local actor registry, and the RPC surface built on top of them.
//!
//! nothing in this crate knows about axum or tokio-tungstenite - that lives in `wsactor_net`,
//! which implements the [`rpc::Manager`]/[`rpc::Channel`] seams this crate defines and drives
//! [`rpc::ActorSystem::dispatch_incoming`] from its frame loop.

pub mod config;
pub mod continuation;
pub mod envelope;
pub mod errors;
pub mod identity;
pub mod invocation;
pub mod pending;
pub mod registry;
pub mod rpc;

pub use envelope::{RemoteCallEnvelope, ReplyEnvelope, WireEnvelope};
pub use errors::{op_failed, CoreError, Result};
pub use identity::{ActorId, CallId, NodeIdentity};
pub use invocation::{encode_value, InvocationDecoder};
pub use registry::{make_actor, make_actor_with_id, with_id_hint, DispatchableActor, ManagedActor, ObjSafeFuture, Registry};
pub use rpc::{ActorSystem, Channel, Manager, ResultHandle};

#[inline]
pub fn millis(n: u64) -> std::time::Duration {
    std::time::Duration::from_millis(n)
}

#[inline]
pub fn secs(n: u64) -> std::time::Duration {
    std::time::Duration::from_secs(n)
}
