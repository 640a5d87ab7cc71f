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
//! the wire envelope: a tagged union of `{Call, Reply, ConnectionClose}` carried one-per-frame
//! inside a WebSocket text frame. shape is part of the ABI - see SPEC_FULL.md §6.

use serde::{Deserialize, Serialize};

use crate::identity::{ActorId, CallId};

/// an outbound method invocation addressed to `recipient`. `invocation_target` is an opaque
/// selector string agreed by both ends; `args` are pre-encoded per argument and are not
/// interpreted by this crate (see [`crate::invocation::InvocationDecoder`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCallEnvelope {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    pub recipient: ActorId,
    #[serde(rename = "invocationTarget")]
    pub invocation_target: String,
    #[serde(rename = "genericSubs")]
    pub generic_subs: Vec<String>,
    pub args: Vec<String>,
}

/// the answer to a `RemoteCallEnvelope` with the same `call_id`. `value` is the JSON-encoded
/// return value, or an empty string for a void return or a thrown error (see DESIGN.md for the
/// open question this leaves about distinguishing the two).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(rename = "callID")]
    pub call_id: CallId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sender: Option<ActorId>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireEnvelope {
    Call(RemoteCallEnvelope),
    Reply(ReplyEnvelope),
    ConnectionClose {},
}

impl WireEnvelope {
    pub fn encode(&self) -> String {
        // a WireEnvelope is always representable as JSON text - if this ever fails it is a
        // programming error (a non-serializable value snuck past the type system), not a
        // recoverable runtime condition.
        serde_json::to_string(self).expect("WireEnvelope always serializes")
    }

    /// decode a text frame. unknown tags are the forward-compatibility escape hatch described
    /// in SPEC_FULL.md §4.1: callers should log and drop rather than treat this as fatal.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
