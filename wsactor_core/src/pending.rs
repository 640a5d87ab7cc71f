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
//! the pending-reply table (L4): `CallID -> TimedContinuation<bytes>`, plus the `send_message`
//! primitive that allocates a call id, transmits, and awaits the answer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::warn;

use crate::continuation::TimedContinuation;
use crate::errors::{CoreError, Result};
use crate::identity::{CallId, NodeIdentity};

type Slot = Arc<TimedContinuation<Vec<u8>>>;

/// an installed slot, tagged with the node the call was addressed to (when known) so a channel
/// closure can fail just the calls bound to it (SPEC_FULL.md §4.4's per-node scoping) without
/// disturbing calls in flight to other nodes.
struct Entry {
    node_id: Option<NodeIdentity>,
    slot: Slot,
}

/// removes `call_id` from `table` when dropped, regardless of whether the owning future ran to
/// completion, returned early via `?`, or was cancelled mid-await. this is what makes
/// `send_message` satisfy "a CallID allocated is removed before `sendMessage` returns" even when
/// the caller's task is cancelled while awaiting the reply.
struct RemoveOnDrop<'a> {
    table: &'a DashMap<CallId, Entry>,
    call_id: CallId,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        self.table.remove(&self.call_id);
    }
}

pub struct PendingReplies {
    slots: DashMap<CallId, Entry>,
    default_timeout: Duration,
}

impl PendingReplies {
    pub fn new(default_timeout: Duration) -> Self {
        PendingReplies { slots: DashMap::new(), default_timeout }
    }

    /// allocates a fresh [`CallId`], installs a timed slot tagged with `node_id` (the target
    /// node, when the caller knows one - used only to scope [`PendingReplies::fail_for_node`]),
    /// invokes `send(call_id)` to transmit the call, then awaits the reply. the slot is always
    /// removed before returning, whether the reply arrived, the timer fired, `send` failed, or
    /// the awaiting task was cancelled.
    pub async fn send_message<F, Fut>(&self, node_id: Option<NodeIdentity>, send: F) -> Result<Vec<u8>>
    where
        F: FnOnce(CallId) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let call_id = CallId::random();
        let (cont, rx) = TimedContinuation::create(self.default_timeout, CoreError::Timeout(call_id));
        self.slots.insert(call_id, Entry { node_id, slot: cont });
        let _guard = RemoveOnDrop { table: &self.slots, call_id };

        send(call_id).await?;

        rx.await.map_err(|_| CoreError::SendersDropped(call_id))?
    }

    /// resumes the slot for `call_id` with the reply bytes. a reply for an unknown call id
    /// (already timed out, already answered, or never issued) is logged and dropped - it is
    /// never treated as a protocol error.
    pub fn received_reply(&self, call_id: CallId, bytes: Vec<u8>) {
        match self.slots.get(&call_id) {
            Some(entry) => entry.slot.resume_returning(bytes),
            None => {
                let error = CoreError::MissingReplyContinuation { call_id };
                warn!(%error, "dropping reply");
            }
        }
    }

    /// resumes every outstanding slot with `error` and empties the table. used when the only (or
    /// the last) channel a batch of calls was issued on terminates - e.g. client mode, where
    /// there is exactly one channel so there is nothing to scope to.
    pub fn fail_all(&self, error: CoreError) {
        for entry in self.slots.iter() {
            entry.value().slot.resume_throwing(error.clone());
        }
        self.slots.clear();
    }

    /// resumes and removes only the slots tagged with `node_id`, leaving calls addressed to
    /// other nodes untouched. used in server mode when one of several channels closes.
    pub fn fail_for_node(&self, node_id: NodeIdentity, error: CoreError) {
        let matching: Vec<CallId> = self.slots.iter().filter(|e| e.value().node_id == Some(node_id)).map(|e| *e.key()).collect();
        for call_id in matching {
            if let Some((_, entry)) = self.slots.remove(&call_id) {
                entry.slot.resume_throwing(error.clone());
            }
        }
    }

    pub fn outstanding_count(&self) -> usize {
        self.slots.len()
    }
}
