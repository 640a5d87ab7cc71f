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
//! ties the registry (L6), the pending-reply table (L4) and a transport-supplied [`Manager`]
//! (L5) together into the one RPC surface application code calls: [`ActorSystem::remote_call`],
//! [`ActorSystem::remote_call_void`], and the `dispatch_incoming` entry point the frame
//! dispatcher (L7, in `wsactor_net`) feeds decoded envelopes into.
//!
//! `Manager`/`Channel` are defined here, transport-agnostic, so this crate never depends on
//! axum or tokio-tungstenite; `wsactor_net` provides the concrete implementations.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::envelope::{RemoteCallEnvelope, ReplyEnvelope, WireEnvelope};
use crate::errors::{CoreError, Result};
use crate::identity::{ActorId, CallId, NodeIdentity};
use crate::invocation::InvocationDecoder;
use crate::pending::PendingReplies;
use crate::registry::Registry;

/// one outbound connection, from the RPC layer's point of view: something a [`WireEnvelope`] can
/// be serialized onto. implemented by `wsactor_net`'s client and server connection types.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, envelope: WireEnvelope) -> Result<()>;

    /// the node at the far end of this channel, when known. servers learn this only after the
    /// peer's first call arrives with a `sender`; clients know it from the handshake.
    fn peer_node_id(&self) -> Option<NodeIdentity>;

    /// records the peer's node id once it becomes known after the channel was already created -
    /// e.g. a server-side channel that self-identifies via a reply's `sender` rather than at
    /// connect time. default no-op for implementations (tests, mostly) whose peer is always
    /// known upfront or never needs recording.
    fn set_peer_node_id(&self, node_id: NodeIdentity) {
        let _ = node_id;
    }
}

/// how an [`ActorSystem`] finds the channel to use for a given recipient. client mode has one
/// channel regardless of what node id is asked for; server mode keyes by node id.
pub trait Manager: Send + Sync {
    fn channel_for(&self, node_id: &NodeIdentity) -> Option<Arc<dyn Channel>>;

    /// client-mode convenience: the single channel to reach the server, regardless of
    /// `node_id`. server-mode managers should return `None` here and rely on `channel_for`.
    fn default_channel(&self) -> Option<Arc<dyn Channel>> {
        None
    }

    /// records that `channel` belongs to `node_id`. a server manager learns this the first time
    /// a reply naming that node as `sender` arrives on the channel (a call's recipient always
    /// names a *local* actor, so it cannot carry the remote node's identity - the reply's sender
    /// is the first point in the protocol that does). client managers can ignore this.
    fn associate(&self, node_id: NodeIdentity, channel: Arc<dyn Channel>) {
        let _ = (node_id, channel);
    }

    /// shuts down every channel this manager owns. part of [`ActorSystem::shutdown_gracefully`];
    /// a manager with nothing to tear down (e.g. a test double) can rely on the default no-op.
    fn cancel(&self) {}
}

/// sink a [`crate::registry::DispatchableActor::dispatch`] implementation uses to answer a call.
/// exactly one of `succeed`/`fail` should be called; calling neither leaves the caller waiting
/// until its timeout fires, which is a bug in the actor, not in this type.
pub struct ResultHandle {
    call_id: CallId,
    reply_to: Option<Arc<dyn Channel>>,
    local_node: NodeIdentity,
    sender: ActorId,
}

impl ResultHandle {
    fn new(call_id: CallId, reply_to: Option<Arc<dyn Channel>>, local_node: NodeIdentity, sender: ActorId) -> Self {
        ResultHandle { call_id, reply_to, local_node, sender }
    }

    pub async fn succeed<T: serde::Serialize>(self, value: &T) {
        self.reply(crate::invocation::encode_value(value).unwrap_or_default()).await
    }

    pub async fn succeed_void(self) {
        self.reply(String::new()).await
    }

    /// errors thrown by actor bodies currently collapse to the same empty-value reply as a void
    /// return (see SPEC_FULL.md §9's open question on this); logged here so the distinction is
    /// at least visible operator-side.
    pub async fn fail(self, error: &CoreError) {
        warn!(call_id = %self.call_id, %error, "actor call failed, replying with empty value");
        self.reply(String::new()).await
    }

    async fn reply(self, value: String) {
        let Some(channel) = self.reply_to else {
            warn!(call_id = %self.call_id, "no channel to reply on, dropping reply");
            return;
        };
        let envelope = WireEnvelope::Reply(ReplyEnvelope { call_id: self.call_id, sender: Some(self.sender.clone()), value });
        let _ = channel.send(envelope).await.map_err(|e| {
            warn!(call_id = %self.call_id, node = %self.local_node, error = %e, "failed sending reply");
        });
    }
}

pub struct ActorSystem {
    pub local_node: NodeIdentity,
    pub registry: Registry,
    pending: PendingReplies,
    manager: Arc<dyn Manager>,
}

impl ActorSystem {
    pub fn new(local_node: NodeIdentity, manager: Arc<dyn Manager>, default_timeout: Duration) -> Self {
        ActorSystem { local_node, registry: Registry::new(), pending: PendingReplies::new(default_timeout), manager }
    }

    fn channel_for(&self, node_id: &NodeIdentity) -> Result<Arc<dyn Channel>> {
        self.manager
            .channel_for(node_id)
            .or_else(|| self.manager.default_channel())
            .ok_or(CoreError::NoChannelToNode { node_id: *node_id })
    }

    /// invoke `target` on `recipient` and await its reply, decoding it as `R`.
    pub async fn remote_call<R: serde::de::DeserializeOwned>(
        &self,
        recipient: ActorId,
        target: impl Into<String>,
        generic_subs: Vec<String>,
        args: Vec<String>,
    ) -> Result<R> {
        let node_id = recipient.node_id.ok_or_else(|| CoreError::MissingNodeID { id: recipient.clone() })?;
        let channel = self.channel_for(&node_id)?;
        let target = target.into();

        let bytes = self
            .pending
            .send_message(Some(node_id), |call_id| async move {
                let envelope = WireEnvelope::Call(RemoteCallEnvelope {
                    call_id,
                    recipient,
                    invocation_target: target,
                    generic_subs,
                    args,
                });
                channel.send(envelope).await
            })
            .await?;

        serde_json::from_slice(&bytes).map_err(|e| CoreError::FailedDecodingResponse { inner: e.to_string() })
    }

    /// invoke `target` on `recipient` without waiting for (or expecting) a reply.
    pub async fn remote_call_void(&self, recipient: ActorId, target: impl Into<String>, generic_subs: Vec<String>, args: Vec<String>) -> Result<()> {
        let node_id = recipient.node_id.ok_or_else(|| CoreError::MissingNodeID { id: recipient.clone() })?;
        let channel = self.channel_for(&node_id)?;
        let envelope = WireEnvelope::Call(RemoteCallEnvelope { call_id: CallId::random(), recipient, invocation_target: target.into(), generic_subs, args });
        channel.send(envelope).await
    }

    /// routes one decoded envelope that arrived on `from`. `from` is `None` only in tests; the
    /// frame dispatcher always has a concrete channel to pass, even in server mode where the
    /// node id behind it may not yet be known for an unauthenticated first frame.
    ///
    /// `WireEnvelope::ConnectionClose` is never passed here in production: `wsactor_net`'s
    /// dispatcher loop intercepts it to end the reader loop directly, and failing the pending
    /// calls scoped to that node happens in the loop's post-exit cleanup, not here. This match
    /// is exhaustive over the two variants that actually reach it.
    pub async fn dispatch_incoming(&self, from: Option<Arc<dyn Channel>>, envelope: WireEnvelope) {
        match envelope {
            WireEnvelope::Reply(reply) => {
                debug!(call_id = %reply.call_id, "reply received");
                if let (Some(sender), Some(channel)) = (&reply.sender, &from) {
                    if let Some(node_id) = sender.node_id {
                        // both halves matter: `associate` lets the manager route future calls
                        // to this node over this channel; `set_peer_node_id` lets the channel
                        // itself (and therefore the dispatcher's post-loop cleanup) know which
                        // node to scope a close/failure to. a channel that self-identifies only
                        // via a reply - never via a connect-time handshake - would otherwise
                        // never learn its own peer id at all.
                        channel.set_peer_node_id(node_id);
                        self.manager.associate(node_id, channel.clone());
                    }
                }
                self.pending.received_reply(reply.call_id, reply.value.into_bytes());
            }
            WireEnvelope::Call(call) => self.dispatch_call(from, call).await,
            WireEnvelope::ConnectionClose {} => {
                debug!("connection-close envelope reached dispatch_incoming directly (not via the net dispatcher loop); nothing to do here");
            }
        }
    }

    async fn dispatch_call(&self, from: Option<Arc<dyn Channel>>, call: RemoteCallEnvelope) {
        let call_id = call.call_id;

        let managed = match self.registry.resolve_any(&call.recipient) {
            Some(actor) => actor,
            None => {
                warn!(recipient = %call.recipient, "call for unresolvable actor, dropping");
                return;
            }
        };

        let result = ResultHandle::new(call_id, from, self.local_node, managed.id.clone());
        let mut decoder = InvocationDecoder::new(&call.args);
        managed.dispatchable().dispatch(&call.invocation_target, &mut decoder, result).await;
    }

    /// fails every outstanding call on this system with `error` - used in client mode, where
    /// there is exactly one channel and losing it strands every in-flight call regardless of
    /// which node they were addressed to.
    pub fn fail_all_pending(&self, error: CoreError) {
        self.pending.fail_all(error);
    }

    /// fails only the outstanding calls addressed to `node_id`, leaving calls bound to other
    /// still-open channels untouched. used in server mode, where one of several channels can
    /// close independently of the others (SPEC_FULL.md §4.4).
    pub fn fail_pending_for_node(&self, node_id: NodeIdentity, error: CoreError) {
        self.pending.fail_for_node(node_id, error);
    }

    pub fn outstanding_call_count(&self) -> usize {
        self.pending.outstanding_count()
    }

    /// cancels the manager (closing every channel it owns) and fails every outstanding call.
    /// per SPEC_FULL.md §2a, callers should await every dispatcher task observing the resulting
    /// channel closures before considering shutdown complete; this method only triggers that
    /// teardown; it does not itself join the dispatcher tasks, since `wsactor_net` owns them.
    pub fn shutdown_gracefully(&self) {
        self.manager.cancel();
        self.pending.fail_all(CoreError::NoChannelToNode { node_id: self.local_node });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{make_actor, DispatchableActor, ObjSafeFuture};
    use std::sync::Mutex;

    struct RecordingChannel {
        sent: Mutex<Vec<WireEnvelope>>,
        peer: Option<NodeIdentity>,
    }

    #[async_trait::async_trait]
    impl Channel for RecordingChannel {
        async fn send(&self, envelope: WireEnvelope) -> Result<()> {
            self.sent.lock().unwrap().push(envelope);
            Ok(())
        }
        fn peer_node_id(&self) -> Option<NodeIdentity> {
            self.peer
        }
    }

    struct SingleChannelManager(Arc<RecordingChannel>);
    impl Manager for SingleChannelManager {
        fn channel_for(&self, _node_id: &NodeIdentity) -> Option<Arc<dyn Channel>> {
            Some(self.0.clone())
        }
    }

    struct NoPeersManager;
    impl Manager for NoPeersManager {
        fn channel_for(&self, _node_id: &NodeIdentity) -> Option<Arc<dyn Channel>> {
            None
        }
    }

    struct Echo;
    impl DispatchableActor for Echo {
        fn type_name(&self) -> &'static str {
            "Echo"
        }
        fn dispatch<'a>(&'a self, target: &'a str, decoder: &'a mut InvocationDecoder, result: ResultHandle) -> ObjSafeFuture<'a, ()> {
            Box::pin(async move {
                if target == "echo" {
                    let s: String = decoder.next().unwrap();
                    result.succeed(&s).await;
                } else {
                    result.succeed_void().await;
                }
            })
        }
    }

    #[tokio::test]
    async fn remote_call_with_no_channel_fails_with_no_channel_to_node() {
        let system = ActorSystem::new(NodeIdentity::random(), Arc::new(NoPeersManager), Duration::from_millis(50));
        let target = ActorId::new(Some(NodeIdentity::random()), "a1");
        let result: Result<String> = system.remote_call(target, "echo", vec![], vec!["\"hi\"".into()]).await;
        assert!(matches!(result, Err(CoreError::NoChannelToNode { .. })));
    }

    #[tokio::test]
    async fn remote_call_without_node_id_fails_fast() {
        let system = ActorSystem::new(NodeIdentity::random(), Arc::new(NoPeersManager), Duration::from_millis(50));
        let target = ActorId::new(None, "a1");
        let result: Result<String> = system.remote_call(target, "echo", vec![], vec![]).await;
        assert!(matches!(result, Err(CoreError::MissingNodeID { .. })));
    }

    #[tokio::test]
    async fn dispatch_incoming_call_resolves_and_replies() {
        let local = NodeIdentity::random();
        let channel = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()), peer: Some(local) });
        let manager = Arc::new(SingleChannelManager(channel.clone()));
        let system = ActorSystem::new(local, manager, Duration::from_secs(5));

        let id = make_actor(&system.registry, &local, |_id| Arc::new(Echo));

        let call = WireEnvelope::Call(RemoteCallEnvelope {
            call_id: CallId::random(),
            recipient: id,
            invocation_target: "echo".into(),
            generic_subs: vec![],
            args: vec!["\"hi\"".into()],
        });
        system.dispatch_incoming(Some(channel.clone()), call).await;

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            WireEnvelope::Reply(r) => assert_eq!(r.value, "\"hi\""),
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_incoming_reply_resolves_a_pending_call() {
        let local = NodeIdentity::random();
        let channel = Arc::new(RecordingChannel { sent: Mutex::new(Vec::new()), peer: None });
        let manager = Arc::new(SingleChannelManager(channel.clone()));
        let system = Arc::new(ActorSystem::new(local, manager, Duration::from_secs(5)));

        let system2 = system.clone();
        let target = ActorId::new(Some(NodeIdentity::random()), "remote-actor");
        let call = tokio::spawn(async move { system2.remote_call::<String>(target, "echo", vec![], vec!["\"hi\"".into()]).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(system.outstanding_call_count(), 1);

        let sent_call_id = match &channel.sent.lock().unwrap()[0] {
            WireEnvelope::Call(c) => c.call_id,
            other => panic!("expected a call to have been sent, got {other:?}"),
        };

        system.dispatch_incoming(None, WireEnvelope::Reply(ReplyEnvelope { call_id: sent_call_id, sender: None, value: "\"hi\"".into() })).await;

        assert_eq!(call.await.unwrap().unwrap(), "hi");
    }
}
