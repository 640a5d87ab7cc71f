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
//! the local actor registry (L6): ID assignment, direct + on-demand resolution, and the
//! dispatch capability the frame dispatcher (L7, in `wsactor_net`) uses to route an incoming
//! `Call` to the actor it names.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::{CoreError, Result};
use crate::identity::{ActorId, NodeIdentity};
use crate::invocation::InvocationDecoder;
use crate::rpc::ResultHandle;

/// object-safe future alias, used wherever a trait method needs to return an async result
/// without making the trait itself generic over a concrete future type.
pub type ObjSafeFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// the "opaque handle with a dispatch capability" from SPEC_FULL.md §3: anything stored in the
/// registry must be able to execute a named method given pre-decoded arguments and a result
/// sink. implementors are expected to match on `target` and call through to their own method.
pub trait DispatchableActor: Send + Sync {
    /// a short, stable name for this actor's capability, used only in diagnostics and in the
    /// `ResolveFailedToMatchActorType` error message.
    fn type_name(&self) -> &'static str;

    fn dispatch<'a>(&'a self, target: &'a str, decoder: &'a mut InvocationDecoder, result: ResultHandle) -> ObjSafeFuture<'a, ()>;
}

/// a stored registry entry. keeps both an `Any` view (for typed [`Registry::resolve`]) and a
/// `DispatchableActor` view (for [`Registry::resolve_any`], used by the dispatcher) of the same
/// underlying actor, so the registry does not need to know concrete actor types.
#[derive(Clone)]
pub struct ManagedActor {
    pub id: ActorId,
    any: Arc<dyn Any + Send + Sync>,
    dispatchable: Arc<dyn DispatchableActor>,
}

impl ManagedActor {
    pub fn new<T>(id: ActorId, actor: Arc<T>) -> Self
    where
        T: DispatchableActor + Send + Sync + 'static,
    {
        ManagedActor { id, any: actor.clone(), dispatchable: actor }
    }

    pub fn dispatchable(&self) -> &Arc<dyn DispatchableActor> {
        &self.dispatchable
    }

    pub fn type_name(&self) -> &'static str {
        self.dispatchable.type_name()
    }

    fn downcast<T: 'static>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}

/// user-supplied callback that materializes an actor lazily the first time its id is
/// referenced. invoked with no registry lock held (see the reentrancy note below).
pub type OnDemandResolve = Arc<dyn Fn(&ActorId) -> Option<ManagedActor> + Send + Sync>;

tokio::task_local! {
    static ID_HINT: RefCell<Option<String>>;
}

/// runs `f` with `hint` installed as the task-scoped id hint `Registry::assign_id` will pick up.
/// the hint is visible only for the synchronous extent of `f` and is cleared on return, matching
/// the "dynamic-scope binding" semantics SPEC_FULL.md §9 calls for; `tokio::task_local!`'s
/// `sync_scope` is the idiomatic Rust equivalent of a thread/task-local dynamic binding.
pub fn with_id_hint<R>(hint: impl Into<String>, f: impl FnOnce() -> R) -> R {
    ID_HINT.sync_scope(RefCell::new(Some(hint.into())), f)
}

fn take_id_hint() -> Option<String> {
    ID_HINT.try_with(|cell| cell.borrow_mut().take()).unwrap_or(None)
}

pub struct Registry {
    actors: DashMap<ActorId, ManagedActor>,
    on_demand: std::sync::RwLock<Option<OnDemandResolve>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { actors: DashMap::new(), on_demand: std::sync::RwLock::new(None) }
    }

    pub fn set_on_demand_resolve(&self, handler: OnDemandResolve) {
        *self.on_demand.write().unwrap() = Some(handler);
    }

    /// returns the task-scoped id hint if one is set and it is not already taken, otherwise a
    /// fresh random id. panics (a deliberate, documented programming-error termination, not a
    /// recoverable `Result`) if the hint collides with an id already present in the registry.
    pub fn assign_id(&self, node_id: &NodeIdentity) -> ActorId {
        if let Some(hint) = take_id_hint() {
            let id = ActorId::new(Some(*node_id), hint);
            assert!(
                !self.actors.contains_key(&id),
                "id hint collision: {id} is already registered - this is a programming error"
            );
            id
        } else {
            ActorId::new(Some(*node_id), format!("{:016x}", rand::random::<u64>()))
        }
    }

    pub fn actor_ready(&self, actor: ManagedActor) {
        self.actors.insert(actor.id.clone(), actor);
    }

    pub fn resign_id(&self, id: &ActorId) {
        self.actors.remove(id);
    }

    /// resolve `id` to a concrete actor of type `T`. looks the entry up under the registry's
    /// internal lock, then - per SPEC_FULL.md §9's preferred reentrancy strategy - releases that
    /// lock *before* invoking the on-demand handler, so a handler that calls back into
    /// `resolve`/`actor_ready` for a related id cannot deadlock against this call.
    pub fn resolve<T>(&self, id: &ActorId) -> Result<Option<Arc<T>>>
    where
        T: DispatchableActor + Send + Sync + 'static,
    {
        if let Some(entry) = self.actors.get(id).map(|r| r.value().clone()) {
            return entry.downcast::<T>().map(Some).ok_or_else(|| CoreError::ResolveFailedToMatchActorType {
                id: id.clone(),
                found: entry.type_name(),
                expected: type_name::<T>(),
            });
        }

        let handler = self.on_demand.read().unwrap().clone();
        if let Some(handler) = handler {
            if let Some(entry) = handler(id) {
                return entry
                    .downcast::<T>()
                    .map(Some)
                    .ok_or_else(|| CoreError::ResolveFailed { id: id.clone() });
            }
        }

        Ok(None)
    }

    /// untyped resolution used by the frame dispatcher to find a `Call`'s recipient without
    /// knowing its concrete type.
    pub fn resolve_any(&self, id: &ActorId) -> Option<ManagedActor> {
        if let Some(entry) = self.actors.get(id).map(|r| r.value().clone()) {
            return Some(entry);
        }
        let handler = self.on_demand.read().unwrap().clone();
        handler.and_then(|handler| handler(id))
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.actors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// constructs a fresh actor via `factory`, assigns it an id (honoring an enclosing
/// [`with_id_hint`] scope if present) and registers it. equivalent to the source's
/// `makeActor(factory)`.
pub fn make_actor<T>(registry: &Registry, node_id: &NodeIdentity, factory: impl FnOnce(ActorId) -> Arc<T>) -> ActorId
where
    T: DispatchableActor + Send + Sync + 'static,
{
    let id = registry.assign_id(node_id);
    let actor = factory(id.clone());
    registry.actor_ready(ManagedActor::new(id.clone(), actor));
    id
}

/// as [`make_actor`], but forces `id_hint` as the actor's id rather than generating a random
/// one. equivalent to the source's `makeActor(id:, factory)`.
pub fn make_actor_with_id<T>(
    registry: &Registry,
    node_id: &NodeIdentity,
    id_hint: impl Into<String>,
    factory: impl FnOnce(ActorId) -> Arc<T>,
) -> ActorId
where
    T: DispatchableActor + Send + Sync + 'static,
{
    with_id_hint(id_hint, || make_actor(registry, node_id, factory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ResultHandle;

    struct Echo;
    impl DispatchableActor for Echo {
        fn type_name(&self) -> &'static str {
            "Echo"
        }
        fn dispatch<'a>(&'a self, _target: &'a str, _decoder: &'a mut InvocationDecoder, _result: ResultHandle) -> ObjSafeFuture<'a, ()> {
            Box::pin(async {})
        }
    }

    struct Other;
    impl DispatchableActor for Other {
        fn type_name(&self) -> &'static str {
            "Other"
        }
        fn dispatch<'a>(&'a self, _target: &'a str, _decoder: &'a mut InvocationDecoder, _result: ResultHandle) -> ObjSafeFuture<'a, ()> {
            Box::pin(async {})
        }
    }

    #[test]
    fn assign_id_generates_distinct_fresh_ids() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let a = reg.assign_id(&node);
        let b = reg.assign_id(&node);
        assert_ne!(a, b);
    }

    #[test]
    fn make_actor_with_id_honors_the_hint() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let id = make_actor_with_id(&reg, &node, "fixed-id", |_id| Arc::new(Echo));
        assert_eq!(id.id, "fixed-id");
        assert!(reg.contains(&id));
    }

    #[test]
    #[should_panic(expected = "id hint collision")]
    fn id_hint_collision_is_fatal() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        make_actor_with_id(&reg, &node, "dup", |_id| Arc::new(Echo));
        make_actor_with_id(&reg, &node, "dup", |_id| Arc::new(Echo));
    }

    #[test]
    fn resolve_after_resign_id_is_not_local() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let id = make_actor(&reg, &node, |_id| Arc::new(Echo));
        assert!(reg.resolve::<Echo>(&id).unwrap().is_some());

        reg.resign_id(&id);
        assert!(reg.resolve::<Echo>(&id).unwrap().is_none());
    }

    #[test]
    fn resolve_with_wrong_type_fails() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let id = make_actor(&reg, &node, |_id| Arc::new(Echo));
        let result = reg.resolve::<Other>(&id);
        assert!(matches!(result, Err(CoreError::ResolveFailedToMatchActorType { .. })));
    }

    #[test]
    fn on_demand_resolve_materializes_unregistered_ids() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let target = ActorId::new(Some(node), "lazy");
        let target2 = target.clone();
        reg.set_on_demand_resolve(Arc::new(move |id| {
            if *id == target2 {
                Some(ManagedActor::new(id.clone(), Arc::new(Echo)))
            } else {
                None
            }
        }));

        assert!(reg.resolve::<Echo>(&target).unwrap().is_some());
        assert!(reg.resolve::<Echo>(&ActorId::new(Some(node), "unknown")).unwrap().is_none());
    }

    #[test]
    fn on_demand_resolve_type_mismatch_reports_resolve_failed() {
        let reg = Registry::new();
        let node = NodeIdentity::random();
        let target = ActorId::new(Some(node), "lazy");
        let target2 = target.clone();
        reg.set_on_demand_resolve(Arc::new(move |id| {
            if *id == target2 {
                Some(ManagedActor::new(id.clone(), Arc::new(Echo)))
            } else {
                None
            }
        }));

        let result = reg.resolve::<Other>(&target);
        assert!(matches!(result, Err(CoreError::ResolveFailed { .. })));
    }
}
