//! SPEC_FULL.md §8 scenario 3: resolving an actor id that exists under a different capability
//! than the caller expected is a typed `ResolveFailedToMatchActorType`, not a panic or a generic
//! decode error. exercised directly against a live `ActorSystem`'s registry, since
//! `resolve::<T>`'s typed downcast is an application-side API the wire dispatcher never calls
//! (it only uses the untyped `resolve_any`).

mod support;

use std::sync::Arc;

use wsactor_core::registry::make_actor_with_id;
use wsactor_core::CoreError;

use support::{start_server, Counter, Echo};

#[tokio::test]
async fn resolve_with_wrong_capability_is_a_typed_error() {
    let (server, _server_manager) = start_server(19202).await;

    let id = make_actor_with_id(&server.registry, &server.local_node, "a1", |_id| Arc::new(Counter));

    let result = server.registry.resolve::<Echo>(&id);

    match result {
        Err(CoreError::ResolveFailedToMatchActorType { id: failed_id, found, .. }) => {
            assert_eq!(failed_id, id);
            assert_eq!(found, "Counter");
        }
        other => panic!("expected ResolveFailedToMatchActorType, got {other:?}"),
    }
}
