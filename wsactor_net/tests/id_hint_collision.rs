//! SPEC_FULL.md §8 scenario 6: assigning an actor to an id hint already present in the registry
//! is a programming error, not a recoverable `Result` - it terminates the task. exercised here
//! against a registry backing a live, network-connected `ActorSystem` rather than a bare
//! `Registry` in isolation, as the boundary-test harness SPEC_FULL.md calls for.

mod support;

use std::sync::Arc;

use wsactor_core::registry::make_actor_with_id;

use support::{start_server, Echo};

#[tokio::test]
async fn id_hint_collision_terminates_the_task() {
    let (server, _server_manager) = start_server(19205).await;

    let _first = make_actor_with_id(&server.registry, &server.local_node, "fixed-id", |_id| Arc::new(Echo));

    let server_for_second = server.clone();
    let outcome = tokio::spawn(async move {
        make_actor_with_id(&server_for_second.registry, &server_for_second.local_node, "fixed-id", |_id| Arc::new(Echo));
    })
    .await;

    assert!(outcome.is_err(), "expected the id hint collision to panic the task");
}
