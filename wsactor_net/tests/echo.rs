//! SPEC_FULL.md §8 scenario 1: a client calls a server-hosted actor's method and gets the
//! expected reply back over a real websocket round trip, well inside the call timeout.

mod support;

use std::sync::Arc;
use std::time::Duration;

use wsactor_core::identity::NodeIdentity;
use wsactor_core::registry::make_actor;
use wsactor_core::ActorId;

use support::{start_client, start_server, Echo};

#[tokio::test]
async fn echo_call_round_trips_before_timeout() {
    let (server, _server_manager) = start_server(19200).await;
    let actor_id = make_actor(&server.registry, &server.local_node, |_id| Arc::new(Echo));

    let client_node = NodeIdentity::random();
    let (client, _client_manager) = start_client(19200, client_node, Duration::from_secs(5)).await;

    let target = ActorId::new(Some(server.local_node), actor_id.id.clone());
    let call = client.remote_call::<String>(target, "echo", vec![], vec!["\"hi\"".into()]);

    let result = tokio::time::timeout(Duration::from_secs(5), call).await.expect("call did not complete before the 5s timeout").unwrap();

    assert_eq!(result, "hi");
}
