//! SPEC_FULL.md §8 scenario 4: three concurrent calls are in flight when the channel closes;
//! all three must resolve (not hang forever) with `NoChannelToNode`, and the pending-reply table
//! must be empty afterward - no leaked slots waiting for a reply that can never arrive.

mod support;

use std::time::Duration;

use wsactor_core::identity::NodeIdentity;
use wsactor_core::rpc::Manager;
use wsactor_core::{ActorId, CoreError};

use support::{start_client, start_server};

#[tokio::test]
async fn channel_loss_fails_every_in_flight_call() {
    let (server, server_manager) = start_server(19203).await;

    // a call timeout long enough that none of the 3 calls resolve by timing out on their own;
    // the assertion only holds if the failure comes from the channel closing, not the clock.
    let client_node = NodeIdentity::random();
    let (client, _client_manager) = start_client(19203, client_node, Duration::from_secs(30)).await;

    // nothing is registered under this id, so the server never replies - each call stays
    // pending until something resolves it.
    let unanswered = ActorId::new(Some(server.local_node), "nobody-home");

    let mut calls = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        let target = unanswered.clone();
        calls.push(tokio::spawn(async move { client.remote_call::<String>(target, "echo", vec![], vec!["\"hi\"".into()]).await }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.outstanding_call_count(), 3);

    // server-initiated shutdown: closes every accepted channel, which the client observes as
    // its dispatcher loop ending.
    server_manager.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    for call in calls {
        let result = call.await.unwrap();
        assert!(matches!(result, Err(CoreError::NoChannelToNode { .. })), "expected NoChannelToNode, got {result:?}");
    }

    assert_eq!(client.outstanding_call_count(), 0);
}
