//! SPEC_FULL.md §8 scenario 5: a raw WebSocket ping gets an unmasked pong echoing the same
//! payload back, per §4.6's dispatch table. this bypasses `ClientManager` (it never sends pings
//! itself - nothing in this protocol calls for that) and drives `tokio-tungstenite` directly, to
//! exercise the `InboundFrame::Ping` arm of the dispatcher against the real server.

mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use support::start_server;

#[tokio::test]
async fn ping_gets_an_echoing_pong() {
    let (_server, _server_manager) = start_server(19204).await;

    let (mut stream, _response) = tokio_tungstenite::connect_async("ws://127.0.0.1:19204/").await.expect("connect");

    let payload = vec![0x01u8, 0x02u8];
    stream.send(Message::Ping(payload.clone().into())).await.expect("send ping");

    let reply = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.expect("timed out waiting for pong").expect("stream ended").expect("read error");

    match reply {
        Message::Pong(got) => assert_eq!(got.to_vec(), payload),
        other => panic!("expected a pong, got {other:?}"),
    }
}
