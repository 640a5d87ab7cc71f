//! shared fixtures for the end-to-end tests: a couple of trivial actors and helpers that bring
//! up a real `ServerManager`/`ClientManager` pair over a loopback TCP port, the way
//! SPEC_FULL.md §8's end-to-end scenarios are meant to be exercised (a real axum server, a real
//! tokio-tungstenite client, no mocked transport).

use std::sync::Arc;
use std::time::Duration;

use wsactor_core::identity::NodeIdentity;
use wsactor_core::registry::{ObjSafeFuture, DispatchableActor};
use wsactor_core::rpc::ActorSystem;
use wsactor_core::InvocationDecoder;
use wsactor_core::ResultHandle;
use wsactor_net::{ClientManager, ServerManager};

/// answers `echo(s)` with `s`; anything else replies void. the scenario-1 actor from
/// SPEC_FULL.md §8.
pub struct Echo;

impl DispatchableActor for Echo {
    fn type_name(&self) -> &'static str {
        "Echo"
    }

    fn dispatch<'a>(&'a self, target: &'a str, decoder: &'a mut InvocationDecoder, result: ResultHandle) -> ObjSafeFuture<'a, ()> {
        Box::pin(async move {
            match target {
                "echo" => {
                    let s: String = decoder.next().expect("echo takes one string argument");
                    result.succeed(&s).await;
                }
                _ => result.succeed_void().await,
            }
        })
    }
}

/// a second, differently-typed actor used to exercise `ResolveFailedToMatchActorType`: it
/// implements `DispatchableActor` but is a distinct Rust type from [`Echo`], so resolving it as
/// `Arc<Echo>` must fail the downcast.
pub struct Counter;

impl DispatchableActor for Counter {
    fn type_name(&self) -> &'static str {
        "Counter"
    }

    fn dispatch<'a>(&'a self, _target: &'a str, _decoder: &'a mut InvocationDecoder, result: ResultHandle) -> ObjSafeFuture<'a, ()> {
        Box::pin(async move { result.succeed_void().await })
    }
}

/// binds a `ServerManager` on loopback:`port`, spawns its accept loop, and returns the
/// `ActorSystem` built on top of it. tests register actors directly on `system.registry`.
pub async fn start_server(port: u16) -> (Arc<ActorSystem>, Arc<ServerManager>) {
    let manager = ServerManager::new("127.0.0.1", port);
    let system = Arc::new(ActorSystem::new(NodeIdentity::random(), manager.clone(), Duration::from_secs(5)));

    let serve_system = system.clone();
    let serve_manager = manager.clone();
    tokio::spawn(async move {
        let _ = serve_manager.serve(serve_system).await;
    });

    // no signal for "listener bound" is exposed beyond the accept loop itself; a short yield is
    // enough in practice since the bind happens before the first `await` inside `serve`.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (system, manager)
}

/// dials loopback:`port` as `local_node`, spawns the reconnect loop, and waits for the first
/// channel to come up before returning.
pub async fn start_client(port: u16, local_node: NodeIdentity, call_timeout: Duration) -> (Arc<ActorSystem>, Arc<ClientManager>) {
    let manager = ClientManager::new("127.0.0.1", port, local_node, Duration::from_millis(20), Duration::from_millis(200));
    let system = Arc::new(ActorSystem::new(local_node, manager.clone(), call_timeout));

    let run_system = system.clone();
    let run_manager = manager.clone();
    tokio::spawn(async move {
        run_manager.run(run_system).await;
    });

    manager.wait_for_channel().await;
    (system, manager)
}
