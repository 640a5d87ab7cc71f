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
//! the websocket transport (L5-L7) for `wsactor_core`'s actor system: a server-mode
//! [`server::ServerManager`] accepting connections via `axum`, a client-mode
//! [`client::ClientManager`] dialing out via `tokio-tungstenite` with reconnect backoff, and the
//! [`dispatcher::run`] loop shared by both that turns decoded frames into
//! `ActorSystem::dispatch_incoming` calls.
//!
//! [`start`] is the one entry point a host binary needs: given a [`SystemConfig`] it builds the
//! `ActorSystem`, spawns the transport appropriate to `config.mode`, and hands back both.

pub mod channel;
pub mod client;
pub mod dispatcher;
pub mod errors;
pub mod server;

use std::sync::Arc;

pub use channel::WsChannel;
pub use client::ClientManager;
pub use errors::{NetError, Result};
pub use server::ServerManager;

use wsactor_core::config::{Mode, SystemConfig};
use wsactor_core::rpc::ActorSystem;

/// the running transport half of a [`System`], so callers can shut it down or inspect it without
/// downcasting `Manager` back to a concrete type.
pub enum Transport {
    Client(Arc<ClientManager>),
    Server(Arc<ServerManager>),
}

/// an [`ActorSystem`] paired with the transport task serving it. dropping this does not stop the
/// transport - call [`System::shutdown`] (or `system.shutdown_gracefully()` directly) first and
/// await the join handle.
pub struct System {
    pub actors: Arc<ActorSystem>,
    pub transport: Transport,
    driver: tokio::task::JoinHandle<()>,
}

impl System {
    /// signals the transport to close every channel it owns and fails every outstanding call,
    /// then awaits the background task driving that transport.
    pub async fn shutdown(self) {
        self.actors.shutdown_gracefully();
        let _ = self.driver.await;
    }
}

/// builds an [`ActorSystem`] from `config` and spawns the transport its `mode` calls for.
///
/// both modes return as soon as the transport task is spawned, without waiting for the listener
/// to bind or the first connection attempt to succeed - `axum::serve`'s bind happens inside the
/// spawned task, so a caller needing to know the server is actually listening should poll
/// [`ServerManager::node_count`] or (for the client side) await [`ClientManager::wait_for_channel`].
pub async fn start(config: SystemConfig) -> Result<System> {
    let local_node = config.node_id_or_random();

    match config.mode.clone() {
        Mode::ServerOnly { host, port } => {
            let manager = ServerManager::new(host, port);
            let actors = Arc::new(ActorSystem::new(local_node, manager.clone(), config.call_timeout));
            let serve_system = actors.clone();
            let serve_manager = manager.clone();
            let driver = tokio::spawn(async move {
                if let Err(error) = serve_manager.serve(serve_system).await {
                    tracing::warn!(%error, "server transport exited");
                }
            });
            Ok(System { actors, transport: Transport::Server(manager), driver })
        }
        Mode::ClientFor { host, port } => {
            let manager = ClientManager::new(host, port, local_node, config.reconnect_backoff_min, config.reconnect_backoff_max);
            let actors = Arc::new(ActorSystem::new(local_node, manager.clone(), config.call_timeout));
            let run_system = actors.clone();
            let run_manager = manager.clone();
            let driver = tokio::spawn(async move {
                run_manager.run(run_system).await;
            });
            Ok(System { actors, transport: Transport::Client(manager), driver })
        }
    }
}
