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
//! runtime configuration: what mode to start the actor system in, and the handful of tunables
//! (call timeout, reconnect backoff) that govern it. loaded from a small RON file the same way
//! service configs are loaded elsewhere in this stack, or built up programmatically by an
//! embedding binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};
use crate::identity::NodeIdentity;

/// which side of the connection this process runs. a client dials out to one server and
/// reconnects on loss; a server listens and serves arbitrarily many clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mode {
    ClientFor { host: String, port: u16 },
    ServerOnly { host: String, port: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub mode: Mode,

    /// fixed node identity, e.g. for a server that needs a stable address across restarts.
    /// a fresh random one is minted if omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeIdentity>,

    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,

    #[serde(with = "duration_secs")]
    pub reconnect_backoff_min: Duration,

    #[serde(with = "duration_secs")]
    pub reconnect_backoff_max: Duration,

    /// `tracing_subscriber::EnvFilter` directive string, e.g. "wsactor_core=debug,wsactor_net=info".
    pub tracing_filter: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            mode: Mode::ServerOnly { host: "0.0.0.0".into(), port: 8080 },
            node_id: None,
            call_timeout: Duration::from_secs(10),
            reconnect_backoff_min: Duration::from_millis(250),
            reconnect_backoff_max: Duration::from_secs(30),
            tracing_filter: "info".into(),
        }
    }
}

impl SystemConfig {
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| crate::errors::op_failed(format!("reading {path:?}: {e}")))?;
        ron::de::from_str(&data).map_err(|e| CoreError::DecodingError { inner: e.to_string() })
    }

    pub fn node_id_or_random(&self) -> NodeIdentity {
        self.node_id.unwrap_or_else(NodeIdentity::random)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// command-line surface for embedding in a host binary; constructing a [`SystemConfig`] from
/// parsed arguments is left to that binary. not wired to any `main` here.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "wsactor", about = "distributed actor runtime over websockets")]
pub struct CliOptions {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long, default_value = "info")]
    pub tracing_filter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_server_only_with_sane_timeouts() {
        let cfg = SystemConfig::default();
        assert!(matches!(cfg.mode, Mode::ServerOnly { .. }));
        assert_eq!(cfg.call_timeout, Duration::from_secs(10));
        assert!(cfg.node_id.is_none());
    }

    #[test]
    fn ron_round_trips_a_client_mode_config() {
        let cfg = SystemConfig { mode: Mode::ClientFor { host: "relay.example".into(), port: 9001 }, ..SystemConfig::default() };
        let encoded = ron::ser::to_string(&cfg).unwrap();
        let decoded: SystemConfig = ron::de::from_str(&encoded).unwrap();
        assert!(matches!(decoded.mode, Mode::ClientFor { port: 9001, .. }));
    }

    #[test]
    fn node_id_or_random_keeps_a_configured_id() {
        let node = NodeIdentity::random();
        let cfg = SystemConfig { node_id: Some(node), ..SystemConfig::default() };
        assert_eq!(cfg.node_id_or_random(), node);
    }
}
