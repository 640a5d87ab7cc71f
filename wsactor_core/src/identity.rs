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
//! node and actor identifiers, and the per-call correlation id.
//!
//! all three are 128 bit random values rendered as lowercase hex on the wire - this is
//! the same "good enough, no extra dependency" choice the rest of this stack makes for
//! random tokens (see `rand::random()` elsewhere in the workspace).

use std::fmt;
use std::str::FromStr;

use rand::random;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

/// opaque, globally unique identifier for a node (process) participating in the actor system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdentity(u128);

impl NodeIdentity {
    pub fn random() -> Self {
        NodeIdentity(random())
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for NodeIdentity {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NodeIdentity(u128::from_str_radix(s, 16)?))
    }
}

impl Serialize for NodeIdentity {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeIdentity {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(DeError::custom)
    }
}

/// per-call correlation identifier, unique within the issuing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u128);

impl CallId {
    pub fn random() -> Self {
        CallId(random())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for CallId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CallId(u128::from_str_radix(s, 16)?))
    }
}

impl Serialize for CallId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(DeError::custom)
    }
}

/// `(nodeID, id)` pair identifying a distributed actor. `id` is unique within its node.
/// equality and hashing use the full pair, as required by the spec - two actors with the
/// same local `id` but different nodes are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    #[serde(rename = "nodeID", skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<NodeIdentity>,
    pub id: String,
}

impl ActorId {
    pub fn new(node_id: Option<NodeIdentity>, id: impl Into<String>) -> Self {
        ActorId { node_id, id: id.into() }
    }

    pub fn is_local_to(&self, node_id: &NodeIdentity) -> bool {
        self.node_id.as_ref() == Some(node_id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(n) => write!(f, "{n}/{}", self.id),
            None => write!(f, "?/{}", self.id),
        }
    }
}
