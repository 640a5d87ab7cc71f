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
//! decodes the per-argument JSON strings carried in a [`crate::envelope::RemoteCallEnvelope`]
//! into concrete Rust values, one at a time, in the order a generated (or hand-written)
//! `DispatchableActor::dispatch` body pulls them off.

use serde::de::DeserializeOwned;

use crate::errors::{CoreError, Result};

/// a cursor over `RemoteCallEnvelope::args`. each call to [`InvocationDecoder::next`] consumes
/// one argument; running out is a [`CoreError::NotEnoughArgumentsInEnvelope`], and a value that
/// does not parse as the requested type is a [`CoreError::DecodingError`].
pub struct InvocationDecoder<'a> {
    args: std::slice::Iter<'a, String>,
    total: usize,
}

impl<'a> InvocationDecoder<'a> {
    pub fn new(args: &'a [String]) -> Self {
        InvocationDecoder { args: args.iter(), total: args.len() }
    }

    /// decode the next argument as `T`.
    pub fn next<T: DeserializeOwned>(&mut self) -> Result<T> {
        let raw = self.args.next().ok_or(CoreError::NotEnoughArgumentsInEnvelope { expected: self.total + 1 })?;
        serde_json::from_str(raw).map_err(|e| CoreError::DecodingError { inner: e.to_string() })
    }

    /// true once every argument has been consumed. a `dispatch` implementation that does not
    /// check this is simply choosing to ignore trailing arguments, which is allowed.
    pub fn is_exhausted(&self) -> bool {
        self.args.as_slice().is_empty()
    }
}

/// encodes a single return value (or argument) the same way the wire format expects: as a JSON
/// string, matching `RemoteCallEnvelope::args` and `ReplyEnvelope::value`.
pub fn encode_value<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CoreError::DecodingError { inner: e.to_string() })
}
