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
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

/// transport and handshake errors - anything below the envelope layer. resolution/decoding
/// errors live in `wsactor_core::CoreError`.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("actor system error: {0}")]
    Core(#[from] wsactor_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// the peer accepted the TCP connection but rejected (or never completed) the WebSocket
    /// upgrade handshake itself - e.g. it answered with a non-101 HTTP response. distinguished
    /// from [`NetError::ConnectError`] (`connect_async` failing before an HTTP response was even
    /// read) so a caller can tell "wrong URL/unreachable host" apart from "reached something,
    /// but it isn't speaking this protocol".
    #[error("websocket upgrade failed: {0}")]
    FailedToUpgrade(String),

    #[error("connect error: {0}")]
    ConnectError(String),

    #[error("operation failed: {0}")]
    OpFailed(String),
}

pub fn op_failed(msg: impl ToString) -> NetError {
    NetError::OpFailed(msg.to_string())
}

pub fn connect_error(msg: impl ToString) -> NetError {
    NetError::ConnectError(msg.to_string())
}

pub fn failed_to_upgrade(msg: impl ToString) -> NetError {
    NetError::FailedToUpgrade(msg.to_string())
}
