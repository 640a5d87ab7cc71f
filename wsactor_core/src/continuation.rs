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
//! [`TimedContinuation`]: a one-shot result slot that completes exactly once, either because
//! someone resumed it or because its timer fired first. mirrors the role `Query`/`QueryBuilder`
//! play for the reference actor runtime's synchronous request/response pattern, generalized
//! with an explicit timeout and a cross-task handle instead of a response channel tied to one
//! receiving actor.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::errors::CoreError;

/// completes at most once. `resume_*` after the first completion is a documented no-op, and the
/// background timer is aborted as soon as a normal resume wins the race.
pub struct TimedContinuation<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T, CoreError>>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> TimedContinuation<T> {
    /// creates the slot and starts its timer task. returns the slot (for `resume_*`) and the
    /// receiving half of the one-shot channel the caller should await.
    pub fn create(timeout: Duration, timeout_error: CoreError) -> (std::sync::Arc<Self>, oneshot::Receiver<Result<T, CoreError>>) {
        let (tx, rx) = oneshot::channel();
        let this = std::sync::Arc::new(TimedContinuation { tx: Mutex::new(Some(tx)), timer: Mutex::new(None) });

        let weak = std::sync::Arc::downgrade(&this);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(cont) = weak.upgrade() {
                cont.resume_throwing(timeout_error);
            }
        });
        *this.timer.lock().unwrap() = Some(handle);

        (this, rx)
    }

    /// completes the slot with `result`. idempotent: a second call (from either the timer or a
    /// racing explicit resume) observes `tx` already taken and is a no-op.
    fn resume(&self, result: Result<T, CoreError>) {
        let sent = self.tx.lock().unwrap().take();
        if let Some(tx) = sent {
            let _ = tx.send(result); // receiver may already be gone (cancelled awaiter) - fine
            if let Some(timer) = self.timer.lock().unwrap().take() {
                timer.abort();
            }
        }
    }

    pub fn resume_returning(&self, value: T) {
        self.resume(Ok(value));
    }

    pub fn resume_throwing(&self, error: CoreError) {
        self.resume(Err(error));
    }
}
