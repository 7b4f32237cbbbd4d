// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::pin::Pin;

use crate::event::{Event, EventResult};

/// Handle to a simulated process. Slots are never reused, so a handle stays
/// valid (and `join`-able) after the process finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub(crate) usize);

/// A suspended simulation coroutine.
pub type BoxedProcess = Pin<Box<dyn Future<Output = ()>>>;

pub(crate) struct ProcessSlot {
    pub name: String,
    /// Taken out while the process is being polled; `None` once finished.
    pub future: Option<BoxedProcess>,
    /// The operation the process suspended on, deposited by the leaf future
    /// and consumed by the dispatcher.
    pub event: Option<Event>,
    /// Outcome of the operation, deposited when the process is rescheduled
    /// and consumed on the next poll.
    pub result: Option<EventResult>,
    pub finished: bool,
    /// Processes blocked in `join` on this one.
    pub waiters: Vec<ProcessId>,
}

impl ProcessSlot {
    pub fn new(name: &str, future: BoxedProcess) -> Self {
        ProcessSlot {
            name: name.to_string(),
            future: Some(future),
            event: None,
            result: None,
            finished: false,
            waiters: Vec::new(),
        }
    }
}
