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

//! Broadcast signals.
//!
//! `wait` parks unconditionally; `notify` wakes everyone parked at that
//! instant and is lost on anyone who waits later. Consumers re-check their
//! condition in a loop after waking.

use std::mem;

use crate::process::ProcessId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignalId(pub(crate) usize);

pub(crate) struct SignalSlot {
    pub name: String,
    pub waiters: Vec<ProcessId>,
}

impl SignalSlot {
    pub fn new(name: String) -> Self {
        SignalSlot {
            name,
            waiters: Vec::new(),
        }
    }

    pub fn drain(&mut self) -> Vec<ProcessId> {
        mem::take(&mut self.waiters)
    }
}
