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

//! Counting semaphores.
//!
//! `request` parks the caller until the amount is available; `increase`
//! replenishes and grants parked requests, scanning the waiter list from
//! the tail. `decrease` takes without blocking and without validation, so
//! the amount can go negative; callers that mix it with `request` on the
//! same resource must guard availability themselves.

use crate::process::ProcessId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

pub(crate) struct ResourceSlot {
    pub name: String,
    pub amount: i64,
    /// Parked requests in arrival order; grants scan from the tail.
    pub waiters: Vec<(ProcessId, i64)>,
}

impl ResourceSlot {
    pub fn new(name: String, initial: i64) -> Self {
        ResourceSlot {
            name,
            amount: initial,
            waiters: Vec::new(),
        }
    }

    /// Grants every parked request the current amount covers, newest
    /// first. Returns the granted processes in grant order.
    pub fn grant(&mut self) -> Vec<ProcessId> {
        let mut granted = Vec::new();
        let mut i = self.waiters.len();
        while i > 0 {
            i -= 1;
            let (process, wanted) = self.waiters[i];
            if wanted <= self.amount {
                self.amount -= wanted;
                self.waiters.remove(i);
                granted.push(process);
            }
        }
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_scans_from_the_tail() {
        let mut slot = ResourceSlot::new("res".to_string(), 0);
        slot.waiters.push((ProcessId(0), 1));
        slot.waiters.push((ProcessId(1), 1));
        slot.amount = 1;
        assert_eq!(slot.grant(), vec![ProcessId(1)]);
        assert_eq!(slot.amount, 0);
        assert_eq!(slot.waiters, vec![(ProcessId(0), 1)]);
    }

    #[test]
    fn grant_skips_requests_larger_than_the_amount() {
        let mut slot = ResourceSlot::new("res".to_string(), 0);
        slot.waiters.push((ProcessId(0), 2));
        slot.waiters.push((ProcessId(1), 5));
        slot.amount = 3;
        assert_eq!(slot.grant(), vec![ProcessId(0)]);
        assert_eq!(slot.amount, 1);
        assert_eq!(slot.waiters, vec![(ProcessId(1), 5)]);
    }

    #[test]
    fn grant_can_satisfy_several_waiters() {
        let mut slot = ResourceSlot::new("res".to_string(), 0);
        slot.waiters.push((ProcessId(0), 1));
        slot.waiters.push((ProcessId(1), 2));
        slot.waiters.push((ProcessId(2), 1));
        slot.amount = 4;
        assert_eq!(slot.grant(), vec![ProcessId(2), ProcessId(1), ProcessId(0)]);
        assert_eq!(slot.amount, 0);
        assert!(slot.waiters.is_empty());
    }
}
