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

//! Rendezvous channels.
//!
//! A channel holds at most one pending send and one pending receive (or
//! select registration). When both sides are present the rendezvous
//! completes: the transfer starts when the later side is ready and takes
//! the larger of the two transfer times. Modeling a transfer time on both
//! sides of the same channel is a configuration bug and fatal.

use std::any::Any;
use std::cmp::max;

use crate::process::ProcessId;
use crate::Time;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub(crate) usize);

pub(crate) struct PendingSend {
    pub process: ProcessId,
    pub ready: Time,
    pub transfer: Time,
    pub message: Box<dyn Any>,
}

pub(crate) enum PendingRecv {
    Receive {
        process: ProcessId,
        ready: Time,
        transfer: Time,
        /// When false the sender is released at the transfer start instead
        /// of its completion (fire-and-forget).
        ack: bool,
    },
    Select {
        process: ProcessId,
        ready: Time,
        /// Every channel this selection is registered on, for cleanup when
        /// one of them fires.
        channels: Vec<ChannelId>,
    },
}

pub(crate) struct ChannelSlot {
    pub name: String,
    pub pending_send: Option<PendingSend>,
    pub pending_recv: Option<PendingRecv>,
}

impl ChannelSlot {
    pub fn new(name: String) -> Self {
        ChannelSlot {
            name,
            pending_send: None,
            pending_recv: None,
        }
    }
}

/// Returns `(start, completion)` of a rendezvous.
pub(crate) fn rendezvous_times(
    send_ready: Time,
    send_transfer: Time,
    recv_ready: Time,
    recv_transfer: Time,
    channel: &str,
) -> (Time, Time) {
    if send_transfer != 0 && recv_transfer != 0 {
        panic!(
            "channel '{}': transfer time modeled on both sides ({} and {})",
            channel, send_transfer, recv_transfer
        );
    }
    let start = max(send_ready, recv_ready);
    (start, start + max(send_transfer, recv_transfer))
}
