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

//! The event kernel: a logical clock, a time-ordered ready queue, and the
//! arenas holding every process, channel, resource and signal of one
//! simulation. Entries at the same time run in insertion order, so a run
//! is fully deterministic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::trace;

use crate::channel::{rendezvous_times, ChannelId, ChannelSlot, PendingRecv, PendingSend};
use crate::event::{Event, EventResult};
use crate::process::{BoxedProcess, ProcessId, ProcessSlot};
use crate::resource::{ResourceId, ResourceSlot};
use crate::signal::{SignalId, SignalSlot};
use crate::Time;

/// Outcome of one `run_until` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Logical time of the last processed event.
    pub time: Time,
    /// Events processed by this call (every dequeue counts, including the
    /// first poll of a freshly spawned process).
    pub events: u64,
}

/// A send parked on a channel with nobody receiving, as listed by the
/// deadlock report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockedSend {
    pub channel: String,
    pub process: String,
    pub ready: Time,
}

// Derived ordering is (time, seq, process); seq is unique, so equal-time
// entries dequeue in insertion order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    time: Time,
    seq: u64,
    process: ProcessId,
}

pub(crate) struct Kernel {
    pub(crate) now: Time,
    seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
    pub(crate) processes: Vec<ProcessSlot>,
    pub(crate) channels: Vec<ChannelSlot>,
    pub(crate) resources: Vec<ResourceSlot>,
    pub(crate) signals: Vec<SignalSlot>,
    /// Process currently being polled; leaf futures read it to find their
    /// own slot.
    pub(crate) current: ProcessId,
}

impl Kernel {
    pub fn new() -> Self {
        Kernel {
            now: 0,
            seq: 0,
            queue: BinaryHeap::new(),
            processes: Vec::new(),
            channels: Vec::new(),
            resources: Vec::new(),
            signals: Vec::new(),
            current: ProcessId(0),
        }
    }

    pub fn spawn(&mut self, name: &str, future: BoxedProcess) -> ProcessId {
        let pid = ProcessId(self.processes.len());
        self.processes.push(ProcessSlot::new(name, future));
        trace!("t={} spawn [{}] as {:?}", self.now, name, pid);
        self.enqueue(pid, self.now);
        pid
    }

    pub fn add_channel(&mut self, name: String) -> ChannelId {
        let id = ChannelId(self.channels.len());
        self.channels.push(ChannelSlot::new(name));
        id
    }

    pub fn add_resource(&mut self, name: String, initial: i64) -> ResourceId {
        let id = ResourceId(self.resources.len());
        self.resources.push(ResourceSlot::new(name, initial));
        id
    }

    pub fn add_signal(&mut self, name: String) -> SignalId {
        let id = SignalId(self.signals.len());
        self.signals.push(SignalSlot::new(name));
        id
    }

    fn enqueue(&mut self, pid: ProcessId, time: Time) {
        self.seq += 1;
        self.queue.push(Reverse(Entry {
            time,
            seq: self.seq,
            process: pid,
        }));
    }

    /// Reschedules a parked process and deposits what it will observe.
    fn schedule(&mut self, pid: ProcessId, time: Time, result: EventResult) {
        debug_assert!(time >= self.now, "scheduling into the past");
        let slot = &mut self.processes[pid.0];
        debug_assert!(slot.result.is_none(), "result already pending");
        slot.result = Some(result);
        self.enqueue(pid, time);
    }

    /// Pops the next ready process at or before `stop_time`, advances the
    /// clock to it and hands out its coroutine for polling.
    pub fn take_next(&mut self, stop_time: Time) -> Option<(ProcessId, BoxedProcess)> {
        let time = self.queue.peek()?.0.time;
        if time > stop_time {
            return None;
        }
        let entry = self.queue.pop()?.0;
        debug_assert!(entry.time >= self.now, "time went backwards");
        self.now = entry.time;
        self.current = entry.process;
        let slot = &mut self.processes[entry.process.0];
        let future = match slot.future.take() {
            Some(f) => f,
            None => panic!("process '{}' scheduled while running or finished", slot.name),
        };
        Some((entry.process, future))
    }

    pub fn park(&mut self, pid: ProcessId, future: BoxedProcess) {
        let slot = &mut self.processes[pid.0];
        debug_assert!(slot.future.is_none());
        slot.future = Some(future);
    }

    pub fn finish(&mut self, pid: ProcessId) {
        let waiters = {
            let slot = &mut self.processes[pid.0];
            slot.finished = true;
            std::mem::take(&mut slot.waiters)
        };
        trace!("t={} [{}] finished", self.now, self.processes[pid.0].name);
        let now = self.now;
        for w in waiters {
            self.schedule(w, now, EventResult::Woken);
        }
    }

    pub fn dispatch(&mut self, pid: ProcessId, event: Event) {
        trace!(
            "t={} [{}] {:?}",
            self.now,
            self.processes[pid.0].name,
            event
        );
        match event {
            Event::Sleep { until } => {
                if until < self.now {
                    panic!(
                        "process '{}' sleeping into the past ({} < {})",
                        self.processes[pid.0].name, until, self.now
                    );
                }
                self.schedule(pid, until, EventResult::Woken);
            }
            Event::Send {
                channel,
                message,
                ready,
                transfer,
            } => self.dispatch_send(pid, channel, message, ready, transfer),
            Event::Receive {
                channel,
                ready,
                transfer,
                ack,
            } => self.dispatch_recv(pid, channel, ready, transfer, ack),
            Event::Select { channels, ready } => self.dispatch_select(pid, channels, ready),
            Event::ResourceRequest { resource, amount } => {
                let available = {
                    let slot = &mut self.resources[resource.0];
                    if amount <= slot.amount {
                        slot.amount -= amount;
                        true
                    } else {
                        slot.waiters.push((pid, amount));
                        false
                    }
                };
                if available {
                    let now = self.now;
                    self.schedule(pid, now, EventResult::Woken);
                }
            }
            Event::ProcessWait { process } => {
                if self.processes[process.0].finished {
                    let now = self.now;
                    self.schedule(pid, now, EventResult::Woken);
                } else {
                    self.processes[process.0].waiters.push(pid);
                }
            }
            Event::SignalWait { signal } => {
                self.signals[signal.0].waiters.push(pid);
            }
        }
    }

    fn dispatch_send(
        &mut self,
        pid: ProcessId,
        cid: ChannelId,
        message: Box<dyn std::any::Any>,
        ready: Time,
        transfer: Time,
    ) {
        if self.channels[cid.0].pending_send.is_some() {
            panic!(
                "channel '{}' already has a pending send; process '{}' cannot send",
                self.channels[cid.0].name, self.processes[pid.0].name
            );
        }
        let recv = self.channels[cid.0].pending_recv.take();
        match recv {
            Some(PendingRecv::Receive {
                process: receiver,
                ready: recv_ready,
                transfer: recv_transfer,
                ack,
            }) => {
                let (start, done) = rendezvous_times(
                    ready,
                    transfer,
                    recv_ready,
                    recv_transfer,
                    &self.channels[cid.0].name,
                );
                self.schedule(receiver, done, EventResult::Message(message));
                self.schedule(pid, if ack { done } else { start }, EventResult::Woken);
            }
            Some(PendingRecv::Select {
                process: selector,
                ready: select_ready,
                channels,
            }) => {
                let (_, done) = rendezvous_times(
                    ready,
                    transfer,
                    select_ready,
                    0,
                    &self.channels[cid.0].name,
                );
                self.clear_select(selector, &channels);
                self.schedule(
                    selector,
                    done,
                    EventResult::Selected {
                        channel: cid,
                        message,
                    },
                );
                self.schedule(pid, done, EventResult::Woken);
            }
            None => {
                self.channels[cid.0].pending_send = Some(PendingSend {
                    process: pid,
                    ready,
                    transfer,
                    message,
                });
            }
        }
    }

    fn dispatch_recv(
        &mut self,
        pid: ProcessId,
        cid: ChannelId,
        ready: Time,
        transfer: Time,
        ack: bool,
    ) {
        if self.channels[cid.0].pending_recv.is_some() {
            panic!(
                "channel '{}' already has a pending receive; process '{}' cannot receive",
                self.channels[cid.0].name, self.processes[pid.0].name
            );
        }
        let send = self.channels[cid.0].pending_send.take();
        match send {
            Some(PendingSend {
                process: sender,
                ready: send_ready,
                transfer: send_transfer,
                message,
            }) => {
                let (start, done) = rendezvous_times(
                    send_ready,
                    send_transfer,
                    ready,
                    transfer,
                    &self.channels[cid.0].name,
                );
                self.schedule(pid, done, EventResult::Message(message));
                self.schedule(sender, if ack { done } else { start }, EventResult::Woken);
            }
            None => {
                self.channels[cid.0].pending_recv = Some(PendingRecv::Receive {
                    process: pid,
                    ready,
                    transfer,
                    ack,
                });
            }
        }
    }

    fn dispatch_select(&mut self, pid: ProcessId, channels: Vec<ChannelId>, ready: Time) {
        for (i, &cid) in channels.iter().enumerate() {
            if self.channels[cid.0].pending_recv.is_some() {
                panic!(
                    "channel '{}' already has a pending receive; process '{}' cannot select",
                    self.channels[cid.0].name, self.processes[pid.0].name
                );
            }
            if let Some(send) = self.channels[cid.0].pending_send.take() {
                // A sender is already waiting; undo the registrations made
                // so far and complete the rendezvous.
                for &c in &channels[..i] {
                    self.channels[c.0].pending_recv = None;
                }
                let (_, done) = rendezvous_times(
                    send.ready,
                    send.transfer,
                    ready,
                    0,
                    &self.channels[cid.0].name,
                );
                self.schedule(
                    pid,
                    done,
                    EventResult::Selected {
                        channel: cid,
                        message: send.message,
                    },
                );
                self.schedule(send.process, done, EventResult::Woken);
                return;
            }
            self.channels[cid.0].pending_recv = Some(PendingRecv::Select {
                process: pid,
                ready,
                channels: channels.clone(),
            });
        }
    }

    /// Removes this process's select registration from every channel it
    /// covered. Other registrations (a sibling's receive parked later on
    /// one of these channels cannot exist while the select holds the slot)
    /// are left alone.
    fn clear_select(&mut self, selector: ProcessId, channels: &[ChannelId]) {
        for &cid in channels {
            let ours = matches!(
                &self.channels[cid.0].pending_recv,
                Some(PendingRecv::Select { process, .. }) if *process == selector
            );
            if ours {
                self.channels[cid.0].pending_recv = None;
            }
        }
    }

    pub fn resource_increase(&mut self, rid: ResourceId, amount: i64) {
        assert!(amount > 0, "increase by non-positive amount {}", amount);
        let granted = {
            let slot = &mut self.resources[rid.0];
            slot.amount += amount;
            slot.grant()
        };
        let now = self.now;
        for pid in granted {
            trace!(
                "t={} resource '{}' grants [{}]",
                now,
                self.resources[rid.0].name,
                self.processes[pid.0].name
            );
            self.schedule(pid, now, EventResult::Woken);
        }
    }

    pub fn resource_decrease(&mut self, rid: ResourceId, amount: i64) {
        assert!(amount > 0, "decrease by non-positive amount {}", amount);
        self.resources[rid.0].amount -= amount;
    }

    pub fn resource_amount(&self, rid: ResourceId) -> i64 {
        self.resources[rid.0].amount
    }

    pub fn signal_notify(&mut self, sid: SignalId) {
        let woken = self.signals[sid.0].drain();
        trace!(
            "t={} signal '{}' wakes {} waiter(s)",
            self.now,
            self.signals[sid.0].name,
            woken.len()
        );
        let now = self.now;
        for pid in woken {
            self.schedule(pid, now, EventResult::Woken);
        }
    }

    pub fn live_processes(&self) -> usize {
        self.processes.iter().filter(|p| !p.finished).count()
    }

    /// Sends still parked on their channels, for the deadlock report.
    pub fn blocked_sends(&self) -> Vec<BlockedSend> {
        self.channels
            .iter()
            .filter_map(|chan| {
                chan.pending_send.as_ref().map(|send| BlockedSend {
                    channel: chan.name.clone(),
                    process: self.processes[send.process.0].name.clone(),
                    ready: send.ready,
                })
            })
            .collect()
    }
}
