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

//! Simulation facade.
//!
//! [`Simulation`] owns the kernel: actors and processes are registered and
//! ports wired before (or during) a run, then [`Simulation::run_until`]
//! drives the event loop. Every coroutine gets a cloneable [`Sim`] handle;
//! its async methods are the only suspension points. Suspension is purely
//! logical: a primitive parks the process by registering one event with
//! the kernel and the coroutine is polled again when that event resolves,
//! with the clock already advanced. No threads, no real blocking.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_task::noop_waker;
use log::{trace, warn};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::channel::ChannelId;
use crate::event::{Event, EventResult};
use crate::ports::{InPort, OutPort};
use crate::process::{BoxedProcess, ProcessId};
use crate::resource::ResourceId;
use crate::scheduler::{BlockedSend, Kernel, RunSummary};
use crate::signal::SignalId;
use crate::Time;

/// A simulated hardware block or software component. One root process per
/// actor; ports are public fields wired by the topology code before the
/// actor is added.
pub trait Actor {
    fn name(&self) -> &str;
    fn run(self: Box<Self>, sim: Sim) -> BoxedProcess;
}

/// Owner of one simulation: kernel, actors, wiring, and the run loop.
pub struct Simulation {
    kernel: Rc<RefCell<Kernel>>,
    graph: DiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
}

impl Simulation {
    pub fn new() -> Self {
        Simulation {
            kernel: Rc::new(RefCell::new(Kernel::new())),
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    /// The context handle processes run with. Cheap to clone.
    pub fn sim(&self) -> Sim {
        Sim {
            kernel: Rc::clone(&self.kernel),
        }
    }

    pub fn now(&self) -> Time {
        self.kernel.borrow().now
    }

    /// Spawns the actor's root process at the current time.
    pub fn add_actor(&mut self, actor: Box<dyn Actor>) -> ProcessId {
        let name = actor.name().to_string();
        let future = actor.run(self.sim());
        self.kernel.borrow_mut().spawn(&name, future)
    }

    /// Spawns a bare coroutine; the building block for tests and for
    /// actors' internal helper processes.
    pub fn add_process(
        &mut self,
        name: &str,
        future: impl Future<Output = ()> + 'static,
    ) -> ProcessId {
        self.kernel.borrow_mut().spawn(name, Box::pin(future))
    }

    /// Creates a channel between two ports of the same message type. Each
    /// port binds once, for its lifetime.
    pub fn connect<T: Any>(
        &mut self,
        from: &OutPort<T>,
        to: &InPort<T>,
    ) -> Result<ChannelId, crate::Error> {
        if from.is_bound() {
            return Err(crate::Error::PortAlreadyBound(from.name().to_string()));
        }
        if to.is_bound() {
            return Err(crate::Error::PortAlreadyBound(to.name().to_string()));
        }
        let name = format!("{}->{}", from.name(), to.name());
        let id = self.kernel.borrow_mut().add_channel(name.clone());
        from.bind(id);
        to.bind(id);
        let a = self.port_node(from.name());
        let b = self.port_node(to.name());
        self.graph.add_edge(a, b, name);
        Ok(id)
    }

    fn port_node(&mut self, name: &str) -> NodeIndex {
        match self.nodes.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(name.to_string());
                self.nodes.insert(name.to_string(), idx);
                idx
            }
        }
    }

    /// The port connectivity graph, one node per bound port and one edge
    /// per channel.
    pub fn graph(&self) -> &DiGraph<String, String> {
        &self.graph
    }

    pub fn write_dot(&self, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "{}", Dot::new(&self.graph))
    }

    /// Runs until the ready queue is exhausted, `stop_time` is passed, or
    /// `stop_events` events have been processed, whichever comes first.
    /// The clock is monotonic across calls; it is never reset.
    pub fn run_until(&mut self, stop_time: Time, stop_events: u64) -> RunSummary {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut events = 0u64;
        while events < stop_events {
            let next = self.kernel.borrow_mut().take_next(stop_time);
            let (pid, mut future) = match next {
                Some(step) => step,
                None => break,
            };
            events += 1;
            // The kernel borrow is released while polling; leaf futures
            // re-borrow it to park their event or take their result.
            let poll = future.as_mut().poll(&mut cx);
            let mut kernel = self.kernel.borrow_mut();
            match poll {
                Poll::Ready(()) => kernel.finish(pid),
                Poll::Pending => {
                    kernel.park(pid, future);
                    match kernel.processes[pid.0].event.take() {
                        Some(event) => kernel.dispatch(pid, event),
                        None => panic!(
                            "process '{}' suspended on a future outside the simulation",
                            kernel.processes[pid.0].name
                        ),
                    }
                }
            }
        }
        let summary = RunSummary {
            time: self.kernel.borrow().now,
            events,
        };
        trace!("run stopped at t={} after {} events", summary.time, summary.events);
        summary
    }

    /// Convenience wrapper: run to quiescence.
    pub fn run(&mut self) -> RunSummary {
        self.run_until(Time::MAX, u64::MAX)
    }

    /// Sends parked on channels with no receiver in sight. Non-empty after
    /// a run that reached quiescence usually means a deadlocked topology.
    pub fn blocked_sends(&self) -> Vec<BlockedSend> {
        self.kernel.borrow().blocked_sends()
    }

    pub fn log_deadlock_report(&self) {
        let blocked = self.blocked_sends();
        if blocked.is_empty() {
            return;
        }
        let kernel = self.kernel.borrow();
        warn!(
            "t={}: {} process(es) alive, {} send(s) blocked:",
            kernel.now,
            kernel.live_processes(),
            blocked.len()
        );
        for b in &blocked {
            warn!(
                "  channel '{}': process '{}' sending since t={}",
                b.channel, b.process, b.ready
            );
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        // Coroutines capture Sim handles, which point back at the kernel
        // that stores them. Drop the stored state to break the cycle.
        let mut kernel = self.kernel.borrow_mut();
        for p in kernel.processes.iter_mut() {
            p.future = None;
            p.result = None;
        }
        for c in kernel.channels.iter_mut() {
            c.pending_send = None;
            c.pending_recv = None;
        }
    }
}

/// Per-process context handle. All simulation primitives live here; the
/// async ones are the coroutine's only legal suspension points.
#[derive(Clone)]
pub struct Sim {
    kernel: Rc<RefCell<Kernel>>,
}

impl Sim {
    pub fn now(&self) -> Time {
        self.kernel.borrow().now
    }

    /// Spawns a child process at the current time.
    pub fn spawn(&self, name: &str, future: impl Future<Output = ()> + 'static) -> ProcessId {
        self.kernel.borrow_mut().spawn(name, Box::pin(future))
    }

    pub async fn sleep(&self, delay: Time) {
        assert!(delay >= 0, "negative sleep delay {}", delay);
        let until = self.now() + delay;
        self.suspend(Event::Sleep { until }).await;
    }

    pub async fn sleep_until(&self, time: Time) {
        self.suspend(Event::Sleep { until: time }).await;
    }

    /// Blocks until the target process finishes. Returns immediately if it
    /// already has.
    pub async fn join(&self, process: ProcessId) {
        self.suspend(Event::ProcessWait { process }).await;
    }

    /// Sends a value, blocking until the rendezvous completes (the
    /// receiver acknowledges by default).
    pub async fn send<T: Any>(&self, port: &OutPort<T>, value: T) {
        self.send_with(port, value, 0, 0).await
    }

    /// Send with timing: the value is offered `wait_before` ticks from now
    /// and occupies the channel for `transfer` ticks. At most one side of
    /// a channel may model a transfer time.
    pub async fn send_with<T: Any>(
        &self,
        port: &OutPort<T>,
        value: T,
        wait_before: Time,
        transfer: Time,
    ) {
        assert!(wait_before >= 0 && transfer >= 0, "negative send timing");
        let channel = self.bound(port.channel(), port.name());
        let ready = self.now() + wait_before;
        self.suspend(Event::Send {
            channel,
            message: Box::new(value),
            ready,
            transfer,
        })
        .await;
    }

    /// Receives a value, blocking until a sender rendezvouses.
    pub async fn recv<T: Any>(&self, port: &InPort<T>) -> T {
        self.recv_with(port, 0, 0, true).await
    }

    /// Receive without acknowledgment: the sender is released when the
    /// transfer starts instead of when it completes.
    pub async fn recv_unacked<T: Any>(&self, port: &InPort<T>) -> T {
        self.recv_with(port, 0, 0, false).await
    }

    pub async fn recv_with<T: Any>(
        &self,
        port: &InPort<T>,
        wait_before: Time,
        transfer: Time,
        ack: bool,
    ) -> T {
        assert!(wait_before >= 0 && transfer >= 0, "negative receive timing");
        let channel = self.bound(port.channel(), port.name());
        let ready = self.now() + wait_before;
        let result = self
            .suspend(Event::Receive {
                channel,
                ready,
                transfer,
                ack,
            })
            .await;
        match result {
            EventResult::Message(message) => match message.downcast::<T>() {
                Ok(value) => *value,
                Err(_) => panic!("message type mismatch on port '{}'", port.name()),
            },
            _ => panic!("receive on port '{}' resumed without a message", port.name()),
        }
    }

    /// Blocks until one of the ports rendezvouses with a sender, then
    /// completes that transfer: returns the index of the winning port and
    /// the message, with the sender released at the completion time.
    /// Unbound ports are skipped.
    pub async fn select<T: Any>(&self, ports: &[&InPort<T>]) -> (usize, T) {
        let channels: Vec<ChannelId> = ports.iter().filter_map(|p| p.channel()).collect();
        assert!(!channels.is_empty(), "select over unbound ports only");
        let ready = self.now();
        match self.suspend(Event::Select { channels, ready }).await {
            EventResult::Selected { channel, message } => {
                let index = ports
                    .iter()
                    .position(|p| p.channel() == Some(channel))
                    .unwrap_or_else(|| panic!("selected channel not among the given ports"));
                match message.downcast::<T>() {
                    Ok(value) => (index, *value),
                    Err(_) => panic!("message type mismatch on port '{}'", ports[index].name()),
                }
            }
            _ => panic!("select resumed without a selection"),
        }
    }

    pub fn add_resource(&self, name: &str, initial: i64) -> ResourceId {
        self.kernel.borrow_mut().add_resource(name.to_string(), initial)
    }

    /// Takes `amount` from the resource, blocking until it is available.
    pub async fn request(&self, resource: ResourceId, amount: i64) {
        assert!(amount > 0, "request for non-positive amount {}", amount);
        self.suspend(Event::ResourceRequest { resource, amount }).await;
    }

    /// Returns `amount` to the resource and grants parked requests it now
    /// covers, at the current time.
    pub fn increase(&self, resource: ResourceId, amount: i64) {
        self.kernel.borrow_mut().resource_increase(resource, amount);
    }

    /// Takes without blocking or validation; the caller guards
    /// availability.
    pub fn decrease(&self, resource: ResourceId, amount: i64) {
        self.kernel.borrow_mut().resource_decrease(resource, amount);
    }

    pub fn amount(&self, resource: ResourceId) -> i64 {
        self.kernel.borrow().resource_amount(resource)
    }

    pub fn add_signal(&self, name: &str) -> SignalId {
        self.kernel.borrow_mut().add_signal(name.to_string())
    }

    /// Parks until the next `notify`. A notify issued while nobody waits
    /// is lost; callers re-check their condition in a loop.
    pub async fn wait(&self, signal: SignalId) {
        self.suspend(Event::SignalWait { signal }).await;
    }

    /// Wakes every process currently parked on the signal, at the current
    /// time.
    pub fn notify(&self, signal: SignalId) {
        self.kernel.borrow_mut().signal_notify(signal);
    }

    fn bound(&self, channel: Option<ChannelId>, port: &str) -> ChannelId {
        match channel {
            Some(c) => c,
            None => panic!("operation on unbound port '{}'", port),
        }
    }

    fn suspend(&self, event: Event) -> Suspend {
        Suspend {
            kernel: Rc::clone(&self.kernel),
            event: Some(event),
        }
    }
}

/// Leaf future of every simulation primitive. The first poll deposits the
/// event in the current process's slot and suspends; the kernel dispatches
/// it, later deposits a result and re-enqueues the process, and the second
/// poll takes the result.
struct Suspend {
    kernel: Rc<RefCell<Kernel>>,
    event: Option<Event>,
}

impl Future for Suspend {
    type Output = EventResult;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<EventResult> {
        let this = &mut *self;
        let mut kernel = this.kernel.borrow_mut();
        let pid = kernel.current;
        if let Some(event) = this.event.take() {
            let slot = &mut kernel.processes[pid.0];
            debug_assert!(slot.event.is_none(), "event already pending");
            slot.event = Some(event);
            Poll::Pending
        } else {
            match kernel.processes[pid.0].result.take() {
                Some(result) => Poll::Ready(result),
                None => panic!("simulation primitive polled by a foreign executor"),
            }
        }
    }
}
