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

//! Bounded FIFO built from two counting resources: `items_filled` starts
//! at zero, `items_empty` at the capacity. The blocking protocol is
//! request/access/release on the matching resource pair; the non-blocking
//! `push`/`pop` move both counters in one step and assert availability, so
//! call sites mixing the two idioms on one buffer must guard with
//! [`Buffer::is_full`] or [`Buffer::count`] first.

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::resource::ResourceId;
use crate::sim::Sim;

pub struct Buffer<T> {
    sim: Sim,
    items: Rc<RefCell<VecDeque<T>>>,
    capacity: usize,
    items_filled: ResourceId,
    items_empty: ResourceId,
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Buffer {
            sim: self.sim.clone(),
            items: Rc::clone(&self.items),
            capacity: self.capacity,
            items_filled: self.items_filled,
            items_empty: self.items_empty,
        }
    }
}

impl<T> Buffer<T> {
    pub fn new(sim: &Sim, name: &str, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer '{}' with zero capacity", name);
        Buffer {
            sim: sim.clone(),
            items: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
            capacity,
            items_filled: sim.add_resource(&format!("{}.filled", name), 0),
            items_empty: sim.add_resource(&format!("{}.empty", name), capacity as i64),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_full(&self) -> bool {
        self.sim.amount(self.items_empty) == 0
    }

    pub fn is_empty(&self) -> bool {
        self.sim.amount(self.items_empty) == self.capacity as i64
    }

    /// Blocks until a slot is free; follow with `write` + `release_write`.
    pub async fn request_write(&self) {
        self.sim.request(self.items_empty, 1).await;
    }

    pub fn write(&self, item: T) {
        debug_assert!(self.items.borrow().len() < self.capacity);
        self.items.borrow_mut().push_back(item);
    }

    pub fn release_write(&self) {
        self.sim.increase(self.items_filled, 1);
    }

    /// Blocks until an item is present; follow with `read` + `release_read`.
    pub async fn request_read(&self) {
        self.sim.request(self.items_filled, 1).await;
    }

    pub fn read(&self) -> T {
        match self.items.borrow_mut().pop_front() {
            Some(item) => item,
            None => panic!("read from an empty buffer"),
        }
    }

    pub fn release_read(&self) {
        self.sim.increase(self.items_empty, 1);
    }

    /// Non-blocking insert; the buffer must not be full.
    pub fn push(&self, item: T) {
        assert!(!self.is_full(), "push into a full buffer");
        self.sim.decrease(self.items_empty, 1);
        self.items.borrow_mut().push_back(item);
        self.sim.increase(self.items_filled, 1);
    }

    /// Non-blocking remove; the buffer must not be empty.
    pub fn pop(&self) -> T {
        assert!(self.count() > 0, "pop from an empty buffer");
        self.sim.decrease(self.items_filled, 1);
        let item = match self.items.borrow_mut().pop_front() {
            Some(item) => item,
            None => panic!("pop raced with another reader"),
        };
        self.sim.increase(self.items_empty, 1);
        item
    }

    /// Borrows the head item in place. The borrow must not be held across
    /// an `await`.
    pub fn peek(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.items.borrow(), |q| q.front()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Simulation;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn nonblocking_push_pop_track_the_counters() {
        let sim = Simulation::new();
        let s = sim.sim();
        let buf: Buffer<u32> = Buffer::new(&s, "fifo", 2);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
        buf.push(1);
        buf.push(2);
        assert!(buf.is_full());
        assert_eq!(buf.count(), 2);
        assert_eq!(*buf.peek().unwrap(), 1);
        assert_eq!(buf.pop(), 1);
        assert_eq!(buf.pop(), 2);
        assert!(buf.is_empty());
        assert!(buf.peek().is_none());
    }

    #[test]
    #[should_panic(expected = "push into a full buffer")]
    fn push_past_capacity_is_fatal() {
        let sim = Simulation::new();
        let s = sim.sim();
        let buf: Buffer<u32> = Buffer::new(&s, "fifo", 1);
        buf.push(1);
        buf.push(2);
    }

    #[test]
    fn writer_blocks_when_the_buffer_is_full() {
        let mut sim = Simulation::new();
        let s = sim.sim();
        let buf: Buffer<u32> = Buffer::new(&s, "fifo", 2);
        let writes = Rc::new(RefCell::new(Vec::new()));
        {
            let s = s.clone();
            let buf = buf.clone();
            let writes = Rc::clone(&writes);
            sim.add_process("producer", async move {
                for i in 0..4u32 {
                    buf.request_write().await;
                    buf.write(i);
                    buf.release_write();
                    writes.borrow_mut().push(s.now());
                }
            });
        }
        {
            let s = s.clone();
            let buf = buf.clone();
            sim.add_process("consumer", async move {
                for i in 0..4u32 {
                    s.sleep(10).await;
                    buf.request_read().await;
                    assert_eq!(buf.read(), i);
                    buf.release_read();
                }
            });
        }
        sim.run();
        // first two writes fill the buffer at t=0, the rest wait for reads
        assert_eq!(*writes.borrow(), vec![0, 0, 10, 20]);
    }

    #[test]
    fn nonblocking_push_wakes_a_blocked_reader() {
        let mut sim = Simulation::new();
        let s = sim.sim();
        let buf: Buffer<u32> = Buffer::new(&s, "fifo", 2);
        let got = Rc::new(RefCell::new(None));
        {
            let buf = buf.clone();
            let got = Rc::clone(&got);
            sim.add_process("consumer", async move {
                buf.request_read().await;
                *got.borrow_mut() = Some(buf.read());
                buf.release_read();
            });
        }
        {
            let s = s.clone();
            let buf = buf.clone();
            sim.add_process("producer", async move {
                s.sleep(7).await;
                if !buf.is_full() {
                    buf.push(99);
                }
            });
        }
        sim.run();
        assert_eq!(*got.borrow(), Some(99));
        assert!(buf.is_empty());
    }
}
