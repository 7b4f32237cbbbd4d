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

//! Typed channel endpoints.
//!
//! Actors declare ports as public struct fields; the topology code wires an
//! `OutPort<T>` to an `InPort<T>` with [`Simulation::connect`], which is the
//! only place a channel is created. A port binds to exactly one channel for
//! its lifetime. Unbound ports are legal and simply never fire.
//!
//! [`Simulation::connect`]: crate::Simulation::connect

use std::cell::Cell;
use std::marker::PhantomData;

use crate::channel::ChannelId;

/// The receiving end of a channel, carrying messages of type `T`.
pub struct InPort<T> {
    name: String,
    channel: Cell<Option<ChannelId>>,
    _marker: PhantomData<T>,
}

/// The sending end of a channel, carrying messages of type `T`.
pub struct OutPort<T> {
    name: String,
    channel: Cell<Option<ChannelId>>,
    _marker: PhantomData<T>,
}

impl<T> InPort<T> {
    pub fn new(name: impl Into<String>) -> Self {
        InPort {
            name: name.into(),
            channel: Cell::new(None),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.channel.get().is_some()
    }

    pub(crate) fn channel(&self) -> Option<ChannelId> {
        self.channel.get()
    }

    pub(crate) fn bind(&self, channel: ChannelId) {
        self.channel.set(Some(channel));
    }
}

impl<T> OutPort<T> {
    pub fn new(name: impl Into<String>) -> Self {
        OutPort {
            name: name.into(),
            channel: Cell::new(None),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.channel.get().is_some()
    }

    pub(crate) fn channel(&self) -> Option<ChannelId> {
        self.channel.get()
    }

    pub(crate) fn bind(&self, channel: ChannelId) {
        self.channel.set(Some(channel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_start_unbound() {
        let input = InPort::<u32>::new("node.in");
        let output = OutPort::<u32>::new("node.out");
        assert!(!input.is_bound());
        assert!(!output.is_bound());
        assert_eq!(input.name(), "node.in");
        assert_eq!(output.name(), "node.out");
    }
}
