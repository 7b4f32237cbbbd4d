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

//! Logical-time simulation of spiking-network hardware: a cooperative
//! event kernel, rendezvous channels and synchronization primitives, and
//! a dimension-ordered wormhole mesh built on top of them.

mod buffer;
mod channel;
mod error;
mod event;
mod mapping;
mod ports;
mod process;
mod report;
mod resource;
mod scheduler;
mod signal;
mod sim;
mod vcd;

pub mod hw;
pub mod specs;

// Public types
// type to use for logical time
pub type Time = i64;

pub use crate::buffer::Buffer;
pub use crate::channel::ChannelId;
pub use crate::error::Error;
pub use crate::hw::mesh::{Mesh, MeshConfig, MeshCoord, MeshDir, Packet};
pub use crate::hw::router::{xy_route, RouterConfig, RouterStats, XYRouter};
pub use crate::hw::traffic::{
    latency_summary, LatencySummary, PacketSink, PacketSource, TrafficPattern,
};
pub use crate::mapping::MappingTable;
pub use crate::ports::{InPort, OutPort};
pub use crate::process::{BoxedProcess, ProcessId};
pub use crate::report::{NullReporter, Reporter, SharedReporter};
pub use crate::resource::ResourceId;
pub use crate::scheduler::{BlockedSend, RunSummary};
pub use crate::signal::SignalId;
pub use crate::sim::{Actor, Sim, Simulation};
pub use crate::specs::{read_spec, CoreSpec, MeshSpec, NocSpec, TrafficSpec};
pub use crate::vcd::VcdTracer;
