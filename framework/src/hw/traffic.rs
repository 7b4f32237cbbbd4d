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

//! Synthetic traffic: sources inject packets into a mesh's local ports,
//! sinks record what comes out. Random sources draw from a seeded
//! xoshiro generator, so runs are reproducible.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;
use rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::hw::mesh::{MeshCoord, Packet};
use crate::ports::{InPort, OutPort};
use crate::process::BoxedProcess;
use crate::report::SharedReporter;
use crate::sim::{Actor, Sim};
use crate::Time;

#[derive(Clone, Debug)]
pub enum TrafficPattern {
    /// One packet to `dest` every `period` ticks.
    Periodic { period: Time, dest: MeshCoord },
    /// Uniform random inter-arrival times and destinations.
    Random {
        min_interval: Time,
        max_interval: Time,
        dests: Vec<MeshCoord>,
        seed: u64,
    },
}

pub struct PacketSource {
    pub out: OutPort<Packet>,
    name: String,
    coord: MeshCoord,
    pattern: TrafficPattern,
    count: u64,
    reporter: Option<SharedReporter>,
}

impl PacketSource {
    pub fn new(coord: MeshCoord, pattern: TrafficPattern, count: u64) -> Self {
        let name = format!("source{}", coord);
        PacketSource {
            out: OutPort::new(format!("{}.out", name)),
            name,
            coord,
            pattern,
            count,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }
}

impl Actor for PacketSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, sim: Sim) -> BoxedProcess {
        let this = *self;
        Box::pin(async move {
            let seed = match &this.pattern {
                TrafficPattern::Random { seed, .. } => *seed,
                TrafficPattern::Periodic { .. } => 0,
            };
            let mut rng: Box<dyn RngCore> = Box::new(Xoshiro256StarStar::seed_from_u64(seed));
            for payload in 0..this.count {
                let (wait, dest) = match &this.pattern {
                    TrafficPattern::Periodic { period, dest } => (*period, *dest),
                    TrafficPattern::Random {
                        min_interval,
                        max_interval,
                        dests,
                        ..
                    } => {
                        let wait = rng.gen_range(*min_interval..=*max_interval);
                        let dest = dests[rng.gen_range(0..dests.len())];
                        (wait, dest)
                    }
                };
                sim.sleep(wait).await;
                let packet = Packet {
                    src: this.coord,
                    dest,
                    injected_at: sim.now(),
                    nr_hops: 0,
                    payload,
                };
                if let Some(reporter) = &this.reporter {
                    reporter
                        .borrow_mut()
                        .packet_sent(sim.now(), this.coord, &packet);
                }
                sim.send(&this.out, packet).await;
            }
        })
    }
}

pub struct PacketSink {
    pub input: InPort<Packet>,
    name: String,
    coord: MeshCoord,
    received: Rc<RefCell<Vec<(Time, Packet)>>>,
    reporter: Option<SharedReporter>,
}

impl PacketSink {
    pub fn new(coord: MeshCoord) -> Self {
        let name = format!("sink{}", coord);
        PacketSink {
            input: InPort::new(format!("{}.in", name)),
            name,
            coord,
            received: Rc::new(RefCell::new(Vec::new())),
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Arrival log handle; clone before handing the sink to the
    /// simulation.
    pub fn received(&self) -> Rc<RefCell<Vec<(Time, Packet)>>> {
        Rc::clone(&self.received)
    }
}

impl Actor for PacketSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, sim: Sim) -> BoxedProcess {
        let this = *self;
        Box::pin(async move {
            loop {
                let packet = sim.recv(&this.input).await;
                if let Some(reporter) = &this.reporter {
                    reporter
                        .borrow_mut()
                        .packet_received(sim.now(), this.coord, &packet);
                }
                this.received.borrow_mut().push((sim.now(), packet));
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub packets: usize,
    pub min: Time,
    pub max: Time,
    pub mean: f64,
}

/// End-to-end latency over a sink's arrival log.
pub fn latency_summary(records: &[(Time, Packet)]) -> Option<LatencySummary> {
    if records.is_empty() {
        return None;
    }
    let latencies: Vec<Time> = records
        .iter()
        .map(|(arrived, p)| arrived - p.injected_at)
        .collect();
    let min = *latencies.iter().min()?;
    let max = *latencies.iter().max()?;
    let mean = latencies.iter().sum::<Time>() as f64 / latencies.len() as f64;
    Some(LatencySummary {
        packets: records.len(),
        min,
        max,
        mean,
    })
}
