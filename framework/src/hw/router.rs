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

//! Dimension-ordered wormhole router.
//!
//! One actor per tile. Each bound input direction runs a link process that
//! pulls packets off the wire into a per-direction FIFO; each bound output
//! direction runs a link process that drains its FIFO onto the wire. The
//! root process is the crossbar switch: it scans the input FIFOs round
//! robin, resuming one past the last direction it serviced, pays the
//! arbitration delay for every packet it actually moves, and parks on the
//! router's work signal when nothing can move.
//!
//! Wire latency is modeled on the receive side of every link only; the
//! send side transfers in zero time. Routing is X first, then Y.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::hw::mesh::{MeshCoord, MeshDir, Packet};
use crate::ports::{InPort, OutPort};
use crate::process::BoxedProcess;
use crate::report::SharedReporter;
use crate::sim::{Actor, Sim};
use crate::Time;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Input and output FIFO depth, in packets.
    pub fifo_depth: usize,
    /// Arbitration delay paid per switched packet.
    pub switch_delay: Time,
    /// Wire latency of a neighbor link, modeled at the receiving router.
    pub link_receive_delay: Time,
    /// Wire latency of the tile-local link.
    pub local_receive_delay: Time,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            fifo_depth: 4,
            switch_delay: 1,
            link_receive_delay: 2,
            local_receive_delay: 1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RouterStats {
    /// Packets accepted per input direction.
    pub in_packets: [u64; 5],
    /// Packets emitted per output direction.
    pub out_packets: [u64; 5],
    /// Time each input link spent receiving, including rendezvous waits.
    pub in_busy: [Time; 5],
    /// Time each output link spent sending, including backpressure stalls.
    pub out_busy: [Time; 5],
    /// Packets moved through the crossbar.
    pub switched: u64,
    /// Total time packets sat between input FIFO entry and the crossbar.
    pub transit_time: Time,
}

/// Picks the output direction for a packet at `at` heading to `dest`:
/// x is corrected first, then y.
pub fn xy_route(at: MeshCoord, dest: MeshCoord) -> MeshDir {
    if dest.x > at.x {
        MeshDir::East
    } else if dest.x < at.x {
        MeshDir::West
    } else if dest.y > at.y {
        MeshDir::North
    } else if dest.y < at.y {
        MeshDir::South
    } else {
        MeshDir::Local
    }
}

pub struct XYRouter {
    name: String,
    coord: MeshCoord,
    config: RouterConfig,
    in_ports: [InPort<Packet>; 5],
    out_ports: [OutPort<Packet>; 5],
    stats: Rc<RefCell<RouterStats>>,
    reporter: Option<SharedReporter>,
}

impl XYRouter {
    pub fn new(coord: MeshCoord, config: RouterConfig) -> Self {
        let name = format!("router{}", coord);
        let in_ports = MeshDir::ALL.map(|d| InPort::new(format!("{}.in.{}", name, d)));
        let out_ports = MeshDir::ALL.map(|d| OutPort::new(format!("{}.out.{}", name, d)));
        XYRouter {
            name,
            coord,
            config,
            in_ports,
            out_ports,
            stats: Rc::new(RefCell::new(RouterStats::default())),
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn coord(&self) -> MeshCoord {
        self.coord
    }

    pub fn in_port(&self, dir: MeshDir) -> &InPort<Packet> {
        &self.in_ports[dir.index()]
    }

    pub fn out_port(&self, dir: MeshDir) -> &OutPort<Packet> {
        &self.out_ports[dir.index()]
    }

    pub fn stats(&self) -> Rc<RefCell<RouterStats>> {
        Rc::clone(&self.stats)
    }
}

impl Actor for XYRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, sim: Sim) -> BoxedProcess {
        let this = *self;
        Box::pin(async move {
            let coord = this.coord;
            let config = this.config;
            let stats = this.stats;
            let reporter = this.reporter;
            let work = sim.add_signal(&format!("{}.work", this.name));

            let in_fifos: Vec<Buffer<(Packet, Time)>> = MeshDir::ALL
                .iter()
                .map(|d| {
                    Buffer::new(
                        &sim,
                        &format!("{}.fifo.in.{}", this.name, d),
                        config.fifo_depth,
                    )
                })
                .collect();
            let out_fifos: Vec<Buffer<Packet>> = MeshDir::ALL
                .iter()
                .map(|d| {
                    Buffer::new(
                        &sim,
                        &format!("{}.fifo.out.{}", this.name, d),
                        config.fifo_depth,
                    )
                })
                .collect();
            let out_bound = MeshDir::ALL.map(|d| this.out_ports[d.index()].is_bound());

            for (dir, port) in MeshDir::ALL.into_iter().zip(this.in_ports) {
                if !port.is_bound() {
                    continue;
                }
                let delay = if dir == MeshDir::Local {
                    config.local_receive_delay
                } else {
                    config.link_receive_delay
                };
                sim.spawn(
                    &format!("{}.in.{}", this.name, dir),
                    in_link(
                        sim.clone(),
                        port,
                        delay,
                        dir,
                        in_fifos[dir.index()].clone(),
                        work,
                        Rc::clone(&stats),
                    ),
                );
            }
            for (dir, port) in MeshDir::ALL.into_iter().zip(this.out_ports) {
                if !port.is_bound() {
                    continue;
                }
                sim.spawn(
                    &format!("{}.out.{}", this.name, dir),
                    out_link(
                        sim.clone(),
                        port,
                        dir,
                        out_fifos[dir.index()].clone(),
                        work,
                        Rc::clone(&stats),
                    ),
                );
            }

            // crossbar
            let mut last = MeshDir::Local;
            loop {
                loop {
                    let mut progress = false;
                    for step in 1..=MeshDir::ALL.len() {
                        let dir = MeshDir::from_index((last.index() + step) % MeshDir::ALL.len());
                        let dest = match in_fifos[dir.index()].peek() {
                            Some(entry) => entry.0.dest,
                            None => continue,
                        };
                        let out = xy_route(coord, dest);
                        if !out_bound[out.index()] {
                            panic!(
                                "router{}: no {} output for a packet to {}",
                                coord, out, dest
                            );
                        }
                        if out_fifos[out.index()].is_full() {
                            continue;
                        }
                        sim.sleep(config.switch_delay).await;
                        let (packet, queued_at) = in_fifos[dir.index()].pop();
                        {
                            let mut s = stats.borrow_mut();
                            s.switched += 1;
                            s.transit_time += sim.now() - queued_at;
                        }
                        trace!(
                            "t={} router{} {}->{} packet {}->{}",
                            sim.now(),
                            coord,
                            dir,
                            out,
                            packet.src,
                            packet.dest
                        );
                        if let Some(reporter) = &reporter {
                            reporter.borrow_mut().transfer(sim.now(), coord, dir, out);
                        }
                        out_fifos[out.index()].push(packet);
                        last = dir;
                        progress = true;
                        break;
                    }
                    if !progress {
                        break;
                    }
                }
                sim.wait(work).await;
            }
        })
    }
}

async fn in_link(
    sim: Sim,
    port: InPort<Packet>,
    delay: Time,
    dir: MeshDir,
    fifo: Buffer<(Packet, Time)>,
    work: crate::SignalId,
    stats: Rc<RefCell<RouterStats>>,
) {
    loop {
        fifo.request_write().await;
        let started = sim.now();
        let mut packet = sim.recv_with(&port, 0, delay, true).await;
        packet.nr_hops += 1;
        {
            let mut s = stats.borrow_mut();
            s.in_packets[dir.index()] += 1;
            s.in_busy[dir.index()] += sim.now() - started;
        }
        fifo.write((packet, sim.now()));
        fifo.release_write();
        sim.notify(work);
    }
}

async fn out_link(
    sim: Sim,
    port: OutPort<Packet>,
    dir: MeshDir,
    fifo: Buffer<Packet>,
    work: crate::SignalId,
    stats: Rc<RefCell<RouterStats>>,
) {
    loop {
        fifo.request_read().await;
        let packet = fifo.read();
        let started = sim.now();
        sim.send(&port, packet).await;
        fifo.release_read();
        {
            let mut s = stats.borrow_mut();
            s.out_packets[dir.index()] += 1;
            s.out_busy[dir.index()] += sim.now() - started;
        }
        sim.notify(work);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Simulation, Time};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn routing_corrects_x_before_y() {
        let at = MeshCoord::new(1, 1);
        assert_eq!(xy_route(at, MeshCoord::new(3, 0)), MeshDir::East);
        assert_eq!(xy_route(at, MeshCoord::new(0, 2)), MeshDir::West);
        assert_eq!(xy_route(at, MeshCoord::new(1, 2)), MeshDir::North);
        assert_eq!(xy_route(at, MeshCoord::new(1, 0)), MeshDir::South);
        assert_eq!(xy_route(at, at), MeshDir::Local);
    }

    /// Two packets arriving simultaneously and leaving through the same
    /// output serialize on the crossbar: the second departs one
    /// arbitration delay after the first, and the scan picks North before
    /// South on the first pass.
    #[test]
    fn simultaneous_arrivals_serialize_on_the_switch() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut sim = Simulation::new();
        let s = sim.sim();
        let config = RouterConfig {
            fifo_depth: 4,
            switch_delay: 2,
            link_receive_delay: 1,
            local_receive_delay: 0,
        };
        let switch_delay = config.switch_delay;
        let router = XYRouter::new(MeshCoord::new(0, 1), config);

        let from_north = OutPort::new("north_feeder.out");
        let from_south = OutPort::new("south_feeder.out");
        let east_in = InPort::new("east_probe.in");
        sim.connect(&from_north, router.in_port(MeshDir::North)).unwrap();
        sim.connect(&from_south, router.in_port(MeshDir::South)).unwrap();
        sim.connect(router.out_port(MeshDir::East), &east_in).unwrap();
        sim.add_actor(Box::new(router));

        let arrivals: Rc<RefCell<Vec<(Time, u64)>>> = Rc::new(RefCell::new(Vec::new()));
        let packet = |payload| Packet {
            src: MeshCoord::new(0, 1),
            dest: MeshCoord::new(1, 1),
            injected_at: 0,
            nr_hops: 0,
            payload,
        };
        {
            let s = s.clone();
            sim.add_process("north_feeder", async move {
                s.send(&from_north, packet(1)).await;
            });
        }
        {
            let s = s.clone();
            sim.add_process("south_feeder", async move {
                s.send(&from_south, packet(2)).await;
            });
        }
        {
            let s = s.clone();
            let arrivals = Rc::clone(&arrivals);
            sim.add_process("east_probe", async move {
                for _ in 0..2 {
                    let p = s.recv(&east_in).await;
                    arrivals.borrow_mut().push((s.now(), p.payload));
                }
            });
        }
        sim.run();

        let arrivals = arrivals.borrow();
        assert_eq!(arrivals.len(), 2);
        assert_eq!(arrivals[0].1, 1, "north must win the first scan");
        assert_eq!(arrivals[1].1, 2);
        assert!(
            arrivals[1].0 - arrivals[0].0 >= switch_delay,
            "second packet left only {} after the first",
            arrivals[1].0 - arrivals[0].0
        );
    }

    #[test]
    fn hop_counts_accumulate_through_the_fabric() {
        use crate::hw::mesh::{Mesh, MeshConfig};
        let mut sim = Simulation::new();
        let s = sim.sim();
        let mut mesh = Mesh::build(
            &mut sim,
            &MeshConfig {
                width: 2,
                height: 2,
                router: RouterConfig::default(),
            },
        )
        .unwrap();
        let src_out = OutPort::new("src.out");
        let sink_in = InPort::new("sink.in");
        sim.connect(&src_out, mesh.local_in(MeshCoord::new(0, 0)).unwrap())
            .unwrap();
        sim.connect(mesh.local_out(MeshCoord::new(1, 1)).unwrap(), &sink_in)
            .unwrap();
        mesh.spawn(&mut sim);

        let got: Rc<RefCell<Vec<Packet>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let s = s.clone();
            sim.add_process("src", async move {
                for payload in 0..3u64 {
                    let packet = Packet {
                        src: MeshCoord::new(0, 0),
                        dest: MeshCoord::new(1, 1),
                        injected_at: s.now(),
                        nr_hops: 0,
                        payload,
                    };
                    s.send(&src_out, packet).await;
                    s.sleep(10).await;
                }
            });
        }
        {
            let s = s.clone();
            let got = Rc::clone(&got);
            sim.add_process("sink", async move {
                for _ in 0..3 {
                    let p = s.recv(&sink_in).await;
                    got.borrow_mut().push(p);
                }
            });
        }
        let summary = sim.run();
        assert!(summary.time > 0);

        let got = got.borrow();
        assert_eq!(got.len(), 3);
        for (i, p) in got.iter().enumerate() {
            assert_eq!(p.payload, i as u64, "packets must stay in order");
            // (0,0) local in, (1,0) through, (1,1) local out
            assert_eq!(p.nr_hops, 3);
        }
        let origin = mesh.stats(MeshCoord::new(0, 0));
        let origin = origin.borrow();
        assert_eq!(origin.in_packets[MeshDir::Local.index()], 3);
        assert_eq!(origin.out_packets[MeshDir::East.index()], 3);
        assert_eq!(origin.switched, 3);
    }
}
