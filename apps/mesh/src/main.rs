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

//! Drives a W x H wormhole mesh with the traffic described in a YAML
//! spec, then prints per-router utilization and per-sink latency. Without
//! a spec it runs a built-in 4x4 corner-to-corner exchange.

use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use framework::specs::{CoreSpec, NocSpec};
use framework::{
    latency_summary, read_spec, MappingTable, MeshCoord, MeshDir, MeshSpec, PacketSink,
    SharedReporter, Simulation, Time, TrafficSpec, VcdTracer,
};

fn usage() -> ! {
    println!("Usage: mesh [spec.yaml] [options]");
    println!("  --stop <time>      stop the run at this logical time");
    println!("  --vcd <file>       write a switch-activity trace");
    println!("  --dot <file>       dump the port wiring as graphviz");
    println!("  --mapping <file>   derive traffic from a layer mapping table");
    process::exit(0);
}

struct Options {
    spec: Option<PathBuf>,
    stop: Time,
    vcd: Option<PathBuf>,
    dot: Option<PathBuf>,
    mapping: Option<PathBuf>,
}

fn parse_args() -> Options {
    let mut options = Options {
        spec: None,
        stop: Time::MAX,
        vcd: None,
        dot: None,
        mapping: None,
    };
    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => usage(),
            "--stop" => {
                i += 1;
                options.stop = args
                    .get(i)
                    .and_then(|a| a.parse().ok())
                    .unwrap_or_else(|| usage());
            }
            "--vcd" => {
                i += 1;
                options.vcd = Some(PathBuf::from(args.get(i).unwrap_or_else(|| usage())));
            }
            "--dot" => {
                i += 1;
                options.dot = Some(PathBuf::from(args.get(i).unwrap_or_else(|| usage())));
            }
            "--mapping" => {
                i += 1;
                options.mapping = Some(PathBuf::from(args.get(i).unwrap_or_else(|| usage())));
            }
            other if !other.starts_with('-') && options.spec.is_none() => {
                options.spec = Some(PathBuf::from(other));
            }
            _ => usage(),
        }
        i += 1;
    }
    options
}

fn default_spec() -> MeshSpec {
    MeshSpec {
        width: 4,
        height: 4,
        router: Default::default(),
        traffic: vec![
            TrafficSpec {
                from: MeshCoord::new(0, 0),
                to: MeshCoord::new(3, 3),
                period: 10,
                count: 20,
            },
            TrafficSpec {
                from: MeshCoord::new(3, 3),
                to: MeshCoord::new(0, 0),
                period: 10,
                count: 20,
            },
            TrafficSpec {
                from: MeshCoord::new(3, 0),
                to: MeshCoord::new(0, 3),
                period: 15,
                count: 10,
            },
        ],
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let options = parse_args();

    let spec: MeshSpec = match &options.spec {
        Some(path) => read_spec(path)?,
        None => default_spec(),
    };

    let reporter: Option<SharedReporter> = match &options.vcd {
        Some(path) => {
            let file = fs::File::create(path)?;
            let tracer = VcdTracer::new(file, spec.width, spec.height)?;
            Some(Rc::new(RefCell::new(tracer)))
        }
        None => None,
    };

    let mut sim = Simulation::new();
    let mut mesh = spec.build(&mut sim)?;
    // a sink on every tile so no local output can stall
    let mut sinks = Vec::new();
    for coord in mesh.coords().collect::<Vec<_>>() {
        let mut sink = PacketSink::new(coord);
        if let Some(reporter) = &reporter {
            sink = sink.with_reporter(Rc::clone(reporter));
        }
        let received = sink.received();
        sim.connect(mesh.local_out(coord)?, &sink.input)?;
        sim.add_actor(Box::new(sink));
        sinks.push((coord, received));
    }
    let mut traffic = spec.traffic.clone();
    if let Some(path) = &options.mapping {
        let table: MappingTable = read_spec(path)?;
        traffic.extend(mapped_traffic(&table));
    }
    for stream in &traffic {
        stream.build(&mut sim, &mesh)?;
    }
    mesh.spawn(&mut sim);

    if let Some(path) = &options.dot {
        write_dot(&sim, path)?;
    }

    let summary = sim.run_until(options.stop, u64::MAX);
    sim.log_deadlock_report();
    println!(
        "run finished at t={} after {} events",
        summary.time, summary.events
    );

    println!("\nrouter utilization:");
    for coord in mesh.coords() {
        let stats = mesh.stats(coord);
        let stats = stats.borrow();
        if stats.switched == 0 {
            continue;
        }
        let avg_transit = stats.transit_time as f64 / stats.switched as f64;
        let busiest = MeshDir::ALL
            .iter()
            .max_by_key(|d| stats.in_busy[d.index()])
            .copied()
            .unwrap_or(MeshDir::Local);
        println!(
            "  {}: {} switched, avg transit {:.1}, busiest input {} ({} ticks)",
            coord,
            stats.switched,
            avg_transit,
            busiest,
            stats.in_busy[busiest.index()],
        );
    }

    println!("\nsink latency:");
    for (coord, received) in &sinks {
        let records = received.borrow();
        if let Some(lat) = latency_summary(&records) {
            println!(
                "  {}: {} packets, min {} max {} mean {:.1}",
                coord, lat.packets, lat.min, lat.max, lat.mean
            );
        }
    }
    Ok(())
}

/// One periodic stream per mapped layer-to-layer route. Streams between
/// layers sharing a tile stay on the local loopback and are kept; the
/// mapper is expected to have minimized them already.
fn mapped_traffic(table: &MappingTable) -> Vec<TrafficSpec> {
    let mut streams = Vec::new();
    for layer in table.layers() {
        let from = match table.coord_of(layer) {
            Some(coord) => coord,
            None => continue,
        };
        for dest in table.dest_layers_of(layer) {
            if let Some(to) = table.coord_of(dest) {
                streams.push(TrafficSpec {
                    from,
                    to,
                    period: 10,
                    count: 20,
                });
            }
        }
    }
    streams
}

fn write_dot(sim: &Simulation, path: &Path) -> anyhow::Result<()> {
    let mut file = fs::File::create(path)?;
    sim.write_dot(&mut file)?;
    log::info!("wiring written to {}", path.display());
    Ok(())
}
