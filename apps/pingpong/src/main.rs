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

//! The canonical two-process rendezvous: a producer sends numbered
//! messages on a period, a consumer acknowledges each one. Mostly useful
//! for eyeballing kernel traces.

use std::env;
use std::process;

use framework::{InPort, OutPort, Simulation, Time};

fn usage() -> ! {
    println!("Usage: pingpong [count [period]]");
    println!("  count   messages to exchange (default 10)");
    println!("  period  ticks between sends (default 4)");
    process::exit(0);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage();
    }
    let count: u64 = match args.get(1) {
        Some(a) => a.parse().unwrap_or_else(|_| usage()),
        None => 10,
    };
    let period: Time = match args.get(2) {
        Some(a) => a.parse().unwrap_or_else(|_| usage()),
        None => 4,
    };

    let mut sim = Simulation::new();
    let s = sim.sim();
    let out = OutPort::new("producer.out");
    let input = InPort::new("consumer.in");
    sim.connect(&out, &input)?;

    {
        let s = s.clone();
        sim.add_process("producer", async move {
            for i in 0..count {
                s.send(&out, i).await;
                log::debug!("t={} producer sent {}", s.now(), i);
                s.sleep(period).await;
            }
        });
    }
    {
        let s = s.clone();
        sim.add_process("consumer", async move {
            for i in 0..count {
                let got: u64 = s.recv(&input).await;
                log::debug!("t={} consumer got {}", s.now(), got);
                assert_eq!(got, i);
            }
        });
    }

    let summary = sim.run();
    sim.log_deadlock_report();
    println!(
        "{} messages in {} ticks, {} events processed",
        count, summary.time, summary.events
    );
    Ok(())
}
