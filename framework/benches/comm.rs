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

use bencher::Bencher;
use bencher::{benchmark_group, benchmark_main};

use framework::{Buffer, InPort, OutPort, Simulation};

const MESSAGES: usize = 100000;

type Message = u64;
const MESSAGE_SIZE_BYTES: usize = std::mem::size_of::<Message>();

fn rendezvous(bench: &mut Bencher) {
    bench.iter(|| {
        let mut sim = Simulation::new();
        let s = sim.sim();
        let out = OutPort::new("producer.out");
        let input = InPort::new("consumer.in");
        sim.connect(&out, &input).unwrap();
        {
            let s = s.clone();
            sim.add_process("producer", async move {
                for i in 0..MESSAGES as Message {
                    s.send(&out, i).await;
                }
            });
        }
        sim.add_process("consumer", async move {
            for _ in 0..MESSAGES {
                let _ = s.recv(&input).await;
            }
        });
        sim.run();
    });
    bench.bytes = (MESSAGES * MESSAGE_SIZE_BYTES) as u64;
}

fn buffered_pipeline(bench: &mut Bencher) {
    bench.iter(|| {
        let mut sim = Simulation::new();
        let s = sim.sim();
        let fifo: Buffer<Message> = Buffer::new(&s, "fifo", 16);
        {
            let fifo = fifo.clone();
            sim.add_process("producer", async move {
                for i in 0..MESSAGES as Message {
                    fifo.request_write().await;
                    fifo.write(i);
                    fifo.release_write();
                }
            });
        }
        sim.add_process("consumer", async move {
            for _ in 0..MESSAGES {
                fifo.request_read().await;
                let _ = fifo.read();
                fifo.release_read();
            }
        });
        sim.run();
    });
    bench.bytes = (MESSAGES * MESSAGE_SIZE_BYTES) as u64;
}

benchmark_group!(benches, rendezvous, buffered_pipeline);
benchmark_main!(benches);
