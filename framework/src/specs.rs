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

//! Declarative hardware specs. A spec is plain serde-loadable data; its
//! `build` wires actors into a simulation before the run. The YAML shape
//! mirrors the config types one to one.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::hw::mesh::{Mesh, MeshConfig, MeshCoord};
use crate::hw::router::RouterConfig;
use crate::hw::traffic::{PacketSource, TrafficPattern};
use crate::sim::Simulation;
use crate::Time;

/// A communication fabric that can be instantiated into a simulation.
pub trait NocSpec {
    fn build(&self, sim: &mut Simulation) -> anyhow::Result<Mesh>;
}

/// Something occupying a mesh tile, wired to the tile's local ports.
pub trait CoreSpec {
    fn name(&self) -> String;
    fn build(&self, sim: &mut Simulation, mesh: &Mesh) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshSpec {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub traffic: Vec<TrafficSpec>,
}

impl NocSpec for MeshSpec {
    fn build(&self, sim: &mut Simulation) -> anyhow::Result<Mesh> {
        let mesh = Mesh::build(
            sim,
            &MeshConfig {
                width: self.width,
                height: self.height,
                router: self.router.clone(),
            },
        )?;
        Ok(mesh)
    }
}

/// A periodic packet stream from one tile to another.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrafficSpec {
    pub from: MeshCoord,
    pub to: MeshCoord,
    pub period: Time,
    pub count: u64,
}

impl CoreSpec for TrafficSpec {
    fn name(&self) -> String {
        format!("source{}", self.from)
    }

    fn build(&self, sim: &mut Simulation, mesh: &Mesh) -> anyhow::Result<()> {
        let source = PacketSource::new(
            self.from,
            TrafficPattern::Periodic {
                period: self.period,
                dest: self.to,
            },
            self.count,
        );
        let input = mesh.local_in(self.from)?;
        sim.connect(&source.out, input)
            .with_context(|| format!("wiring {}", self.name()))?;
        sim.add_actor(Box::new(source));
        Ok(())
    }
}

pub fn read_spec<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading spec {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing spec {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_spec_parses_with_defaults() {
        let spec: MeshSpec = serde_yaml::from_str(concat!(
            "width: 3\n",
            "height: 2\n",
            "traffic:\n",
            "  - from: { x: 0, y: 0 }\n",
            "    to: { x: 2, y: 1 }\n",
            "    period: 10\n",
            "    count: 5\n",
        ))
        .unwrap();
        assert_eq!(spec.width, 3);
        assert_eq!(spec.router.fifo_depth, RouterConfig::default().fifo_depth);
        assert_eq!(spec.traffic.len(), 1);
        assert_eq!(spec.traffic[0].to, MeshCoord::new(2, 1));
    }

    #[test]
    fn mesh_spec_builds_and_runs() {
        let spec: MeshSpec = serde_yaml::from_str(
            "width: 2\n\
             height: 1\n\
             router: { fifo_depth: 2, switch_delay: 1, link_receive_delay: 1, local_receive_delay: 1 }\n\
             traffic:\n\
               - { from: { x: 0, y: 0 }, to: { x: 1, y: 0 }, period: 4, count: 2 }\n",
        )
        .unwrap();
        let mut sim = Simulation::new();
        let mut mesh = spec.build(&mut sim).unwrap();
        use crate::hw::traffic::PacketSink;
        let sink = PacketSink::new(MeshCoord::new(1, 0));
        let received = sink.received();
        sim.connect(mesh.local_out(MeshCoord::new(1, 0)).unwrap(), &sink.input)
            .unwrap();
        for t in &spec.traffic {
            t.build(&mut sim, &mesh).unwrap();
        }
        mesh.spawn(&mut sim);
        sim.add_actor(Box::new(sink));
        sim.run();
        assert_eq!(received.borrow().len(), 2);
    }
}
