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

//! Mesh topology: coordinates, directions, packets and the W x H router
//! grid builder. Coordinates grow eastward in x and northward in y;
//! routers on the rim leave their outward directions unbound.

use std::fmt;
use std::rc::Rc;
use std::cell::RefCell;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::hw::router::{RouterConfig, RouterStats, XYRouter};
use crate::ports::{InPort, OutPort};
use crate::sim::Simulation;
use crate::{Error, Time};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshCoord {
    pub x: u16,
    pub y: u16,
}

impl MeshCoord {
    pub fn new(x: u16, y: u16) -> Self {
        MeshCoord { x, y }
    }
}

impl fmt::Display for MeshCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// The five router directions. `Local` is the port toward the tile's own
/// core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshDir {
    North,
    East,
    South,
    West,
    Local,
}

impl MeshDir {
    pub const ALL: [MeshDir; 5] = [
        MeshDir::North,
        MeshDir::East,
        MeshDir::South,
        MeshDir::West,
        MeshDir::Local,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> MeshDir {
        Self::ALL[index]
    }

    pub fn opposite(self) -> MeshDir {
        match self {
            MeshDir::North => MeshDir::South,
            MeshDir::East => MeshDir::West,
            MeshDir::South => MeshDir::North,
            MeshDir::West => MeshDir::East,
            MeshDir::Local => MeshDir::Local,
        }
    }
}

impl fmt::Display for MeshDir {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match self {
            MeshDir::North => 'N',
            MeshDir::East => 'E',
            MeshDir::South => 'S',
            MeshDir::West => 'W',
            MeshDir::Local => 'L',
        };
        write!(f, "{}", c)
    }
}

/// What travels through the mesh. The payload is opaque to the fabric.
#[derive(Clone, Debug)]
pub struct Packet {
    pub src: MeshCoord,
    pub dest: MeshCoord,
    /// Set by the source at injection; sinks derive latency from it.
    pub injected_at: Time,
    /// Incremented by every router the packet enters.
    pub nr_hops: u32,
    pub payload: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshConfig {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub router: RouterConfig,
}

/// A wired grid of routers. Neighbor links are connected at build time;
/// the local ports stay open for sources, sinks and cores. `spawn`
/// consumes the routers into the simulation, after which only the stats
/// handles remain.
pub struct Mesh {
    width: u16,
    height: u16,
    routers: Vec<Option<XYRouter>>,
    stats: Vec<Rc<RefCell<RouterStats>>>,
}

impl Mesh {
    pub fn build(sim: &mut Simulation, config: &MeshConfig) -> Result<Mesh, Error> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::InvalidSpec(format!(
                "degenerate mesh {}x{}",
                config.width, config.height
            )));
        }
        let routers: Vec<XYRouter> = (0..config.height)
            .cartesian_product(0..config.width)
            .map(|(y, x)| XYRouter::new(MeshCoord::new(x, y), config.router.clone()))
            .collect();
        let index = |c: MeshCoord| (c.y as usize) * (config.width as usize) + c.x as usize;
        for y in 0..config.height {
            for x in 0..config.width {
                let here = MeshCoord::new(x, y);
                if x + 1 < config.width {
                    let east = MeshCoord::new(x + 1, y);
                    sim.connect(
                        routers[index(here)].out_port(MeshDir::East),
                        routers[index(east)].in_port(MeshDir::West),
                    )?;
                    sim.connect(
                        routers[index(east)].out_port(MeshDir::West),
                        routers[index(here)].in_port(MeshDir::East),
                    )?;
                }
                if y + 1 < config.height {
                    let north = MeshCoord::new(x, y + 1);
                    sim.connect(
                        routers[index(here)].out_port(MeshDir::North),
                        routers[index(north)].in_port(MeshDir::South),
                    )?;
                    sim.connect(
                        routers[index(north)].out_port(MeshDir::South),
                        routers[index(here)].in_port(MeshDir::North),
                    )?;
                }
            }
        }
        let stats = routers.iter().map(|r| r.stats()).collect();
        Ok(Mesh {
            width: config.width,
            height: config.height,
            routers: routers.into_iter().map(Some).collect(),
            stats,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn coords(&self) -> impl Iterator<Item = MeshCoord> {
        (0..self.height)
            .cartesian_product(0..self.width)
            .map(|(y, x)| MeshCoord::new(x, y))
    }

    fn index(&self, coord: MeshCoord) -> Result<usize, Error> {
        if coord.x >= self.width || coord.y >= self.height {
            return Err(Error::InvalidCoordinate(format!(
                "{} outside {}x{} mesh",
                coord, self.width, self.height
            )));
        }
        Ok((coord.y as usize) * (self.width as usize) + coord.x as usize)
    }

    fn router(&self, coord: MeshCoord) -> Result<&XYRouter, Error> {
        let index = self.index(coord)?;
        match &self.routers[index] {
            Some(router) => Ok(router),
            None => panic!("router {} already spawned", coord),
        }
    }

    /// The router's input from its tile; connect a source's output here.
    /// Coordinates outside the grid are a spec error, not a panic.
    pub fn local_in(&self, coord: MeshCoord) -> Result<&InPort<Packet>, Error> {
        Ok(self.router(coord)?.in_port(MeshDir::Local))
    }

    /// The router's output toward its tile; connect a sink's input here.
    pub fn local_out(&self, coord: MeshCoord) -> Result<&OutPort<Packet>, Error> {
        Ok(self.router(coord)?.out_port(MeshDir::Local))
    }

    /// Hands every router to the simulation. Local ports left unbound
    /// never fire.
    pub fn spawn(&mut self, sim: &mut Simulation) {
        for slot in self.routers.iter_mut() {
            if let Some(router) = slot.take() {
                sim.add_actor(Box::new(router));
            }
        }
    }

    pub fn stats(&self, coord: MeshCoord) -> Rc<RefCell<RouterStats>> {
        match self.index(coord) {
            Ok(index) => Rc::clone(&self.stats[index]),
            Err(err) => panic!("{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_invert_cleanly() {
        for dir in MeshDir::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(MeshDir::from_index(dir.index()), dir);
        }
    }

    #[test]
    fn a_2x2_mesh_wires_eight_neighbor_channels() {
        let mut sim = Simulation::new();
        let mesh = Mesh::build(&mut sim, &MeshConfig {
            width: 2,
            height: 2,
            router: RouterConfig::default(),
        })
        .unwrap();
        // 4 bidirectional neighbor links = 8 channels
        assert_eq!(sim.graph().edge_count(), 8);
        assert_eq!(mesh.coords().count(), 4);
        // rim ports stay open
        assert!(!mesh.local_in(MeshCoord::new(0, 0)).unwrap().is_bound());
    }

    #[test]
    fn local_ports_outside_the_grid_are_rejected() {
        let mut sim = Simulation::new();
        let mesh = Mesh::build(&mut sim, &MeshConfig {
            width: 2,
            height: 2,
            router: RouterConfig::default(),
        })
        .unwrap();
        assert!(matches!(
            mesh.local_in(MeshCoord::new(5, 0)),
            Err(Error::InvalidCoordinate(_))
        ));
        assert!(matches!(
            mesh.local_out(MeshCoord::new(0, 2)),
            Err(Error::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn degenerate_meshes_are_rejected() {
        let mut sim = Simulation::new();
        let result = Mesh::build(&mut sim, &MeshConfig {
            width: 0,
            height: 3,
            router: RouterConfig::default(),
        });
        assert!(matches!(result, Err(Error::InvalidSpec(_))));
    }
}
