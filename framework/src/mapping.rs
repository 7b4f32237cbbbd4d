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

//! Placement of logical layers onto mesh tiles. The table is produced by
//! an external mapper and loaded here as data; this module only answers
//! queries against it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hw::mesh::MeshCoord;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingTable {
    /// Logical layer name to core id.
    layers: HashMap<String, u32>,
    /// Core id to mesh coordinate.
    cores: HashMap<u32, MeshCoord>,
    /// Layer name to the layers it feeds.
    routes: HashMap<String, Vec<String>>,
}

impl MappingTable {
    pub fn new(
        layers: HashMap<String, u32>,
        cores: HashMap<u32, MeshCoord>,
        routes: HashMap<String, Vec<String>>,
    ) -> Self {
        MappingTable {
            layers,
            cores,
            routes,
        }
    }

    /// The tile a layer is placed on, if it is mapped.
    pub fn coord_of(&self, layer: &str) -> Option<MeshCoord> {
        let core = self.layers.get(layer)?;
        self.cores.get(core).copied()
    }

    /// Layers this layer sends to.
    pub fn dest_layers_of(&self, layer: &str) -> &[String] {
        self.routes.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Other layers sharing this layer's core.
    pub fn siblings_of(&self, layer: &str) -> Vec<&str> {
        match self.layers.get(layer) {
            Some(core) => self
                .layers
                .iter()
                .filter(|(name, c)| *c == core && name.as_str() != layer)
                .map(|(name, _)| name.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        let mut layers = HashMap::new();
        layers.insert("input".to_string(), 0);
        layers.insert("hidden".to_string(), 1);
        layers.insert("bias".to_string(), 1);
        layers.insert("output".to_string(), 2);
        let mut cores = HashMap::new();
        cores.insert(0, MeshCoord::new(0, 0));
        cores.insert(1, MeshCoord::new(1, 0));
        cores.insert(2, MeshCoord::new(1, 1));
        let mut routes = HashMap::new();
        routes.insert("input".to_string(), vec!["hidden".to_string()]);
        routes.insert(
            "hidden".to_string(),
            vec!["output".to_string(), "bias".to_string()],
        );
        MappingTable::new(layers, cores, routes)
    }

    #[test]
    fn coords_follow_the_core_placement() {
        let t = table();
        assert_eq!(t.coord_of("input"), Some(MeshCoord::new(0, 0)));
        assert_eq!(t.coord_of("hidden"), Some(MeshCoord::new(1, 0)));
        assert_eq!(t.coord_of("missing"), None);
    }

    #[test]
    fn destinations_and_siblings() {
        let t = table();
        assert_eq!(t.dest_layers_of("input"), &["hidden".to_string()]);
        assert!(t.dest_layers_of("output").is_empty());
        assert_eq!(t.siblings_of("hidden"), vec!["bias"]);
        assert!(t.siblings_of("input").is_empty());
    }

    #[test]
    fn yaml_round_trip() {
        let t = table();
        let text = serde_yaml::to_string(&t).unwrap();
        let back: MappingTable = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.coord_of("output"), Some(MeshCoord::new(1, 1)));
    }
}
