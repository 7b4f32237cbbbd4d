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

//! Observational callbacks. Traffic actors and routers report what they
//! do; a reporter records or renders it. Reporters never feed back into
//! scheduling.

use std::cell::RefCell;
use std::rc::Rc;

use crate::hw::mesh::{MeshCoord, MeshDir, Packet};
use crate::Time;

pub trait Reporter {
    fn packet_sent(&mut self, _time: Time, _at: MeshCoord, _packet: &Packet) {}
    fn packet_received(&mut self, _time: Time, _at: MeshCoord, _packet: &Packet) {}
    fn transfer(&mut self, _time: Time, _router: MeshCoord, _from: MeshDir, _to: MeshDir) {}
}

pub type SharedReporter = Rc<RefCell<dyn Reporter>>;

/// Discards everything.
pub struct NullReporter;

impl Reporter for NullReporter {}
