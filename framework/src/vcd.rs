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

//! VCD trace sink. Declares one 3-bit wire per router showing the output
//! direction of the packet it last switched; logical time maps directly
//! to VCD timestamps. Write failures put the tracer into an error state
//! that logs once and swallows the rest, so a full disk never kills a
//! simulation.

use std::collections::HashMap;
use std::io;

use log::error;

use crate::hw::mesh::{MeshCoord, MeshDir};
use crate::report::Reporter;
use crate::Time;

const VCD_HEADER: &str = "mesh activity trace";
const TOP_MODULE: &str = "mesh";

pub struct VcdTracer<W: io::Write> {
    writer: vcd::Writer<W>,
    is_error_state: bool,
    id_map: HashMap<MeshCoord, vcd::IdCode>,
    last_stamp: Option<Time>,
}

impl<W: io::Write> VcdTracer<W> {
    pub fn new(sink: W, width: u16, height: u16) -> io::Result<Self> {
        let mut writer = vcd::Writer::new(sink);
        writer.comment(VCD_HEADER)?;
        writer.date(chrono::Utc::now().to_string().as_str())?;
        writer.timescale(1, vcd::TimescaleUnit::NS)?;
        writer.add_module(TOP_MODULE)?;
        let mut id_map = HashMap::new();
        for y in 0..height {
            for x in 0..width {
                let id = writer.add_wire(3, &format!("switch_{}_{}", x, y))?;
                id_map.insert(MeshCoord::new(x, y), id);
            }
        }
        writer.upscope()?;
        writer.enddefinitions()?;
        Ok(VcdTracer {
            writer,
            is_error_state: false,
            id_map,
            last_stamp: None,
        })
    }

    fn record(&mut self, time: Time, router: MeshCoord, to: MeshDir) {
        if self.is_error_state {
            return;
        }
        if let Err(err) = self.try_record(time, router, to) {
            self.is_error_state = true;
            error!("VCD writing failed with error {:?}", err);
        }
    }

    fn try_record(&mut self, time: Time, router: MeshCoord, to: MeshDir) -> io::Result<()> {
        let id = match self.id_map.get(&router) {
            Some(id) => *id,
            None => return Ok(()), // router outside the declared grid
        };
        if self.last_stamp != Some(time) {
            self.writer.timestamp(time.max(0) as u64)?;
            self.last_stamp = Some(time);
        }
        let index = to.index() as u8;
        let bits: Vec<vcd::Value> = (0..3)
            .rev()
            .map(|b| {
                if index & (1 << b) != 0 {
                    vcd::Value::V1
                } else {
                    vcd::Value::V0
                }
            })
            .collect();
        self.writer.change_vector(id, &bits)
    }
}

impl<W: io::Write> Reporter for VcdTracer<W> {
    fn transfer(&mut self, time: Time, router: MeshCoord, _from: MeshDir, to: MeshDir) {
        self.record(time, router, to);
    }
}
