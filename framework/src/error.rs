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

use std::fmt;

/// Errors raised while assembling a topology, before the simulation runs.
/// Protocol violations during a run (a second operation on a busy channel
/// side, transfer times on both ends of a rendezvous) are programming
/// errors and panic instead.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    PortAlreadyBound(String),
    InvalidCoordinate(String),
    InvalidSpec(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PortAlreadyBound(port) => {
                write!(f, "ERROR: port '{}' is already connected", port)
            }
            Self::InvalidCoordinate(what) => {
                write!(f, "ERROR: invalid mesh coordinate {}", what)
            }
            Self::InvalidSpec(what) => write!(f, "ERROR: invalid spec: {}", what),
        }
    }
}

// needed to allow `anyhow::Result` to accept our definition of errors; the
// apps and spec builders use `anyhow` throughout.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
