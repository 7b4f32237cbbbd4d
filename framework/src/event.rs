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

use std::any::Any;
use std::fmt;

use crate::channel::ChannelId;
use crate::process::ProcessId;
use crate::resource::ResourceId;
use crate::signal::SignalId;
use crate::Time;

/// The closed set of operations a process can suspend on. Each suspension
/// registers exactly one event; the dispatcher matches exhaustively, so a
/// new variant fails to compile until every consequence is spelled out.
pub(crate) enum Event {
    Sleep {
        until: Time,
    },
    Send {
        channel: ChannelId,
        message: Box<dyn Any>,
        ready: Time,
        transfer: Time,
    },
    Receive {
        channel: ChannelId,
        ready: Time,
        transfer: Time,
        ack: bool,
    },
    Select {
        channels: Vec<ChannelId>,
        ready: Time,
    },
    ResourceRequest {
        resource: ResourceId,
        amount: i64,
    },
    ProcessWait {
        process: ProcessId,
    },
    SignalWait {
        signal: SignalId,
    },
}

/// What a process observes when it resumes.
pub(crate) enum EventResult {
    Woken,
    Message(Box<dyn Any>),
    Selected {
        channel: ChannelId,
        message: Box<dyn Any>,
    },
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Sleep { until } => write!(f, "Sleep(until={})", until),
            Event::Send {
                channel,
                ready,
                transfer,
                ..
            } => write!(
                f,
                "Send(ch={}, ready={}, transfer={})",
                channel.0, ready, transfer
            ),
            Event::Receive {
                channel,
                ready,
                transfer,
                ack,
            } => write!(
                f,
                "Receive(ch={}, ready={}, transfer={}, ack={})",
                channel.0, ready, transfer, ack
            ),
            Event::Select { channels, ready } => write!(
                f,
                "Select(chs={:?}, ready={})",
                channels.iter().map(|c| c.0).collect::<Vec<_>>(),
                ready
            ),
            Event::ResourceRequest { resource, amount } => {
                write!(f, "ResourceRequest(res={}, amount={})", resource.0, amount)
            }
            Event::ProcessWait { process } => write!(f, "ProcessWait(pid={})", process.0),
            Event::SignalWait { signal } => write!(f, "SignalWait(sig={})", signal.0),
        }
    }
}

impl fmt::Debug for EventResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventResult::Woken => write!(f, "Woken"),
            EventResult::Message(_) => write!(f, "Message(..)"),
            EventResult::Selected { channel, .. } => write!(f, "Selected(ch={})", channel.0),
        }
    }
}
