// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The listener bus: queue, dispatcher and lifecycle.
//!
//! # Overview
//!
//! - [`ListenerBus`] - Handle producers post to and owners start/stop
//! - [`WeakListenerBus`] - Non-owning handle for listeners that post back
//! - [`BusState`] - `Init -> Running -> Stopped`
//! - [`BusMetrics`] - Accepted/processed/dropped counters
//! - [`BusId`] - Identifier that tags the bus's log records
//!
//! Internally, producers append to a single FIFO queue and one dedicated
//! thread takes events off it and fans each out to every listener before
//! taking the next.

mod bus_id;
mod dispatcher;
mod listener_bus;
mod metrics;
mod queue;
mod state;

pub use bus_id::BusId;
pub use listener_bus::{ListenerBus, WeakListenerBus};
pub use metrics::BusMetrics;
pub use state::BusState;
