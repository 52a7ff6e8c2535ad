// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`ListenerBus`](crate::ListenerBus).
///
/// Transitions are one-way: `Init -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusState {
    /// Constructed; events are buffered until `start`.
    Init,
    /// Dispatcher is running.
    Running,
    /// Dispatcher drained and exited; posts are discarded.
    Stopped,
}

impl BusState {
    /// Returns the lowercase state name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// Returns `true` while events are accepted (`Init` or `Running`).
    #[must_use]
    pub fn accepts_events(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`BusState`].
///
/// Writers serialize on the bus lifecycle lock; readers (`post`, `state()`)
/// only load.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: BusState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn load(&self) -> BusState {
        BusState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: BusState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}
