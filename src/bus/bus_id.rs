// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus instance identifier.

use std::fmt;

use uuid::Uuid;

/// Unique identifier of a [`ListenerBus`](crate::ListenerBus) instance.
///
/// Every bus gets a random v4 UUID at construction. It appears in the
/// bus's log records so that output from several buses in one process
/// (for example one per application context in tests) can be told apart.
///
/// # Examples
///
/// ```
/// use listener_bus::ListenerBus;
///
/// let a = ListenerBus::new();
/// let b = ListenerBus::new();
/// assert_ne!(a.id(), b.id());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(Uuid);

impl BusId {
    /// Creates a new random bus identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BusId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusId({})", self.short())
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl BusId {
    // First 8 hex digits are enough to tell buses apart in logs.
    fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}
