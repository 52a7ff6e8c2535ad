// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fault-isolated listener invocation.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::ListenerFailure;
use crate::event::ListenerEvent;

use super::Listener;

/// Delivers `event` to `listener`, capturing both returned errors and panics.
///
/// `AssertUnwindSafe` is used: a listener that panics while holding one of
/// its own locks may leave that state poisoned or inconsistent. The bus
/// itself holds no lock across this call.
pub(crate) fn invoke(
    listener: &dyn Listener,
    event: &ListenerEvent,
) -> Result<(), ListenerFailure> {
    match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ListenerFailure::Returned(err)),
        Err(payload) => Err(ListenerFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
