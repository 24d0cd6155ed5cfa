/*!

The interface every sub-model implements.

A module names the event kinds it wants; the scheduler only ever calls `run` with one of those.
Anything a module wants to happen to a unit goes through the unit's change requests, and
anything it wants to happen to a zone goes through the zone list's pending foci, so that no
module sees another's effects before the day boundary.

*/

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
};
use std::fmt::Display;

pub trait SimModule: Display {
    /// A short, unique, human-readable name.
    fn name(&self) -> &'static str;

    fn events_listened_for(&self) -> &'static [EventKind];

    fn is_listening_for(&self, kind: EventKind) -> bool {
        self.events_listened_for().contains(&kind)
    }

    /// Handles one event. New events pushed to `queue` are handled later the same day.
    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue);

    /// Forgets everything accumulated during an iteration.
    fn reset(&mut self) {}

    /// Whether the module is holding control actions it has not carried out yet.
    fn has_pending_actions(&self) -> bool {
        false
    }

    /// Whether the module is holding infections it has not reported yet.
    fn has_pending_infections(&self) -> bool {
        false
    }
}

/// Panics for an event that a module never declared interest in. This can only happen if the
/// dispatcher is broken.
#[track_caller]
pub(crate) fn unexpected_event(module: &dyn SimModule, event: &Event) -> ! {
    panic!(
        "{} has received a {:?} event, which it does not listen for",
        module.name(),
        event.kind()
    );
}
