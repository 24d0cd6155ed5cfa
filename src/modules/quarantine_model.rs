/*!

Quarantines a unit the day it is detected.

*/

use crate::{
    HashSet,
    context::Context,
    event::{Event, EventKind, EventQueue},
    module::{SimModule, unexpected_event},
    unit::{UnitId, UnitState},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::Detection];

#[derive(Default)]
pub struct QuarantineModel {
    quarantined: HashSet<UnitId>,
}

impl QuarantineModel {
    #[must_use]
    pub fn new() -> Self {
        QuarantineModel::default()
    }
}

impl SimModule for QuarantineModel {
    fn name(&self) -> &'static str {
        "quarantine-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::Detection { unit, day } = *event else {
            unexpected_event(self, event);
        };
        if context.units()[unit].state() == UnitState::Destroyed || !self.quarantined.insert(unit) {
            return;
        }
        context.units_mut()[unit].quarantine();
        queue.push(Event::Quarantine { unit, day });
    }

    fn reset(&mut self) {
        self.quarantined.clear();
    }
}

impl Display for QuarantineModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::unit_list_at;

    #[test]
    fn quarantines_once() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let mut model = QuarantineModel::new();
        let mut queue = EventQueue::new();
        let detection = Event::Detection { unit: UnitId(0), day: 2 };
        model.run(&mut context, &detection, &mut queue);
        model.run(&mut context, &detection, &mut queue);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(Event::Quarantine { unit: UnitId(0), day: 2 }));

        context.units_mut().step_all();
        assert!(context.units()[UnitId(0)].is_quarantined());
    }
}
