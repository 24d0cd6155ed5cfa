/*!

Requests destruction of every detected unit whose production type has destruction parameters.

*/

use crate::{
    context::Context,
    event::{ControlReason, Event, EventKind, EventQueue},
    log::trace,
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    unit::UnitList,
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::Detection];

pub struct BasicDestructionModel {
    /// Destruction priority by production type.
    priorities: Vec<Option<u32>>,
}

impl BasicDestructionModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let mut priorities = vec![None; units.production_types().len()];
        for params in &scenario.production_types {
            if let (Some(destruction), Some(id)) = (&params.destruction, units.find_production_type(&params.name)) {
                priorities[id] = Some(destruction.priority);
            }
        }
        BasicDestructionModel { priorities }
    }
}

impl SimModule for BasicDestructionModel {
    fn name(&self) -> &'static str {
        "basic-destruction-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::Detection { unit, day } = *event else {
            unexpected_event(self, event);
        };
        let production_type = context.units()[unit].production_type();
        if let Some(Some(priority)) = self.priorities.get(production_type).copied() {
            trace!("requesting destruction of unit {} with priority {priority}", unit.index());
            queue.push(Event::RequestForDestruction {
                unit,
                day,
                reason: ControlReason::Detected,
                priority,
            });
        }
    }
}

impl Display for BasicDestructionModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} priorities={:?}>", self.name(), self.priorities)
    }
}
