/*!

Asks for a zone focus around every unit a successful trace finds, for the production types
configured with `zone_focus_on_trace`.

*/

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    unit::{UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::TraceResult];

pub struct TraceZoneFocusModel {
    /// Indexed by production type.
    focus_on_trace: Vec<bool>,
}

impl TraceZoneFocusModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let mut focus_on_trace = vec![false; units.production_types().len()];
        for params in scenario.production_types.iter().filter(|p| p.zone_focus_on_trace) {
            if let Some(id) = units.find_production_type(&params.name) {
                focus_on_trace[id] = true;
            }
        }
        TraceZoneFocusModel { focus_on_trace }
    }
}

impl SimModule for TraceZoneFocusModel {
    fn name(&self) -> &'static str {
        "trace-zone-focus-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::TraceResult { day, .. } = *event else {
            unexpected_event(self, event);
        };
        let Some(unit) = event.traced_unit() else {
            return;
        };
        let target = &context.units()[unit];
        if target.state() == UnitState::Destroyed {
            return;
        }
        if self.focus_on_trace.get(target.production_type()).copied().unwrap_or(false) {
            queue.push(Event::RequestForZoneFocus { unit, day });
        }
    }
}

impl Display for TraceZoneFocusModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} for production types {:?}>", self.name(), self.focus_on_trace)
    }
}
