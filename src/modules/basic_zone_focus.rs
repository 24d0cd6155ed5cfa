/*!

Asks for a zone focus around every detected unit of the configured production types.

*/

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    unit::UnitList,
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::Detection];

pub struct BasicZoneFocusModel {
    /// Indexed by production type.
    focus_on_detection: Vec<bool>,
}

impl BasicZoneFocusModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let mut focus_on_detection = vec![false; units.production_types().len()];
        for params in scenario.production_types.iter().filter(|p| p.zone_focus_on_detection) {
            if let Some(id) = units.find_production_type(&params.name) {
                focus_on_detection[id] = true;
            }
        }
        BasicZoneFocusModel { focus_on_detection }
    }
}

impl SimModule for BasicZoneFocusModel {
    fn name(&self) -> &'static str {
        "basic-zone-focus-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::Detection { unit, day } = *event else {
            unexpected_event(self, event);
        };
        let production_type = context.units()[unit].production_type();
        if self.focus_on_detection.get(production_type).copied().unwrap_or(false) {
            queue.push(Event::RequestForZoneFocus { unit, day });
        }
    }
}

impl Display for BasicZoneFocusModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} for production types {:?}>", self.name(), self.focus_on_detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{UnitId, UnitState, unit_list_at};

    #[test]
    fn only_listed_types_get_a_focus() {
        let mut units = unit_list_at(&[(0.0, 0.0)]);
        units.push("pig".to_string(), "Swine", 5, (0.0, 0.0), (1.0, 1.0), (UnitState::Susceptible, 0, 0));
        let scenario = Scenario::from_json_str(
            r#"{ "iterations": 1, "days": 1, "production_types": [
                { "name": "Cattle", "zone_focus_on_detection": true }, { "name": "Swine" }] }"#,
        )
        .unwrap();
        let mut model = BasicZoneFocusModel::new(&scenario, &units);
        let mut context = Context::with_units(units);
        let mut queue = EventQueue::new();

        model.run(&mut context, &Event::Detection { unit: UnitId(1), day: 4 }, &mut queue);
        assert!(queue.is_empty());
        model.run(&mut context, &Event::Detection { unit: UnitId(0), day: 4 }, &mut queue);
        assert_eq!(queue.pop(), Some(Event::RequestForZoneFocus { unit: UnitId(0), day: 4 }));
    }
}
