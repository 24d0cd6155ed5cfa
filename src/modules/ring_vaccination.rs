/*!

Ring vaccination around detected units.

When a unit is detected and its production type has a ring radius, every susceptible unit of a
vaccinated production type within that radius is put forward for vaccination.

*/

use crate::{
    context::Context,
    event::{ControlReason, Event, EventKind, EventQueue},
    log::debug,
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    unit::{UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::Detection];

pub struct RingVaccinationModel {
    /// Ring radius by production type of the detected unit.
    ring_radius: Vec<Option<f64>>,
    /// Vaccination priority by production type of the target, `None` if not vaccinated.
    priority: Vec<Option<u32>>,
}

impl RingVaccinationModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let count = units.production_types().len();
        let mut ring_radius = vec![None; count];
        let mut priority = vec![None; count];
        for params in &scenario.production_types {
            let (Some(vaccination), Some(id)) = (&params.vaccination, units.find_production_type(&params.name)) else {
                continue;
            };
            ring_radius[id] = vaccination.ring_radius;
            priority[id] = Some(vaccination.priority);
        }
        RingVaccinationModel { ring_radius, priority }
    }
}

impl SimModule for RingVaccinationModel {
    fn name(&self) -> &'static str {
        "ring-vaccination-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::Detection { unit: detected, day } = *event else {
            unexpected_event(self, event);
        };
        let (x, y, production_type) = {
            let unit = &context.units()[detected];
            (unit.x(), unit.y(), unit.production_type())
        };
        let Some(Some(radius)) = self.ring_radius.get(production_type).copied() else {
            return;
        };

        let nearby = context.units_mut().units_within(x, y, radius);
        let mut requested = 0;
        for id in nearby.into_iter().filter(|id| *id != detected) {
            let target = &context.units()[id];
            if target.state() != UnitState::Susceptible {
                continue;
            }
            if let Some(Some(priority)) = self.priority.get(target.production_type()).copied() {
                queue.push(Event::RequestForVaccination {
                    unit: id,
                    day,
                    reason: ControlReason::Ring,
                    priority,
                });
                requested += 1;
            }
        }
        debug!("ring of radius {radius} around unit {}: {requested} unit(s) to vaccinate", detected.index());
    }
}

impl Display for RingVaccinationModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} radii={:?}>", self.name(), self.ring_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{UnitId, unit_list_at};

    #[test]
    fn ring_covers_nearby_susceptible_units() {
        let units = unit_list_at(&[(0.0, 0.0), (1.0, 0.0), (0.0, 2.0), (10.0, 0.0)]);
        let scenario = Scenario::from_json_str(
            r#"{ "iterations": 1, "days": 1, "production_types": [{ "name": "Cattle",
                "vaccination": { "immunity_period": { "type": "point", "value": 30 }, "ring_radius": 2.0, "priority": 1 } }] }"#,
        )
        .unwrap();
        let mut model = RingVaccinationModel::new(&scenario, &units);
        let mut context = Context::with_units(units);
        context.units_mut()[UnitId(2)].destroy();
        context.units_mut().step_all();

        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::Detection { unit: UnitId(0), day: 5 }, &mut queue);
        let targets: Vec<UnitId> = std::iter::from_fn(|| queue.pop()).filter_map(|e| e.unit()).collect();
        assert_eq!(targets, vec![UnitId(1)]);
    }
}
