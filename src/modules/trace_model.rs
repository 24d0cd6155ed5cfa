/*!

Asks for traces of a detected unit's contacts, for each contact type and direction its production
type is set up to trace.

*/

use crate::{
    context::Context,
    event::{ContactType, Event, EventKind, EventQueue, TraceDirection},
    module::{SimModule, unexpected_event},
    parameters::{Scenario, TraceParams},
    unit::UnitList,
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::Detection];

/// One kind of trace a production type asks for.
#[derive(Copy, Clone, Debug, PartialEq)]
struct TracePlan {
    contact_type: ContactType,
    direction: TraceDirection,
    period: u32,
}

fn plans_for(contact_type: ContactType, params: &TraceParams) -> impl Iterator<Item = TracePlan> + '_ {
    TraceDirection::ALL
        .into_iter()
        .filter(|direction| match direction {
            TraceDirection::Forward => params.forward,
            TraceDirection::Back => params.back,
        })
        .map(move |direction| TracePlan {
            contact_type,
            direction,
            period: params.period,
        })
}

pub struct TraceModel {
    /// Indexed by production type.
    plans: Vec<Vec<TracePlan>>,
}

impl TraceModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let mut plans = vec![Vec::new(); units.production_types().len()];
        for params in &scenario.production_types {
            let (Some(tracing), Some(id)) = (&params.tracing, units.find_production_type(&params.name)) else {
                continue;
            };
            let direct = tracing.direct.iter().flat_map(|p| plans_for(ContactType::Direct, p));
            let indirect = tracing.indirect.iter().flat_map(|p| plans_for(ContactType::Indirect, p));
            plans[id] = direct.chain(indirect).collect();
        }
        TraceModel { plans }
    }
}

impl SimModule for TraceModel {
    fn name(&self) -> &'static str {
        "trace-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        let Event::Detection { unit, day } = *event else {
            unexpected_event(self, event);
        };
        let production_type = context.units()[unit].production_type();
        for plan in self.plans.get(production_type).into_iter().flatten() {
            queue.push(Event::TraceAttempt {
                unit,
                day,
                contact_type: plan.contact_type,
                direction: plan.direction,
                period: plan.period,
            });
        }
    }
}

impl Display for TraceModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (production_type, plans) in self.plans.iter().enumerate() {
            for plan in plans {
                write!(
                    f,
                    " type {production_type}: {:?} {:?} {} days",
                    plan.direction, plan.contact_type, plan.period
                )?;
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{UnitId, UnitState, unit_list_at};

    #[test]
    fn detection_asks_for_each_configured_trace() {
        let mut units = unit_list_at(&[(0.0, 0.0)]);
        units.push("pig".to_string(), "Swine", 5, (0.0, 0.0), (1.0, 1.0), (UnitState::Susceptible, 0, 0));
        let scenario = Scenario::from_json_str(
            r#"{ "iterations": 1, "days": 1, "production_types": [{ "name": "Cattle", "tracing": {
                "direct": { "period": 14, "forward": true, "back": true },
                "indirect": { "period": 7, "back": true } } }] }"#,
        )
        .unwrap();
        let mut model = TraceModel::new(&scenario, &units);
        let mut context = Context::with_units(units);
        let mut queue = EventQueue::new();

        model.run(&mut context, &Event::Detection { unit: UnitId(0), day: 3 }, &mut queue);
        let attempts: Vec<(ContactType, TraceDirection, u32)> = std::iter::from_fn(|| queue.pop())
            .filter_map(|event| match event {
                Event::TraceAttempt {
                    contact_type,
                    direction,
                    period,
                    day: 3,
                    ..
                } => Some((contact_type, direction, period)),
                _ => None,
            })
            .collect();
        assert_eq!(
            attempts,
            vec![
                (ContactType::Direct, TraceDirection::Forward, 14),
                (ContactType::Direct, TraceDirection::Back, 14),
                (ContactType::Indirect, TraceDirection::Back, 7),
            ]
        );

        model.run(&mut context, &Event::Detection { unit: UnitId(1), day: 3 }, &mut queue);
        assert!(queue.is_empty());
    }
}
