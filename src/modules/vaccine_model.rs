/*!

Gives vaccinated units their vaccine immunity.

Before any simulation the model announces each production type's delay to immunity, so that
the population model can tell which vaccinations protect a unit on the day they happen.

*/

use crate::{
    context::Context,
    define_rng,
    error::SimError,
    event::{Event, EventKind, EventQueue},
    log::debug,
    module::{SimModule, unexpected_event},
    modules::disease_model::whole_days,
    parameters::Scenario,
    random::{ContextRandomExt, PeriodSampler},
    unit::UnitList,
};
use std::fmt::{self, Display, Formatter};

define_rng!(VaccineRng);

const EVENTS: &[EventKind] = &[
    EventKind::BeforeAnySimulations,
    EventKind::Vaccination,
    EventKind::InProgressImmunity,
];

struct ParamBlock {
    delay: u32,
    immunity: PeriodSampler,
}

pub struct VaccineModel {
    /// Indexed by production type.
    blocks: Vec<Option<ParamBlock>>,
    production_types: Vec<String>,
}

impl VaccineModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let mut blocks: Vec<Option<ParamBlock>> = (0..units.production_types().len()).map(|_| None).collect();
        let mut production_types = Vec::new();
        for params in &scenario.production_types {
            let (Some(vaccination), Some(id)) = (&params.vaccination, units.find_production_type(&params.name)) else {
                continue;
            };
            blocks[id] = Some(ParamBlock {
                delay: vaccination.delay,
                immunity: vaccination.immunity_period.sampler()?,
            });
            production_types.push(params.name.clone());
        }
        Ok(VaccineModel {
            blocks,
            production_types,
        })
    }

    fn immunity_period(&self, context: &mut Context, production_type: usize) -> Option<u32> {
        let block = self.blocks.get(production_type)?.as_ref()?;
        let days = whole_days(context.sample_distr::<VaccineRng, f64>(&block.immunity), "vaccine immunity");
        Some(days)
    }
}

impl SimModule for VaccineModel {
    fn name(&self) -> &'static str {
        "vaccine-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeAnySimulations => {
                for (production_type, block) in self.blocks.iter().enumerate() {
                    if let Some(block) = block {
                        queue.push(Event::DeclarationOfVaccineDelay {
                            production_type,
                            delay: block.delay,
                        });
                    }
                }
            }
            Event::Vaccination { unit, .. } => {
                let production_type = context.units()[unit].production_type();
                let Some(immunity) = self.immunity_period(context, production_type) else {
                    debug!("unit {} is of a type with no vaccine parameters", unit.index());
                    return;
                };
                let delay = self.blocks[production_type].as_ref().map_or(0, |block| block.delay);
                context.units_mut()[unit].vaccinate(delay, immunity);
            }
            Event::InProgressImmunity {
                unit,
                days_in_state,
                days_left_in_state,
                ..
            } => {
                let production_type = context.units()[unit].production_type();
                let remaining = if days_left_in_state > 0 {
                    days_left_in_state
                } else {
                    let Some(immunity) = self.immunity_period(context, production_type) else {
                        debug!("unit {} starts vaccine immune but has no vaccine parameters", unit.index());
                        return;
                    };
                    immunity.saturating_sub(days_in_state).max(1)
                };
                context.units_mut()[unit].vaccinate(0, remaining);
            }
            _ => unexpected_event(self, event),
        }
    }
}

impl Display for VaccineModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} for {}>", self.name(), self.production_types.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ControlReason;
    use crate::unit::{UnitId, UnitState, unit_list_at};

    fn model(context: &Context) -> VaccineModel {
        let scenario = Scenario::from_json_str(
            r#"{ "iterations": 1, "days": 10, "production_types": [{ "name": "Cattle",
                "vaccination": { "delay": 2, "immunity_period": { "type": "point", "value": 3 } } }] }"#,
        )
        .unwrap();
        VaccineModel::new(&scenario, context.units()).unwrap()
    }

    #[test]
    fn declares_delays() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let mut model = model(&context);
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::BeforeAnySimulations, &mut queue);
        assert_eq!(
            queue.pop(),
            Some(Event::DeclarationOfVaccineDelay {
                production_type: 0,
                delay: 2
            })
        );
    }

    #[test]
    fn vaccination_starts_vaccine_cycle() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        context.init_random(5);
        let mut model = model(&context);
        let event = Event::Vaccination {
            unit: UnitId(0),
            day: 1,
            reason: ControlReason::Ring,
        };
        model.run(&mut context, &event, &mut EventQueue::new());
        let mut states = Vec::new();
        for _ in 0..7 {
            context.units_mut().step_all();
            states.push(context.units()[UnitId(0)].state().letter());
        }
        assert_eq!(states.into_iter().collect::<String>(), "SSVVVSS");
    }

    #[test]
    fn in_progress_immunity_uses_days_left() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let mut model = model(&context);
        let event = Event::InProgressImmunity {
            unit: UnitId(0),
            day: 0,
            days_in_state: 5,
            days_left_in_state: 2,
        };
        model.run(&mut context, &event, &mut EventQueue::new());
        context.units_mut().step_all();
        assert_eq!(context.units()[UnitId(0)].state(), UnitState::VaccineImmune);
        context.units_mut().step_all();
        context.units_mut().step_all();
        assert_eq!(context.units()[UnitId(0)].state(), UnitState::Susceptible);
    }
}
