/*!

Seeds each iteration's initial states and settles competing causes of infection.

Exposures, vaccinations and destructions pile up during the day. At the end of the day each
exposed unit gets at most one `Infection`: a unit vaccinated with immediate immunity, or
destroyed, today escapes with probability one half, and otherwise one of its adequate exposures
is picked at random. Exposures of units that are no longer susceptible are dropped.

This module must be the last one loaded, so that it sees every event of the day before
`EndOfDay`.

*/

use crate::{
    HashMap, HashSet,
    context::Context,
    define_rng,
    event::{ContactType, ControlReason, Event, EventKind, EventQueue, InitialOverride},
    log::{debug, trace},
    module::{SimModule, unexpected_event},
    random::ContextRandomExt,
    unit::{UnitId, UnitState},
};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

define_rng!(PopulationRng);

const EVENTS: &[EventKind] = &[
    EventKind::DeclarationOfVaccineDelay,
    EventKind::BeforeEachSimulation,
    EventKind::Exposure,
    EventKind::Vaccination,
    EventKind::Destruction,
    EventKind::EndOfDay,
];

#[derive(Clone, Debug)]
struct Exposure {
    exposing: Option<UnitId>,
    day: u32,
    contact_type: ContactType,
    initial: Option<InitialOverride>,
}

#[derive(Default)]
pub struct PopulationModel {
    /// Vaccine delay by production type, as declared by the vaccine model.
    vaccine_delays: HashMap<usize, u32>,
    /// Today's adequate exposures, by exposed unit.
    exposures: BTreeMap<UnitId, Vec<Exposure>>,
    /// Units vaccinated with immediate immunity or destroyed today.
    vaccinated_or_destroyed: HashSet<UnitId>,
}

impl PopulationModel {
    #[must_use]
    pub fn new() -> Self {
        PopulationModel::default()
    }

    fn seed_initial_states(context: &mut Context, queue: &mut EventQueue) {
        for id in context.units().ids() {
            let unit = &context.units()[id];
            let state = unit.initial_state();
            let initial = InitialOverride {
                state,
                days_in_state: unit.days_in_initial_state(),
                days_left_in_state: unit.days_left_in_initial_state(),
            };
            match state {
                UnitState::Susceptible => {}
                UnitState::Latent
                | UnitState::InfectiousSubclinical
                | UnitState::InfectiousClinical
                | UnitState::NaturallyImmune => queue.push(Event::Exposure {
                    exposing: None,
                    exposed: id,
                    day: 0,
                    contact_type: ContactType::InitiallyInfected,
                    traceable: false,
                    adequate: true,
                    initial: Some(initial),
                }),
                UnitState::VaccineImmune => queue.push(Event::InProgressImmunity {
                    unit: id,
                    day: 0,
                    days_in_state: initial.days_in_state,
                    days_left_in_state: initial.days_left_in_state,
                }),
                UnitState::Destroyed => {
                    context.units_mut()[id].destroy();
                    queue.push(Event::Destruction {
                        unit: id,
                        day: 0,
                        reason: ControlReason::Initial,
                    });
                }
            }
        }
    }

    fn resolve_conflicts(&mut self, context: &mut Context, queue: &mut EventQueue) {
        let exposures = std::mem::take(&mut self.exposures);
        for (unit, attempts) in exposures {
            if self.vaccinated_or_destroyed.contains(&unit) && context.sample_bool::<PopulationRng>(0.5) {
                debug!("vaccination or destruction cancels infection of unit {}", unit.index());
                continue;
            }
            let target = &context.units()[unit];
            if target.in_disease_cycle() || target.state() != UnitState::Susceptible {
                continue;
            }
            let chosen = if attempts.len() > 1 {
                &attempts[context.sample_range::<PopulationRng, _, usize>(0..attempts.len())]
            } else {
                &attempts[0]
            };
            trace!("unit {} infected, chosen from {} exposure(s)", unit.index(), attempts.len());
            queue.push(Event::Infection {
                infecting: chosen.exposing,
                infected: unit,
                day: chosen.day,
                contact_type: chosen.contact_type,
                initial: chosen.initial,
            });
        }
        self.vaccinated_or_destroyed.clear();
    }
}

impl SimModule for PopulationModel {
    fn name(&self) -> &'static str {
        "population-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::DeclarationOfVaccineDelay { production_type, delay } => {
                self.vaccine_delays.insert(production_type, delay);
            }
            Event::BeforeEachSimulation { .. } => {
                self.reset();
                PopulationModel::seed_initial_states(context, queue);
            }
            Event::Exposure {
                exposing,
                exposed,
                day,
                contact_type,
                adequate,
                initial,
                ..
            } => {
                if adequate {
                    self.exposures.entry(exposed).or_default().push(Exposure {
                        exposing,
                        day,
                        contact_type,
                        initial,
                    });
                }
            }
            Event::Vaccination { unit, .. } => {
                let production_type = context.units()[unit].production_type();
                if self.vaccine_delays.get(&production_type) == Some(&0) {
                    self.vaccinated_or_destroyed.insert(unit);
                }
            }
            Event::Destruction { unit, .. } => {
                self.vaccinated_or_destroyed.insert(unit);
            }
            Event::EndOfDay { .. } => self.resolve_conflicts(context, queue),
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.exposures.clear();
        self.vaccinated_or_destroyed.clear();
    }

    fn has_pending_infections(&self) -> bool {
        !self.exposures.is_empty()
    }
}

impl Display for PopulationModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::unit_list_at;

    fn exposure(exposed: usize, exposing: Option<usize>) -> Event {
        Event::Exposure {
            exposing: exposing.map(UnitId),
            exposed: UnitId(exposed),
            day: 3,
            contact_type: ContactType::Direct,
            traceable: true,
            adequate: true,
            initial: None,
        }
    }

    fn drain(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn one_infection_per_exposed_unit() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]));
        context.init_random(3);
        let mut model = PopulationModel::new();
        let mut queue = EventQueue::new();
        model.run(&mut context, &exposure(1, Some(0)), &mut queue);
        model.run(&mut context, &exposure(1, Some(2)), &mut queue);
        model.run(&mut context, &exposure(2, Some(0)), &mut queue);
        assert!(model.has_pending_infections());
        model.run(&mut context, &Event::EndOfDay { day: 3, done: false }, &mut queue);
        assert!(!model.has_pending_infections());

        let infected: Vec<UnitId> = drain(&mut queue).iter().filter_map(Event::unit).collect();
        assert_eq!(infected, vec![UnitId(1), UnitId(2)]);
    }

    #[test]
    fn inadequate_exposures_are_ignored() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0), (1.0, 0.0)]));
        let mut model = PopulationModel::new();
        let mut queue = EventQueue::new();
        let event = Event::Exposure {
            exposing: Some(UnitId(0)),
            exposed: UnitId(1),
            day: 1,
            contact_type: ContactType::Indirect,
            traceable: true,
            adequate: false,
            initial: None,
        };
        model.run(&mut context, &event, &mut queue);
        model.run(&mut context, &Event::EndOfDay { day: 1, done: false }, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn immune_units_are_not_infected() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0), (1.0, 0.0)]));
        context.units_mut()[UnitId(1)].vaccinate(0, 10);
        context.units_mut().step_all();
        assert_eq!(context.units()[UnitId(1)].state(), UnitState::VaccineImmune);

        let mut model = PopulationModel::new();
        let mut queue = EventQueue::new();
        model.run(&mut context, &exposure(1, Some(0)), &mut queue);
        model.run(&mut context, &Event::EndOfDay { day: 3, done: false }, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn destruction_sometimes_cancels_infection() {
        let mut cancelled = 0;
        for seed in 0..200 {
            let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
            context.init_random(seed);
            let mut model = PopulationModel::new();
            let mut queue = EventQueue::new();
            model.run(&mut context, &exposure(0, None), &mut queue);
            let destruction = Event::Destruction {
                unit: UnitId(0),
                day: 3,
                reason: ControlReason::Detected,
            };
            model.run(&mut context, &destruction, &mut queue);
            model.run(&mut context, &Event::EndOfDay { day: 3, done: false }, &mut queue);
            if queue.is_empty() {
                cancelled += 1;
            }
        }
        assert!((60..140).contains(&cancelled), "cancelled {cancelled} of 200");
    }

    #[test]
    fn delayed_vaccination_does_not_protect() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        context.init_random(1);
        let mut model = PopulationModel::new();
        let mut queue = EventQueue::new();
        let declaration = Event::DeclarationOfVaccineDelay {
            production_type: 0,
            delay: 4,
        };
        model.run(&mut context, &declaration, &mut queue);
        model.run(&mut context, &exposure(0, None), &mut queue);
        let vaccination = Event::Vaccination {
            unit: UnitId(0),
            day: 3,
            reason: ControlReason::Ring,
        };
        model.run(&mut context, &vaccination, &mut queue);
        assert!(model.vaccinated_or_destroyed.is_empty());
        model.run(&mut context, &Event::EndOfDay { day: 3, done: false }, &mut queue);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn initial_states_become_events() {
        let mut units = unit_list_at(&[]);
        for (i, state) in [UnitState::Susceptible, UnitState::InfectiousClinical, UnitState::VaccineImmune, UnitState::Destroyed]
            .into_iter()
            .enumerate()
        {
            units.push(i.to_string(), "Cattle", 1, (0.0, 0.0), (0.0, 0.0), (state, 2, 1));
        }
        let mut context = Context::with_units(units);
        let mut model = PopulationModel::new();
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::BeforeEachSimulation { iteration: 0 }, &mut queue);

        let kinds: Vec<EventKind> = drain(&mut queue).iter().map(Event::kind).collect();
        assert_eq!(kinds, vec![EventKind::Exposure, EventKind::InProgressImmunity, EventKind::Destruction]);
        context.units_mut().step_all();
        assert_eq!(context.units()[UnitId(3)].state(), UnitState::Destroyed);
    }
}
