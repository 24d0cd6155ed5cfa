/*!

Diagnostic tests ordered after an exam finds no clinical signs.

Infected and naturally immune units test positive with probability `sensitivity`; susceptible and
vaccine immune units test negative with probability `specificity`. Results come back after the
test delay. A positive result is also a `Detection` of the unit, unless it has already been
detected some other way by the time the result arrives.

*/

use super::disease_model::whole_days;
use crate::{
    HashSet,
    context::Context,
    define_rng,
    delay_queue::DelayQueue,
    error::SimError,
    event::{Event, EventKind, EventQueue},
    log::debug,
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    random::{ContextRandomExt, PeriodSampler},
    unit::{UnitId, UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

define_rng!(TestRng);

const EVENTS: &[EventKind] = &[
    EventKind::BeforeEachSimulation,
    EventKind::NewDay,
    EventKind::Detection,
    EventKind::Test,
];

#[derive(Clone, Debug)]
struct ParamBlock {
    sensitivity: f64,
    specificity: f64,
    delay: Option<PeriodSampler>,
}

pub struct TestModel {
    /// Indexed by production type.
    blocks: Vec<Option<ParamBlock>>,
    detected: HashSet<UnitId>,
    pending: DelayQueue<Event>,
}

impl TestModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let mut blocks = vec![None; units.production_types().len()];
        for params in &scenario.production_types {
            let (Some(test), Some(id)) = (&params.test, units.find_production_type(&params.name)) else {
                continue;
            };
            blocks[id] = Some(ParamBlock {
                sensitivity: test.sensitivity,
                specificity: test.specificity,
                delay: test.delay.as_ref().map(|d| d.sampler()).transpose()?,
            });
        }
        Ok(TestModel {
            blocks,
            detected: HashSet::default(),
            pending: DelayQueue::default(),
        })
    }

    /// Returns `(positive, correct)`.
    fn result(context: &mut Context, state: UnitState, block: &ParamBlock) -> (bool, bool) {
        match state {
            UnitState::Latent
            | UnitState::InfectiousSubclinical
            | UnitState::InfectiousClinical
            | UnitState::NaturallyImmune => {
                let positive = context.sample_uniform::<TestRng>() < block.sensitivity;
                (positive, positive)
            }
            UnitState::Susceptible | UnitState::VaccineImmune => {
                let positive = context.sample_uniform::<TestRng>() >= block.specificity;
                (positive, !positive)
            }
            UnitState::Destroyed => (false, true),
        }
    }

    fn release(&mut self, result: Event, queue: &mut EventQueue) {
        if let Event::TestResult {
            unit,
            day,
            positive: true,
            ..
        } = result
        {
            queue.push(result);
            if self.detected.insert(unit) {
                debug!("positive test detects unit {} on day {day}", unit.index());
                queue.push(Event::Detection { unit, day });
            }
        } else {
            queue.push(result);
        }
    }
}

impl SimModule for TestModel {
    fn name(&self) -> &'static str {
        "test-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeEachSimulation { .. } => self.reset(),
            Event::NewDay { .. } => {
                for result in self.pending.advance() {
                    self.release(result, queue);
                }
            }
            Event::Detection { unit, .. } => {
                self.detected.insert(unit);
            }
            Event::Test { unit, day, reason } => {
                let (state, production_type) = {
                    let target = &context.units()[unit];
                    (target.state(), target.production_type())
                };
                let Some(Some(block)) = self.blocks.get(production_type) else {
                    return;
                };
                let (positive, correct) = TestModel::result(context, state, block);
                let delay = block
                    .delay
                    .as_ref()
                    .map_or(0, |sampler| whole_days(context.sample_distr::<TestRng, f64>(sampler), "test delay"));
                let result = Event::TestResult {
                    unit,
                    day: day + delay,
                    positive,
                    correct,
                    reason,
                };
                if delay == 0 {
                    self.release(result, queue);
                } else {
                    self.pending.push(delay as usize, result);
                }
            }
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.detected.clear();
        self.pending.clear();
    }

    fn has_pending_actions(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Display for TestModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (production_type, block) in self.blocks.iter().enumerate() {
            if let Some(block) = block {
                write!(
                    f,
                    " type {production_type}: sensitivity={} specificity={}",
                    block.sensitivity, block.specificity
                )?;
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ControlReason;
    use crate::unit::{DiseasePeriods, unit_list_at};

    fn setup(test: &str) -> (Context, TestModel) {
        let units = unit_list_at(&[(0.0, 0.0), (1.0, 0.0)]);
        let scenario = Scenario::from_json_str(&format!(
            r#"{{ "iterations": 1, "days": 1, "production_types": [{{ "name": "Cattle", "test": {test} }}] }}"#
        ))
        .unwrap();
        let model = TestModel::new(&scenario, &units).unwrap();
        let mut context = Context::with_units(units);
        context.init_random(4);
        // Unit 0 infected, unit 1 healthy.
        context.units_mut()[UnitId(0)].infect(DiseasePeriods::new(3, 3, 3, 3), 0);
        context.units_mut().step_all();
        (context, model)
    }

    fn test(unit: usize, day: u32) -> Event {
        Event::Test {
            unit: UnitId(unit),
            day,
            reason: ControlReason::TraceBackDirect,
        }
    }

    fn drain(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn perfect_test_detects_infected_units_only() {
        let (mut context, mut model) = setup(r#"{ "sensitivity": 1.0, "specificity": 1.0 }"#);
        let mut queue = EventQueue::new();
        model.run(&mut context, &test(0, 5), &mut queue);
        model.run(&mut context, &test(1, 5), &mut queue);
        assert_eq!(
            drain(&mut queue),
            vec![
                Event::TestResult {
                    unit: UnitId(0),
                    day: 5,
                    positive: true,
                    correct: true,
                    reason: ControlReason::TraceBackDirect,
                },
                Event::Detection { unit: UnitId(0), day: 5 },
                Event::TestResult {
                    unit: UnitId(1),
                    day: 5,
                    positive: false,
                    correct: true,
                    reason: ControlReason::TraceBackDirect,
                },
            ]
        );
    }

    #[test]
    fn useless_test_gets_everything_wrong() {
        let (mut context, mut model) = setup(r#"{ "sensitivity": 0.0, "specificity": 0.0 }"#);
        let mut queue = EventQueue::new();
        model.run(&mut context, &test(0, 5), &mut queue);
        model.run(&mut context, &test(1, 5), &mut queue);
        let results: Vec<(bool, bool)> = drain(&mut queue)
            .into_iter()
            .filter_map(|event| match event {
                Event::TestResult { positive, correct, .. } => Some((positive, correct)),
                _ => None,
            })
            .collect();
        assert_eq!(results, vec![(false, false), (true, false)]);
    }

    #[test]
    fn delayed_positive_after_detection_does_not_detect_again() {
        let (mut context, mut model) =
            setup(r#"{ "sensitivity": 1.0, "specificity": 1.0, "delay": { "type": "point", "value": 2 } }"#);
        let mut queue = EventQueue::new();
        model.run(&mut context, &test(0, 5), &mut queue);
        assert!(queue.is_empty());
        assert!(model.has_pending_actions());

        model.run(&mut context, &Event::Detection { unit: UnitId(0), day: 6 }, &mut queue);
        model.run(&mut context, &Event::NewDay { day: 6 }, &mut queue);
        model.run(&mut context, &Event::NewDay { day: 7 }, &mut queue);
        let kinds: Vec<EventKind> = drain(&mut queue).iter().map(Event::kind).collect();
        assert_eq!(kinds, vec![EventKind::TestResult]);
        assert!(!model.has_pending_actions());
    }
}
