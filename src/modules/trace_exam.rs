/*!

Examines units that a trace has found.

A unit is examined at most once. It is not examined if it was destroyed, or if it was already
detected on an earlier day; a unit detected today is still examined, since there is no telling
which came first.

*/

use crate::{
    HashMap,
    context::Context,
    event::{ControlReason, Event, EventKind, EventQueue},
    log::trace,
    module::{SimModule, unexpected_event},
    parameters::{ExamParams, Scenario},
    unit::{UnitId, UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::BeforeEachSimulation, EventKind::Detection, EventKind::TraceResult];

#[derive(Copy, Clone, Debug, Default)]
struct History {
    detected: Option<u32>,
    examined: Option<u32>,
}

pub struct TraceExamModel {
    /// Indexed by production type.
    params: Vec<Option<ExamParams>>,
    history: HashMap<UnitId, History>,
}

impl TraceExamModel {
    #[must_use]
    pub fn new(scenario: &Scenario, units: &UnitList) -> Self {
        let mut params = vec![None; units.production_types().len()];
        for production_type in &scenario.production_types {
            if let (Some(exam), Some(id)) = (&production_type.trace_exam, units.find_production_type(&production_type.name)) {
                params[id] = Some(exam.clone());
            }
        }
        TraceExamModel {
            params,
            history: HashMap::default(),
        }
    }

    fn examine(&mut self, context: &Context, event: &Event, queue: &mut EventQueue) {
        let Event::TraceResult {
            contact_type,
            direction,
            day,
            ..
        } = *event
        else {
            return;
        };
        let Some(unit) = event.traced_unit() else {
            return;
        };
        let target = &context.units()[unit];
        if target.state() == UnitState::Destroyed {
            return;
        }
        let Some(Some(exam)) = self.params.get(target.production_type()) else {
            return;
        };
        let history = self.history.entry(unit).or_default();
        if history.examined.is_some() || history.detected.is_some_and(|detected| detected < day) {
            trace!("unit {} already examined or detected", unit.index());
            return;
        }
        history.examined = Some(day);
        queue.push(Event::Exam {
            unit,
            day,
            reason: ControlReason::for_trace(contact_type, direction),
            detection_multiplier: exam.detection_multiplier,
            test_if_no_signs: exam.test_if_no_signs,
        });
    }
}

impl SimModule for TraceExamModel {
    fn name(&self) -> &'static str {
        "trace-exam-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeEachSimulation { .. } => self.reset(),
            Event::Detection { unit, day } => {
                self.history.entry(unit).or_default().detected.get_or_insert(day);
            }
            Event::TraceResult { .. } => self.examine(context, event, queue),
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

impl Display for TraceExamModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (production_type, exam) in self.params.iter().enumerate() {
            if let Some(exam) = exam {
                write!(
                    f,
                    " type {production_type}: multiplier={} test={}",
                    exam.detection_multiplier, exam.test_if_no_signs
                )?;
            }
        }
        write!(f, ">")
    }
}
