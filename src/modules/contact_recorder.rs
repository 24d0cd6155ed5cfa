/*!

Keeps the records a trace searches: which units shipped to which, by direct or indirect contact,
and on what day.

A traceable exposure is recorded if tracing is set up for that contact type on the production
type of either unit. A `TraceAttempt` walks the traced unit's records newest first, back as far
as the attempt's period, and issues one `TraceResult` per record. Whether a record is found
depends on the tracing success probability of the unit the trace started from. A record that has
been found is never traced again, so traces do not run back and forth along the same contacts.

Failed traces are reported at once; successful ones may take a sampled number of days.

*/

use super::disease_model::whole_days;
use crate::{
    context::Context,
    define_rng,
    delay_queue::DelayQueue,
    error::SimError,
    event::{ContactType, Event, EventKind, EventQueue, TraceDirection},
    log::{trace, warn},
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    random::{ContextRandomExt, PeriodSampler},
    unit::{UnitId, UnitList},
};
use std::fmt::{self, Display, Formatter};

define_rng!(TraceRng);

const EVENTS: &[EventKind] = &[
    EventKind::BeforeEachSimulation,
    EventKind::NewDay,
    EventKind::Exposure,
    EventKind::TraceAttempt,
];

const TRACED_TYPES: [ContactType; 2] = [ContactType::Direct, ContactType::Indirect];

fn type_index(contact_type: ContactType) -> Option<usize> {
    match contact_type {
        ContactType::Direct => Some(0),
        ContactType::Indirect => Some(1),
        _ => None,
    }
}

#[derive(Clone, Debug)]
struct ContactRecord {
    exposing: UnitId,
    exposed: UnitId,
    day: u32,
    contact_type: ContactType,
    traced: bool,
}

pub struct ContactRecorderModel {
    /// Indexed by contact type, then production type. `None` where tracing is not set up.
    success: [Vec<Option<f64>>; 2],
    delay: [Vec<Option<PeriodSampler>>; 2],
    records: Vec<ContactRecord>,
    /// Indices into `records` of each unit's outgoing contacts, oldest first.
    out_of: Vec<Vec<usize>>,
    /// Indices into `records` of each unit's incoming contacts, oldest first.
    into: Vec<Vec<usize>>,
    pending: DelayQueue<Event>,
}

impl ContactRecorderModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let count = units.production_types().len();
        let mut success = [vec![None; count], vec![None; count]];
        let mut delay = [vec![None; count], vec![None; count]];
        for params in &scenario.production_types {
            let (Some(tracing), Some(id)) = (&params.tracing, units.find_production_type(&params.name)) else {
                continue;
            };
            for contact_type in TRACED_TYPES {
                let Some(trace_params) = tracing.for_contact_type(contact_type) else {
                    continue;
                };
                let index = type_index(contact_type).unwrap_or_default();
                success[index][id] = Some(trace_params.success.unwrap_or_else(|| {
                    warn!(
                        "no {contact_type:?} trace success probability for \"{}\", assuming every trace succeeds",
                        params.name
                    );
                    1.0
                }));
                delay[index][id] = trace_params.delay.as_ref().map(|d| d.sampler()).transpose()?;
            }
        }
        Ok(ContactRecorderModel {
            success,
            delay,
            records: Vec::new(),
            out_of: vec![Vec::new(); units.len()],
            into: vec![Vec::new(); units.len()],
            pending: DelayQueue::default(),
        })
    }

    fn is_recorded(&self, context: &Context, contact_type: ContactType, exposing: UnitId, exposed: UnitId) -> bool {
        let Some(index) = type_index(contact_type) else {
            return false;
        };
        let units = context.units();
        [exposing, exposed]
            .iter()
            .any(|id| matches!(self.success[index].get(units[*id].production_type()), Some(Some(_))))
    }

    fn record(&mut self, exposing: UnitId, exposed: UnitId, day: u32, contact_type: ContactType) {
        let index = self.records.len();
        self.records.push(ContactRecord {
            exposing,
            exposed,
            day,
            contact_type,
            traced: false,
        });
        for (lists, unit) in [(&mut self.out_of, exposing), (&mut self.into, exposed)] {
            if unit.index() >= lists.len() {
                lists.resize(unit.index() + 1, Vec::new());
            }
            lists[unit.index()].push(index);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn trace(
        &mut self,
        context: &mut Context,
        unit: UnitId,
        day: u32,
        contact_type: ContactType,
        direction: TraceDirection,
        period: u32,
        queue: &mut EventQueue,
    ) {
        let Some(slot) = type_index(contact_type) else {
            return;
        };
        let production_type = context.units()[unit].production_type();
        let p = self.success[slot].get(production_type).copied().flatten().unwrap_or(0.0);
        let delay = self.delay[slot].get(production_type).cloned().flatten();
        let lists = match direction {
            TraceDirection::Forward => &self.out_of,
            TraceDirection::Back => &self.into,
        };
        let Some(found) = lists.get(unit.index()).cloned() else {
            return;
        };

        for index in found.into_iter().rev() {
            let record = &self.records[index];
            if day.saturating_sub(record.day) > period {
                break;
            }
            if record.traced || record.contact_type != contact_type {
                continue;
            }
            let (exposing, exposed) = (record.exposing, record.exposed);
            if !context.sample_bool::<TraceRng>(p) {
                trace!("{direction:?} trace from unit {} missed a contact", unit.index());
                queue.push(Event::TraceResult {
                    exposing,
                    exposed,
                    contact_type,
                    direction,
                    day,
                    initiated_day: day,
                    traced: false,
                });
                continue;
            }

            self.records[index].traced = true;
            let wait = delay
                .as_ref()
                .map_or(0, |sampler| whole_days(context.sample_distr::<TraceRng, f64>(sampler), "trace delay"));
            let result = Event::TraceResult {
                exposing,
                exposed,
                contact_type,
                direction,
                day: day + wait,
                initiated_day: day,
                traced: true,
            };
            if wait == 0 {
                queue.push(result);
            } else {
                self.pending.push(wait as usize, result);
            }
        }
    }
}

impl SimModule for ContactRecorderModel {
    fn name(&self) -> &'static str {
        "contact-recorder-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeEachSimulation { .. } => self.reset(),
            Event::NewDay { .. } => {
                for result in self.pending.advance() {
                    queue.push(result);
                }
            }
            Event::Exposure {
                exposing: Some(exposing),
                exposed,
                day,
                contact_type,
                traceable: true,
                ..
            } => {
                if self.is_recorded(context, contact_type, exposing, exposed) {
                    self.record(exposing, exposed, day, contact_type);
                }
            }
            Event::Exposure { .. } => {}
            Event::TraceAttempt {
                unit,
                day,
                contact_type,
                direction,
                period,
            } => self.trace(context, unit, day, contact_type, direction, period, queue),
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.records.clear();
        self.out_of.iter_mut().for_each(Vec::clear);
        self.into.iter_mut().for_each(Vec::clear);
        self.pending.clear();
    }

    fn has_pending_actions(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Display for ContactRecorderModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for contact_type in TRACED_TYPES {
            let index = type_index(contact_type).unwrap_or_default();
            for (production_type, success) in self.success[index].iter().enumerate() {
                if let Some(p) = success {
                    write!(f, " {contact_type:?} type {production_type}: success={p}")?;
                }
            }
        }
        write!(f, ">")
    }
}
