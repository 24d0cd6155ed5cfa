/*!

Carries out requested destructions and vaccinations within the programs' daily capacities.

Each program starts a fixed number of days after the first detection. Requests that arrive
earlier wait in a `DelayQueue` until the program starts; after that they join a waiting list
ordered by priority (lower first) and then by arrival. Every morning the model takes as many
units off the front of each list as that day's capacity allows.

*/

use crate::{
    HashSet,
    context::Context,
    delay_queue::DelayQueue,
    error::SimError,
    event::{ControlReason, Event, EventKind, EventQueue},
    log::{debug, info},
    module::{SimModule, unexpected_event},
    parameters::{ProgramParams, Scenario},
    rel_chart::RelChart,
    unit::{UnitId, UnitState},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[
    EventKind::NewDay,
    EventKind::Detection,
    EventKind::RequestForDestruction,
    EventKind::RequestForVaccination,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Request {
    unit: UnitId,
    reason: ControlReason,
    priority: u32,
    arrival: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Action {
    Destroy,
    Vaccinate,
}

struct Program {
    action: Action,
    delay: u32,
    capacity: RelChart,
    begin_day: Option<u32>,
    held: DelayQueue<Request>,
    waiting: Vec<Request>,
    requested: HashSet<UnitId>,
}

impl Program {
    fn new(action: Action, params: &ProgramParams) -> Result<Self, SimError> {
        params.capacity.validate()?;
        Ok(Program {
            action,
            delay: params.delay,
            capacity: params.capacity.clone(),
            begin_day: None,
            held: DelayQueue::new(params.delay as usize + 2),
            waiting: Vec::new(),
            requested: HashSet::default(),
        })
    }

    fn reset(&mut self) {
        self.begin_day = None;
        self.held.clear();
        self.waiting.clear();
        self.requested.clear();
    }

    fn has_pending(&self) -> bool {
        !self.held.is_empty() || !self.waiting.is_empty()
    }

    fn start_on_detection(&mut self, day: u32) {
        if self.begin_day.is_none() {
            let begin = day + self.delay + 1;
            info!("{:?} program will begin on day {begin}", self.action);
            self.begin_day = Some(begin);
        }
    }

    fn request(&mut self, request: Request, day: u32) {
        if !self.requested.insert(request.unit) {
            return;
        }
        let begin = self.begin_day.unwrap_or(day + self.delay + 1);
        let wait = begin.saturating_sub(day).max(1);
        self.held.push(wait as usize, request);
    }

    /// Units per day on `day`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn capacity_on(&self, day: u32, begin: u32) -> usize {
        let value = self.capacity.lookup(f64::from(day - begin));
        if value.is_nan() || value <= 0.0 {
            0
        } else {
            value.floor() as usize
        }
    }

    /// Moves today's releases onto the waiting list and takes as many as capacity allows.
    fn release(&mut self, context: &Context, day: u32) -> Vec<Request> {
        self.waiting.extend(self.held.advance());
        self.waiting.sort_by_key(|request| (request.priority, request.arrival));

        let Some(begin) = self.begin_day.filter(|begin| day >= *begin) else {
            return Vec::new();
        };
        let capacity = self.capacity_on(day, begin);
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for request in self.waiting.drain(..) {
            if context.units()[request.unit].state() == UnitState::Destroyed {
                continue;
            }
            if taken.len() < capacity {
                taken.push(request);
            } else {
                kept.push(request);
            }
        }
        self.waiting = kept;
        taken
    }
}

pub struct ResourcesModel {
    destruction: Option<Program>,
    vaccination: Option<Program>,
    arrivals: u64,
}

impl ResourcesModel {
    pub fn new(scenario: &Scenario) -> Result<Self, SimError> {
        let destruction = scenario
            .destruction_program
            .as_ref()
            .map(|params| Program::new(Action::Destroy, params))
            .transpose()?;
        let vaccination = scenario
            .vaccination_program
            .as_ref()
            .map(|params| Program::new(Action::Vaccinate, params))
            .transpose()?;
        if destruction.is_none() && vaccination.is_none() {
            return Err(SimError::ConfigError(
                "resources model needs a destruction or vaccination program".to_string(),
            ));
        }
        Ok(ResourcesModel {
            destruction,
            vaccination,
            arrivals: 0,
        })
    }

    fn next_arrival(&mut self) -> u64 {
        self.arrivals += 1;
        self.arrivals
    }

    fn handle_new_day(&mut self, context: &mut Context, day: u32, queue: &mut EventQueue) {
        if let Some(program) = self.destruction.as_mut() {
            for request in program.release(context, day) {
                context.units_mut()[request.unit].destroy();
                queue.push(Event::Destruction {
                    unit: request.unit,
                    day,
                    reason: request.reason,
                });
            }
        }
        if let Some(program) = self.vaccination.as_mut() {
            for request in program.release(context, day) {
                queue.push(Event::Vaccination {
                    unit: request.unit,
                    day,
                    reason: request.reason,
                });
            }
        }
    }
}

impl SimModule for ResourcesModel {
    fn name(&self) -> &'static str {
        "resources-and-implementation-of-controls-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::NewDay { day } => self.handle_new_day(context, day, queue),
            Event::Detection { day, .. } => {
                for program in self.destruction.iter_mut().chain(self.vaccination.iter_mut()) {
                    program.start_on_detection(day);
                }
            }
            Event::RequestForDestruction {
                unit,
                day,
                reason,
                priority,
            } => {
                let arrival = self.next_arrival();
                match self.destruction.as_mut() {
                    Some(program) => program.request(
                        Request {
                            unit,
                            reason,
                            priority,
                            arrival,
                        },
                        day,
                    ),
                    None => debug!("no destruction program; ignoring request for unit {}", unit.index()),
                }
            }
            Event::RequestForVaccination {
                unit,
                day,
                reason,
                priority,
            } => {
                let arrival = self.next_arrival();
                match self.vaccination.as_mut() {
                    Some(program) => program.request(
                        Request {
                            unit,
                            reason,
                            priority,
                            arrival,
                        },
                        day,
                    ),
                    None => debug!("no vaccination program; ignoring request for unit {}", unit.index()),
                }
            }
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        for program in self.destruction.iter_mut().chain(self.vaccination.iter_mut()) {
            program.reset();
        }
        self.arrivals = 0;
    }

    fn has_pending_actions(&self) -> bool {
        self.destruction.iter().chain(self.vaccination.iter()).any(Program::has_pending)
    }
}

impl Display for ResourcesModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        if let Some(program) = &self.destruction {
            write!(f, " destruction-delay={} destruction-capacity={}", program.delay, program.capacity)?;
        }
        if let Some(program) = &self.vaccination {
            write!(f, " vaccination-delay={} vaccination-capacity={}", program.delay, program.capacity)?;
        }
        write!(f, ">")
    }
}
