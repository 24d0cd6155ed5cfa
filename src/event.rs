/*!

Events passed between modules during a simulated day, and the FIFO queue they travel through.

Every module declares the `EventKind`s it wants; the scheduler hands each dequeued event to the
interested modules in load order, and anything they emit joins the back of the same queue.

*/

use crate::{
    reporting::OutputDeclaration,
    unit::{UnitId, UnitState},
    zone::FragmentId,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum ContactType {
    Direct,
    Indirect,
    Airborne,
    /// Infected when the simulation started.
    InitiallyInfected,
}

/// Forward traces follow contacts out of a unit; back traces follow contacts into it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum TraceDirection {
    Forward,
    Back,
}

impl TraceDirection {
    pub const ALL: [TraceDirection; 2] = [TraceDirection::Forward, TraceDirection::Back];
}

/// Why a control action was requested.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum ControlReason {
    /// The unit itself was detected.
    Detected,
    /// The unit is near a detected unit.
    Ring,
    /// The unit started the simulation in this state.
    Initial,
    TraceForwardDirect,
    TraceForwardIndirect,
    TraceBackDirect,
    TraceBackIndirect,
}

impl ControlReason {
    /// The reason for acting on a unit found by a trace.
    #[must_use]
    pub fn for_trace(contact_type: ContactType, direction: TraceDirection) -> Self {
        match (contact_type, direction) {
            (ContactType::Direct, TraceDirection::Forward) => ControlReason::TraceForwardDirect,
            (ContactType::Direct, TraceDirection::Back) => ControlReason::TraceBackDirect,
            (_, TraceDirection::Forward) => ControlReason::TraceForwardIndirect,
            (_, TraceDirection::Back) => ControlReason::TraceBackIndirect,
        }
    }
}

/// Replaces the start of a sampled disease cycle for units that begin the simulation infected.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct InitialOverride {
    pub state: UnitState,
    pub days_in_state: u32,
    pub days_left_in_state: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    BeforeAnySimulations,
    OutputDirectory {
        path: Option<String>,
    },
    DeclarationOfOutputs {
        outputs: Vec<OutputDeclaration>,
    },
    BeforeEachSimulation {
        iteration: u32,
    },
    DeclarationOfVaccineDelay {
        production_type: usize,
        delay: u32,
    },
    NewDay {
        day: u32,
    },
    /// `adequate` exposures infect a susceptible unit. Only `traceable` ones can be found by
    /// tracing.
    Exposure {
        exposing: Option<UnitId>,
        exposed: UnitId,
        day: u32,
        contact_type: ContactType,
        traceable: bool,
        adequate: bool,
        initial: Option<InitialOverride>,
    },
    Infection {
        infecting: Option<UnitId>,
        infected: UnitId,
        day: u32,
        contact_type: ContactType,
        initial: Option<InitialOverride>,
    },
    Detection {
        unit: UnitId,
        day: u32,
    },
    Quarantine {
        unit: UnitId,
        day: u32,
    },
    /// Asks for the recorded contacts of `unit` over the last `period` days.
    TraceAttempt {
        unit: UnitId,
        day: u32,
        contact_type: ContactType,
        direction: TraceDirection,
        period: u32,
    },
    /// One recorded contact that a trace looked for. `traced` is false if the trace failed to
    /// find it.
    TraceResult {
        exposing: UnitId,
        exposed: UnitId,
        contact_type: ContactType,
        direction: TraceDirection,
        day: u32,
        initiated_day: u32,
        traced: bool,
    },
    /// A visual inspection of a unit. The chance of spotting clinical signs is scaled by
    /// `detection_multiplier`.
    Exam {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
        detection_multiplier: f64,
        test_if_no_signs: bool,
    },
    Test {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
    },
    TestResult {
        unit: UnitId,
        day: u32,
        positive: bool,
        correct: bool,
        reason: ControlReason,
    },
    /// A unit starts the simulation partway through vaccine immunity.
    InProgressImmunity {
        unit: UnitId,
        day: u32,
        days_in_state: u32,
        days_left_in_state: u32,
    },
    RequestForZoneFocus {
        unit: UnitId,
        day: u32,
    },
    RequestForVaccination {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
        priority: u32,
    },
    Vaccination {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
    },
    RequestForDestruction {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
        priority: u32,
    },
    Destruction {
        unit: UnitId,
        day: u32,
        reason: ControlReason,
    },
    EndOfDay {
        day: u32,
        done: bool,
    },
    EndOfDay2 {
        day: u32,
        done: bool,
    },
    Midnight {
        day: u32,
    },
    UnitStateChange {
        unit: UnitId,
        old_state: UnitState,
        new_state: UnitState,
        day: u32,
    },
    UnitZoneChange {
        unit: UnitId,
        old_fragment: FragmentId,
        new_fragment: FragmentId,
        day: u32,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum EventKind {
    BeforeAnySimulations,
    OutputDirectory,
    DeclarationOfOutputs,
    BeforeEachSimulation,
    DeclarationOfVaccineDelay,
    NewDay,
    Exposure,
    Infection,
    Detection,
    Quarantine,
    TraceAttempt,
    TraceResult,
    Exam,
    Test,
    TestResult,
    InProgressImmunity,
    RequestForZoneFocus,
    RequestForVaccination,
    Vaccination,
    RequestForDestruction,
    Destruction,
    EndOfDay,
    EndOfDay2,
    Midnight,
    UnitStateChange,
    UnitZoneChange,
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BeforeAnySimulations => EventKind::BeforeAnySimulations,
            Event::OutputDirectory { .. } => EventKind::OutputDirectory,
            Event::DeclarationOfOutputs { .. } => EventKind::DeclarationOfOutputs,
            Event::BeforeEachSimulation { .. } => EventKind::BeforeEachSimulation,
            Event::DeclarationOfVaccineDelay { .. } => EventKind::DeclarationOfVaccineDelay,
            Event::NewDay { .. } => EventKind::NewDay,
            Event::Exposure { .. } => EventKind::Exposure,
            Event::Infection { .. } => EventKind::Infection,
            Event::Detection { .. } => EventKind::Detection,
            Event::Quarantine { .. } => EventKind::Quarantine,
            Event::TraceAttempt { .. } => EventKind::TraceAttempt,
            Event::TraceResult { .. } => EventKind::TraceResult,
            Event::Exam { .. } => EventKind::Exam,
            Event::Test { .. } => EventKind::Test,
            Event::TestResult { .. } => EventKind::TestResult,
            Event::InProgressImmunity { .. } => EventKind::InProgressImmunity,
            Event::RequestForZoneFocus { .. } => EventKind::RequestForZoneFocus,
            Event::RequestForVaccination { .. } => EventKind::RequestForVaccination,
            Event::Vaccination { .. } => EventKind::Vaccination,
            Event::RequestForDestruction { .. } => EventKind::RequestForDestruction,
            Event::Destruction { .. } => EventKind::Destruction,
            Event::EndOfDay { .. } => EventKind::EndOfDay,
            Event::EndOfDay2 { .. } => EventKind::EndOfDay2,
            Event::Midnight { .. } => EventKind::Midnight,
            Event::UnitStateChange { .. } => EventKind::UnitStateChange,
            Event::UnitZoneChange { .. } => EventKind::UnitZoneChange,
        }
    }

    /// The unit an event is about, if it is about one.
    #[must_use]
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            Event::Exposure { exposed: unit, .. }
            | Event::Infection { infected: unit, .. }
            | Event::Detection { unit, .. }
            | Event::Quarantine { unit, .. }
            | Event::TraceAttempt { unit, .. }
            | Event::Exam { unit, .. }
            | Event::Test { unit, .. }
            | Event::TestResult { unit, .. }
            | Event::InProgressImmunity { unit, .. }
            | Event::RequestForZoneFocus { unit, .. }
            | Event::RequestForVaccination { unit, .. }
            | Event::Vaccination { unit, .. }
            | Event::RequestForDestruction { unit, .. }
            | Event::Destruction { unit, .. }
            | Event::UnitStateChange { unit, .. }
            | Event::UnitZoneChange { unit, .. } => Some(*unit),
            Event::TraceResult { .. } => self.traced_unit(),
            _ => None,
        }
    }
}

impl Event {
    /// For a successful trace result, the unit the trace found: the recipient of a forward
    /// trace or the source of a back trace.
    #[must_use]
    pub fn traced_unit(&self) -> Option<UnitId> {
        match *self {
            Event::TraceResult {
                exposing,
                exposed,
                direction,
                traced: true,
                ..
            } => Some(match direction {
                TraceDirection::Forward => exposed,
                TraceDirection::Back => exposing,
            }),
            _ => None,
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.kind()),
        }
    }
}

/// First in, first out. Modules may push while the queue is being drained.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo() {
        let mut queue = EventQueue::new();
        queue.push(Event::NewDay { day: 1 });
        queue.push(Event::Detection { unit: UnitId(2), day: 1 });
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(Event::NewDay { day: 1 }));
        queue.push(Event::EndOfDay { day: 1, done: false });
        assert_eq!(queue.pop().map(|e| e.kind()), Some(EventKind::Detection));
        assert_eq!(queue.pop().map(|e| e.kind()), Some(EventKind::EndOfDay));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::Detection { unit: UnitId(4), day: 9 };
        assert_eq!(event.to_string(), r#"{"type":"Detection","unit":4,"day":9}"#);
        assert_eq!(Event::BeforeAnySimulations.to_string(), r#"{"type":"BeforeAnySimulations"}"#);
    }

    #[test]
    fn unit_accessor() {
        let event = Event::Infection {
            infecting: None,
            infected: UnitId(3),
            day: 1,
            contact_type: ContactType::Direct,
            initial: None,
        };
        assert_eq!(event.unit(), Some(UnitId(3)));
        assert_eq!(Event::NewDay { day: 1 }.unit(), None);
    }

    #[test]
    fn trace_results_point_at_the_found_unit() {
        let result = |direction, traced| Event::TraceResult {
            exposing: UnitId(1),
            exposed: UnitId(2),
            contact_type: ContactType::Indirect,
            direction,
            day: 4,
            initiated_day: 4,
            traced,
        };
        assert_eq!(result(TraceDirection::Forward, true).traced_unit(), Some(UnitId(2)));
        assert_eq!(result(TraceDirection::Back, true).traced_unit(), Some(UnitId(1)));
        assert_eq!(result(TraceDirection::Back, false).traced_unit(), None);
    }

    #[test]
    fn trace_reasons() {
        assert_eq!(
            ControlReason::for_trace(ContactType::Direct, TraceDirection::Back),
            ControlReason::TraceBackDirect
        );
        assert_eq!(
            ControlReason::for_trace(ContactType::Indirect, TraceDirection::Forward),
            ControlReason::TraceForwardIndirect
        );
    }
}
