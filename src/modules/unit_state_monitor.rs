//! Reports how many units are in each state (`tsdU*`), how many have entered each state this
//! iteration (`tscU*`), and the day of first detection.

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    module::{SimModule, unexpected_event},
    reporting::{ContextReportingExt, Frequency},
    unit::UnitState,
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[
    EventKind::BeforeAnySimulations,
    EventKind::UnitStateChange,
    EventKind::EndOfDay2,
];

const FIRST_DETECTION: &str = "firstDetection";

pub struct UnitStateMonitor {
    current: [String; UnitState::COUNT],
    cumulative: [String; UnitState::COUNT],
}

impl Default for UnitStateMonitor {
    fn default() -> Self {
        UnitStateMonitor {
            current: UnitState::ALL.map(|state| format!("tsdU{}", state.abbreviation())),
            cumulative: UnitState::ALL.map(|state| format!("tscU{}", state.abbreviation())),
        }
    }
}

impl UnitStateMonitor {
    #[must_use]
    pub fn new() -> Self {
        UnitStateMonitor::default()
    }
}

impl SimModule for UnitStateMonitor {
    fn name(&self) -> &'static str {
        "unit-state-monitor"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, _queue: &mut EventQueue) {
        match *event {
            Event::BeforeAnySimulations => {
                for name in self.current.iter().chain(&self.cumulative) {
                    context.declare_output(name, Frequency::Daily);
                }
                context.declare_output(FIRST_DETECTION, Frequency::Daily);
            }
            Event::UnitStateChange { new_state, .. } => {
                context.add_to_output(&self.cumulative[new_state.index()], 1.0);
            }
            Event::EndOfDay2 { .. } => {
                let counts = context.units().state_counts();
                for (name, count) in self.current.iter().zip(counts) {
                    #[allow(clippy::cast_precision_loss)]
                    let count = count as f64;
                    context.set_output(name, count);
                }
                if let Some(day) = context.iteration().first_detection {
                    context.set_output(FIRST_DETECTION, f64::from(day));
                }
            }
            _ => unexpected_event(self, event),
        }
    }
}

impl Display for UnitStateMonitor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}
