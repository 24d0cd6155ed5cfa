//! Writes every output variable that is due at the end of each day to the log.

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    log::info,
    module::{SimModule, unexpected_event},
    reporting::{ContextReportingExt, OutputDeclaration},
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::DeclarationOfOutputs, EventKind::EndOfDay2];

#[derive(Default)]
pub struct OutputLogger {
    declarations: Vec<OutputDeclaration>,
    last_report: Vec<(String, f64)>,
}

impl OutputLogger {
    #[must_use]
    pub fn new() -> Self {
        OutputLogger::default()
    }

    #[must_use]
    pub fn declarations(&self) -> &[OutputDeclaration] {
        &self.declarations
    }

    /// The variables logged at the end of the most recent day.
    #[must_use]
    pub fn last_report(&self) -> &[(String, f64)] {
        &self.last_report
    }
}

impl SimModule for OutputLogger {
    fn name(&self) -> &'static str {
        "output-logger"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, _queue: &mut EventQueue) {
        match event {
            Event::DeclarationOfOutputs { outputs } => {
                info!("{} output variable(s) declared", outputs.len());
                self.declarations.clone_from(outputs);
            }
            Event::EndOfDay2 { day, done } => {
                self.last_report = context.outputs_due(*day, *done);
                let iteration = context.iteration().number;
                for (name, value) in &self.last_report {
                    info!("iteration {iteration} day {day}: {name} = {value}");
                }
            }
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.last_report.clear();
    }
}

impl Display for OutputLogger {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} for {} variable(s)>", self.name(), self.declarations.len())
    }
}
