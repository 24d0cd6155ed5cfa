/*!

Detection of clinically ill units by their owners.

At the start of each day every clinical unit not yet detected is reported with a probability
that depends on how long it has shown signs.

An exam of a clinical unit not yet detected finds it with that same probability, scaled by the
exam's multiplier. If the exam finds nothing and asks for it, a diagnostic test is ordered.
Detections made by other modules are remembered so that a unit is never detected twice.

*/

use crate::{
    HashSet,
    context::Context,
    define_rng,
    error::SimError,
    event::{ControlReason, Event, EventKind, EventQueue},
    log::debug,
    module::{SimModule, unexpected_event},
    parameters::Scenario,
    random::ContextRandomExt,
    rel_chart::RelChart,
    unit::{UnitId, UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

define_rng!(DetectionRng);

const EVENTS: &[EventKind] = &[EventKind::NewDay, EventKind::Exam, EventKind::Detection];

pub struct DetectionModel {
    /// Indexed by production type.
    prob_report_vs_days_clinical: Vec<Option<RelChart>>,
    detected: HashSet<UnitId>,
}

impl DetectionModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let mut charts = vec![None; units.production_types().len()];
        for params in &scenario.production_types {
            let (Some(detection), Some(id)) = (&params.detection, units.find_production_type(&params.name)) else {
                continue;
            };
            detection.prob_report_vs_days_clinical.validate()?;
            charts[id] = Some(detection.prob_report_vs_days_clinical.clone());
        }
        Ok(DetectionModel {
            prob_report_vs_days_clinical: charts,
            detected: HashSet::default(),
        })
    }

    fn detect(&mut self, context: &mut Context, day: u32, queue: &mut EventQueue) {
        for id in context.units().infectious_units() {
            let unit = &context.units()[id];
            if unit.state() != UnitState::InfectiousClinical || self.detected.contains(&id) {
                continue;
            }
            let Some(Some(chart)) = self.prob_report_vs_days_clinical.get(unit.production_type()) else {
                continue;
            };
            let p = chart.lookup(f64::from(unit.days_in_state()));
            if context.sample_bool::<DetectionRng>(p) {
                debug!("unit {} detected on day {day}", id.index());
                self.detected.insert(id);
                queue.push(Event::Detection { unit: id, day });
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn examine(
        &mut self,
        context: &mut Context,
        unit: UnitId,
        day: u32,
        reason: ControlReason,
        multiplier: f64,
        test_if_no_signs: bool,
        queue: &mut EventQueue,
    ) {
        let target = &context.units()[unit];
        let Some(Some(chart)) = self.prob_report_vs_days_clinical.get(target.production_type()) else {
            return;
        };
        if target.state() == UnitState::InfectiousClinical && !self.detected.contains(&unit) {
            let p = chart.lookup(f64::from(target.days_in_state())) * multiplier;
            if context.sample_bool::<DetectionRng>(p) {
                debug!("exam detects unit {} on day {day}", unit.index());
                self.detected.insert(unit);
                queue.push(Event::Detection { unit, day });
                return;
            }
        }
        if test_if_no_signs {
            queue.push(Event::Test { unit, day, reason });
        }
    }
}

impl SimModule for DetectionModel {
    fn name(&self) -> &'static str {
        "detection-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::NewDay { day } => self.detect(context, day, queue),
            Event::Exam {
                unit,
                day,
                reason,
                detection_multiplier,
                test_if_no_signs,
            } => self.examine(context, unit, day, reason, detection_multiplier, test_if_no_signs, queue),
            Event::Detection { unit, .. } => {
                self.detected.insert(unit);
            }
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.detected.clear();
    }
}

impl Display for DetectionModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (production_type, chart) in self.prob_report_vs_days_clinical.iter().enumerate() {
            if let Some(chart) = chart {
                write!(f, " type {production_type}: {chart}")?;
            }
        }
        write!(f, ">")
    }
}
