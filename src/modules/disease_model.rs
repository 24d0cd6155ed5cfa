/*!

Turns `Infection` events into disease cycles.

For each infected unit the model draws the four stage lengths from its production type's
distributions and registers an `Infect` request. Units that start the simulation partway
through a stage carry an override that stretches or shortens that stage and starts the cycle
part of the way in.

*/

use crate::{
    context::Context,
    define_rng,
    error::SimError,
    event::{Event, EventKind, EventQueue, InitialOverride},
    log::{debug, trace, warn},
    module::{SimModule, unexpected_event},
    parameters::{DiseaseParams, Scenario},
    random::{ContextRandomExt, PeriodSampler},
    rel_chart::RelChart,
    unit::{DiseasePeriods, UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

define_rng!(DiseaseRng);

const EVENTS: &[EventKind] = &[EventKind::BeforeAnySimulations, EventKind::Infection];

struct ParamBlock {
    latent: PeriodSampler,
    infectious_subclinical: PeriodSampler,
    infectious_clinical: PeriodSampler,
    immunity: PeriodSampler,
    prevalence: Option<RelChart>,
}

impl ParamBlock {
    fn new(params: &DiseaseParams) -> Result<Self, SimError> {
        Ok(ParamBlock {
            latent: params.latent_period.sampler()?,
            infectious_subclinical: params.infectious_subclinical_period.sampler()?,
            infectious_clinical: params.infectious_clinical_period.sampler()?,
            immunity: params.immunity_period.sampler()?,
            prevalence: params.prevalence.clone(),
        })
    }
}

pub struct DiseaseModel {
    /// Indexed by production type. `None` for types the model does not cover.
    blocks: Vec<Option<ParamBlock>>,
    production_types: Vec<String>,
}

/// Rounds a sampled duration to whole days. Negative draws become 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn whole_days(value: f64, stage: &str) -> u32 {
    let days = value.round();
    if days.is_nan() || days < 0.0 {
        warn!("distribution returned {value} for {stage} period, using 0 instead");
        return 0;
    }
    days.min(f64::from(u32::MAX)) as u32
}

/// Applies an initial-state override to one stage. Returns the stage length and how many days
/// into the stage the unit already is.
fn override_stage(period: u32, days_in_state: u32, days_left_in_state: u32) -> (u32, u32) {
    match (days_in_state > 0, days_left_in_state > 0) {
        (true, true) => (days_in_state.saturating_add(days_left_in_state), days_in_state),
        (true, false) => (period.max(days_in_state), days_in_state),
        (false, true) => {
            let period = period.max(days_left_in_state);
            (period, period - days_left_in_state)
        }
        (false, false) => (period, 0),
    }
}

/// Stage lengths and the day of the cycle a unit starts on. Sums saturate, so absurd day counts
/// from a population file give a very long cycle rather than an overflow.
fn apply_override(mut periods: DiseasePeriods, initial: Option<&InitialOverride>) -> (DiseasePeriods, u32) {
    let Some(initial) = initial else {
        return (periods, 0);
    };
    let (days_in, days_left) = (initial.days_in_state, initial.days_left_in_state);
    let day_offset = match initial.state {
        UnitState::Latent => {
            let (period, offset) = override_stage(periods.latent, days_in, days_left);
            periods.latent = period;
            offset
        }
        UnitState::InfectiousSubclinical => {
            let (period, offset) = override_stage(periods.infectious_subclinical, days_in, days_left);
            periods.infectious_subclinical = period;
            periods.latent.saturating_add(offset)
        }
        UnitState::InfectiousClinical => {
            let (period, offset) = override_stage(periods.infectious_clinical, days_in, days_left);
            periods.infectious_clinical = period;
            periods
                .latent
                .saturating_add(periods.infectious_subclinical)
                .saturating_add(offset)
        }
        UnitState::NaturallyImmune => {
            let (period, offset) = override_stage(periods.immunity, days_in, days_left);
            periods.immunity = period;
            periods
                .latent
                .saturating_add(periods.infectious_subclinical)
                .saturating_add(periods.infectious_clinical)
                .saturating_add(offset)
        }
        _ => 0,
    };
    (periods, day_offset)
}

impl DiseaseModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let mut blocks: Vec<Option<ParamBlock>> = (0..units.production_types().len()).map(|_| None).collect();
        let mut production_types = Vec::new();
        for params in &scenario.production_types {
            let Some(disease) = &params.disease else {
                continue;
            };
            let Some(id) = units.find_production_type(&params.name) else {
                debug!("no units of production type \"{}\"; ignoring its disease parameters", params.name);
                continue;
            };
            blocks[id] = Some(ParamBlock::new(disease)?);
            production_types.push(params.name.clone());
        }
        if production_types.is_empty() {
            return Err(SimError::ConfigError(
                "disease model has no parameters for any production type in the population".to_string(),
            ));
        }
        Ok(DiseaseModel {
            blocks,
            production_types,
        })
    }

    fn handle_infection(&self, context: &mut Context, event: &Event) {
        let Event::Infection { infected, initial, .. } = event else {
            return;
        };
        let production_type = context.units()[*infected].production_type();
        let Some(Some(block)) = self.blocks.get(production_type) else {
            debug!("unit {} is of a type this model does not cover", infected.index());
            return;
        };

        let periods = DiseasePeriods::new(
            whole_days(context.sample_distr::<DiseaseRng, f64>(&block.latent), "latent"),
            whole_days(
                context.sample_distr::<DiseaseRng, f64>(&block.infectious_subclinical),
                "infectious subclinical",
            ),
            whole_days(
                context.sample_distr::<DiseaseRng, f64>(&block.infectious_clinical),
                "infectious clinical",
            ),
            whole_days(context.sample_distr::<DiseaseRng, f64>(&block.immunity), "immunity"),
        );
        let (periods, day_offset) = apply_override(periods, initial.as_ref());
        trace!(
            "unit {}: latent {} subclinical {} clinical {} immunity {}, starting on day {day_offset}",
            infected.index(),
            periods.latent,
            periods.infectious_subclinical,
            periods.infectious_clinical,
            periods.immunity
        );
        context.units_mut()[*infected].infect(periods, day_offset);
    }
}

impl SimModule for DiseaseModel {
    fn name(&self) -> &'static str {
        "disease-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, _queue: &mut EventQueue) {
        match event {
            Event::BeforeAnySimulations => {
                for (production_type, block) in self.blocks.iter().enumerate() {
                    let curve = block.as_ref().and_then(|b| b.prevalence.clone());
                    context.units_mut().set_prevalence_curve(production_type, curve);
                }
            }
            Event::Infection { .. } => self.handle_infection(context, event),
            _ => unexpected_event(self, event),
        }
    }
}

impl Display for DiseaseModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} for {}>", self.name(), self.production_types.join(", "))
    }
}
