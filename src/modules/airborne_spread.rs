/*!

Airborne spread between units.

Each day every infectious (subclinical or clinical) unit of a covered production type exposes
the units around it. A target must lie within `max_spread` km and inside the wind sector, which
runs clockwise from `wind_direction_start` to `wind_direction_end` as seen from the source. The
chance of an adequate exposure is

```text
P = size factor(source) * prevalence(source) * prob_spread_1km
    * (max_spread - distance) / (max_spread - 1) * size factor(target)
```

where a unit's size factor is twice the fraction of herds smaller than it, counting herds of the
same size as half. Every exposure is announced, adequate or not, and none are traceable.

*/

use super::disease_model::whole_days;
use crate::{
    context::Context,
    define_rng,
    delay_queue::DelayQueue,
    error::SimError,
    event::{ContactType, Event, EventKind, EventQueue},
    log::{debug, trace, warn},
    module::{SimModule, unexpected_event},
    parameters::{AirborneSpreadParams, Scenario},
    random::{ContextRandomExt, PeriodSampler},
    unit::{UnitId, UnitList, UnitState},
};
use std::fmt::{self, Display, Formatter};

define_rng!(AirborneRng);

const EVENTS: &[EventKind] = &[EventKind::BeforeEachSimulation, EventKind::NewDay];

/// Headings this close to the edge of the wind sector count as inside it.
const EPSILON: f64 = 0.01;

#[derive(Clone, Debug)]
struct ParamBlock {
    prob_spread_1km: f64,
    wind_start: f64,
    wind_end: f64,
    max_spread: f64,
    delay: Option<PeriodSampler>,
}

impl ParamBlock {
    fn new(params: &AirborneSpreadParams) -> Result<Self, SimError> {
        let mut prob_spread_1km = params.prob_spread_1km;
        let wind_start = params.wind_direction_start.rem_euclid(360.0);
        let mut wind_end = params.wind_direction_end.rem_euclid(360.0);
        if wind_end == 0.0 && params.wind_direction_end > 0.0 {
            wind_end = 360.0;
        }
        // A 0..0 sector would still let headings within EPSILON of north through.
        if wind_start == 0.0 && wind_end == 0.0 {
            prob_spread_1km = 0.0;
        }
        let mut max_spread = params.max_spread.max(0.0);
        if max_spread <= 1.0 {
            warn!(
                "maximum airborne spread from \"{}\" to \"{}\" is {} km, at most 1 km: no airborne spread will be used",
                params.source, params.recipient, params.max_spread
            );
            max_spread = 2.0;
            prob_spread_1km = 0.0;
        }
        Ok(ParamBlock {
            prob_spread_1km,
            wind_start,
            wind_end,
            max_spread,
            delay: params.delay.as_ref().map(|d| d.sampler()).transpose()?,
        })
    }

    fn in_wind_sector(&self, heading: f64) -> bool {
        let before_start = self.wind_start - heading > EPSILON;
        let after_end = heading - self.wind_end >= EPSILON;
        if self.wind_start > self.wind_end {
            // The sector crosses north.
            !(before_start && after_end)
        } else {
            !(before_start || after_end)
        }
    }
}

/// Compass heading from `(x1, y1)` to `(x2, y2)` in degrees: 0 is north, 90 is east.
pub(crate) fn heading(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let heading = (x2 - x1).atan2(y2 - y1).to_degrees();
    if heading < 0.0 { heading + 360.0 } else { heading }
}

/// Twice each unit's position in the herd size distribution, so the factors average 1.
fn size_factors(units: &UnitList) -> Vec<f64> {
    let mut sizes: Vec<u32> = units.iter().map(|unit| unit.size()).collect();
    sizes.sort_unstable();
    #[allow(clippy::cast_precision_loss)]
    let n = sizes.len() as f64;
    units
        .iter()
        .map(|unit| {
            let smaller = sizes.partition_point(|s| *s < unit.size());
            let same = sizes.partition_point(|s| *s <= unit.size()) - smaller;
            #[allow(clippy::cast_precision_loss)]
            let below = smaller as f64 + 0.5 * same as f64;
            2.0 * below / n
        })
        .collect()
}

pub struct AirborneSpreadModel {
    /// Indexed by source production type, then recipient production type.
    blocks: Vec<Vec<Option<ParamBlock>>>,
    /// Furthest reach from each source production type.
    max_spread: Vec<f64>,
    size_factors: Vec<f64>,
    pending: DelayQueue<Event>,
}

impl AirborneSpreadModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let count = units.production_types().len();
        let mut blocks = vec![vec![None; count]; count];
        let mut max_spread = vec![0.0_f64; count];
        for params in &scenario.airborne_spread {
            let (Some(source), Some(recipient)) =
                (units.find_production_type(&params.source), units.find_production_type(&params.recipient))
            else {
                debug!("no units for airborne spread from \"{}\" to \"{}\"", params.source, params.recipient);
                continue;
            };
            let block = ParamBlock::new(params)?;
            max_spread[source] = max_spread[source].max(block.max_spread);
            blocks[source][recipient] = Some(block);
        }
        Ok(AirborneSpreadModel {
            blocks,
            max_spread,
            size_factors: size_factors(units),
            pending: DelayQueue::default(),
        })
    }

    fn spread(&mut self, context: &mut Context, day: u32, queue: &mut EventQueue) {
        for event in self.pending.advance() {
            queue.push(event);
        }

        for source in context.units().infectious_units() {
            let (x, y, production_type, prevalence) = {
                let unit = &context.units()[source];
                if !matches!(unit.state(), UnitState::InfectiousSubclinical | UnitState::InfectiousClinical) {
                    continue;
                }
                (unit.x(), unit.y(), unit.production_type(), unit.prevalence())
            };
            let Some(row) = self.blocks.get(production_type) else {
                continue;
            };
            if row.iter().all(Option::is_none) {
                continue;
            }
            let radius = self.max_spread[production_type] + EPSILON;
            for target in context.units_mut().units_within(x, y, radius) {
                if target != source {
                    self.expose(context, source, target, prevalence, day, queue);
                }
            }
        }
    }

    fn expose(
        &mut self,
        context: &mut Context,
        source: UnitId,
        target: UnitId,
        prevalence: f64,
        day: u32,
        queue: &mut EventQueue,
    ) {
        let (distance, heading, block) = {
            let from = &context.units()[source];
            let to = &context.units()[target];
            if to.state() == UnitState::Destroyed {
                return;
            }
            let Some(Some(block)) = self.blocks[from.production_type()].get(to.production_type()) else {
                return;
            };
            (to.distance_sq(from.x(), from.y()).sqrt(), heading(from.x(), from.y(), to.x(), to.y()), block)
        };
        if !block.in_wind_sector(heading) {
            trace!("unit {} outside wind sector ({heading:.1})", target.index());
            return;
        }

        let distance_factor = (block.max_spread - distance) / (block.max_spread - 1.0);
        let p = self.size_factors[source.index()]
            * prevalence
            * block.prob_spread_1km
            * distance_factor
            * self.size_factors[target.index()];
        let delay = block
            .delay
            .clone()
            .map_or(0, |sampler| whole_days(context.sample_distr::<AirborneRng, f64>(sampler), "airborne delay"));
        let adequate = context.sample_uniform::<AirborneRng>() < p;
        trace!("unit {} -> unit {}: P = {p}, adequate {adequate}", source.index(), target.index());

        let exposure = Event::Exposure {
            exposing: Some(source),
            exposed: target,
            day: day + delay,
            contact_type: ContactType::Airborne,
            traceable: false,
            adequate,
            initial: None,
        };
        if delay == 0 {
            queue.push(exposure);
        } else {
            self.pending.push(delay as usize, exposure);
        }
    }
}

impl SimModule for AirborneSpreadModel {
    fn name(&self) -> &'static str {
        "airborne-spread-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeEachSimulation { .. } => self.reset(),
            Event::NewDay { day } => self.spread(context, day, queue),
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
    }

    fn has_pending_infections(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Display for AirborneSpreadModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (source, row) in self.blocks.iter().enumerate() {
            for (recipient, block) in row.iter().enumerate() {
                if let Some(block) = block {
                    write!(
                        f,
                        " {source}->{recipient}: p1km={} wind={}..{} max={}",
                        block.prob_spread_1km, block.wind_start, block.wind_end, block.max_spread
                    )?;
                }
            }
        }
        write!(f, ">")
    }
}
