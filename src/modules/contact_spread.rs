/*!

Spread by direct contact (shipments of animals) and indirect contact (people, vehicles and
products moving between units).

Each day every infectious unit of a covered production type sends out a number of shipments to
each recipient production type: a Poisson draw with mean `movement_rate`, or, with a fixed rate,
exactly the whole shipments that fall due that day. Once an outbreak has been detected the rate is
scaled by the `movement_control` chart, read at the number of days since the first detection.

Each shipment draws a distance, and goes to the unit of the recipient type whose distance from
the source is closest to it. Candidates the same distance away (within 0.01 km) are chosen
between with probability proportional to herd size. Destroyed units never receive shipments,
quarantined units never send or receive direct ones, and a shipment that zone rules forbid is
dropped.

Every shipment is announced as a traceable exposure. It is adequate with probability
`prob_infect`, except that direct contact from a unit whose production type has a prevalence
curve uses the source's prevalence instead.

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
    parameters::{ContactKind, ContactSpreadParams, Scenario},
    random::{ContextRandomExt, PeriodSampler},
    rel_chart::RelChart,
    unit::{UnitId, UnitList, UnitState},
};
use rand_distr::Poisson;
use std::fmt::{self, Display, Formatter};

define_rng!(ContactRng);

const EVENTS: &[EventKind] = &[EventKind::BeforeEachSimulation, EventKind::NewDay];

/// Distances this close count as equally good.
const EPSILON: f64 = 0.01;

const KINDS: [ContactKind; 2] = [ContactKind::Direct, ContactKind::Indirect];

fn kind_index(kind: ContactKind) -> usize {
    match kind {
        ContactKind::Direct => 0,
        ContactKind::Indirect => 1,
    }
}

#[derive(Clone, Debug)]
struct ParamBlock {
    movement_rate: f64,
    fixed_movement_rate: Option<f64>,
    distance: PeriodSampler,
    shipping_delay: Option<PeriodSampler>,
    prob_infect: f64,
    latent_units_can_infect: bool,
    subclinical_units_can_infect: bool,
    movement_control: Option<RelChart>,
}

impl ParamBlock {
    fn new(params: &ContactSpreadParams) -> Result<Self, SimError> {
        Ok(ParamBlock {
            movement_rate: params.movement_rate,
            fixed_movement_rate: params.fixed_movement_rate.filter(|rate| *rate > 0.0),
            distance: params.distance.sampler()?,
            shipping_delay: params.shipping_delay.as_ref().map(|d| d.sampler()).transpose()?,
            prob_infect: params.prob_infect,
            latent_units_can_infect: params.latent_units_can_infect,
            subclinical_units_can_infect: params.subclinical_units_can_infect,
            movement_control: params.movement_control.clone(),
        })
    }

    fn can_spread_from(&self, state: UnitState) -> bool {
        match state {
            UnitState::Latent => self.latent_units_can_infect,
            UnitState::InfectiousSubclinical => self.subclinical_units_can_infect,
            _ => true,
        }
    }

    /// How many shipments a source sends today.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn shipment_count(&self, context: &mut Context, day: u32, days_since_detection: u32) -> u32 {
        let factor = self
            .movement_control
            .as_ref()
            .map_or(1.0, |chart| chart.lookup(f64::from(days_since_detection)));
        if let Some(fixed) = self.fixed_movement_rate {
            let rate = fixed * factor;
            let day = f64::from(day);
            return (((day + 1.0) * rate).floor() - (day * rate).floor()).max(0.0) as u32;
        }
        let rate = self.movement_rate * factor;
        if rate <= 0.0 {
            return 0;
        }
        match Poisson::new(rate) {
            Ok(poisson) => context.sample_distr::<ContactRng, f64>(poisson) as u32,
            Err(e) => {
                warn!("cannot draw a number of shipments at rate {rate}: {e}");
                0
            }
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Shipment {
    kind: ContactKind,
    recipient_type: usize,
    distance: f64,
}

/// A unit that could receive a shipment from the current source.
#[derive(Copy, Clone, Debug)]
struct Candidate {
    id: UnitId,
    production_type: usize,
    quarantined: bool,
    size: f64,
    distance: f64,
    forbidden: bool,
}

/// Picks the recipient whose distance is closest to the shipment's, breaking ties by size.
fn choose_recipient(context: &mut Context, shipment: &Shipment, candidates: &[Candidate]) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let mut min_difference = f64::INFINITY;
    let mut cumulative_size = 0.0;
    let eligible = candidates.iter().filter(|c| {
        c.production_type == shipment.recipient_type && !(shipment.kind == ContactKind::Direct && c.quarantined)
    });
    for candidate in eligible {
        let difference = (shipment.distance - candidate.distance).abs();
        match best {
            None => {
                best = Some(*candidate);
                min_difference = difference;
                cumulative_size = candidate.size;
            }
            Some(current) if (difference - min_difference).abs() <= EPSILON => {
                if candidate.forbidden {
                    continue;
                }
                if current.forbidden {
                    cumulative_size += candidate.size - current.size;
                    best = Some(*candidate);
                } else {
                    cumulative_size += candidate.size;
                    if context.sample_uniform::<ContactRng>() < candidate.size / cumulative_size {
                        best = Some(*candidate);
                    }
                }
                min_difference = min_difference.min(difference);
            }
            Some(_) if difference < min_difference => {
                best = Some(*candidate);
                min_difference = difference;
                cumulative_size = candidate.size;
            }
            Some(_) => {}
        }
    }
    best
}

pub struct ContactSpreadModel {
    /// Indexed by contact kind, source production type, then recipient production type.
    blocks: [Vec<Vec<Option<ParamBlock>>>; 2],
    pending: DelayQueue<Event>,
}

impl ContactSpreadModel {
    pub fn new(scenario: &Scenario, units: &UnitList) -> Result<Self, SimError> {
        let count = units.production_types().len();
        let mut blocks = [vec![vec![None; count]; count], vec![vec![None; count]; count]];
        for params in &scenario.contact_spread {
            let (Some(source), Some(recipient)) =
                (units.find_production_type(&params.source), units.find_production_type(&params.recipient))
            else {
                debug!(
                    "no units for {:?} contact from \"{}\" to \"{}\"",
                    params.contact_type, params.source, params.recipient
                );
                continue;
            };
            blocks[kind_index(params.contact_type)][source][recipient] = Some(ParamBlock::new(params)?);
        }
        Ok(ContactSpreadModel {
            blocks,
            pending: DelayQueue::default(),
        })
    }

    fn block(&self, kind: ContactKind, source_type: usize, recipient_type: usize) -> Option<&ParamBlock> {
        self.blocks[kind_index(kind)].get(source_type)?.get(recipient_type)?.as_ref()
    }

    fn spread(&mut self, context: &mut Context, day: u32, queue: &mut EventQueue) {
        for event in self.pending.advance() {
            queue.push(event);
        }
        let days_since_detection = context.iteration().first_detection.map_or(0, |first| day.saturating_sub(first));
        for source in context.units().infectious_units() {
            let shipments = self.plan_shipments(context, source, day, days_since_detection);
            if !shipments.is_empty() {
                self.ship(context, source, day, &shipments, queue);
            }
        }
    }

    fn plan_shipments(&self, context: &mut Context, source: UnitId, day: u32, days_since_detection: u32) -> Vec<Shipment> {
        let (state, quarantined, source_type) = {
            let unit = &context.units()[source];
            (unit.state(), unit.is_quarantined(), unit.production_type())
        };
        let mut shipments = Vec::new();
        for kind in KINDS {
            if kind == ContactKind::Direct && quarantined {
                continue;
            }
            let Some(row) = self.blocks[kind_index(kind)].get(source_type) else {
                continue;
            };
            for (recipient_type, block) in row.iter().enumerate() {
                let Some(block) = block else {
                    continue;
                };
                if !block.can_spread_from(state) {
                    continue;
                }
                for _ in 0..block.shipment_count(context, day, days_since_detection) {
                    let distance = context.sample_distr::<ContactRng, f64>(&block.distance).max(0.0);
                    shipments.push(Shipment {
                        kind,
                        recipient_type,
                        distance,
                    });
                }
            }
        }
        shipments
    }

    fn candidates(context: &Context, source: UnitId, ids: impl IntoIterator<Item = UnitId>) -> Vec<Candidate> {
        let units = context.units();
        let zones = context.zones();
        let from = &units[source];
        let from_fragment = zones.membership_of(source);
        ids.into_iter()
            .filter(|id| *id != source)
            .filter_map(|id| {
                let unit = &units[id];
                (unit.state() != UnitState::Destroyed).then(|| Candidate {
                    id,
                    production_type: unit.production_type(),
                    quarantined: unit.is_quarantined(),
                    size: f64::from(unit.size()),
                    distance: unit.distance_sq(from.x(), from.y()).sqrt(),
                    forbidden: zones.contact_forbidden(from_fragment, zones.membership_of(id)),
                })
            })
            .collect()
    }

    fn ship(&mut self, context: &mut Context, source: UnitId, day: u32, shipments: &[Shipment], queue: &mut EventQueue) {
        let furthest = shipments.iter().map(|s| s.distance).fold(0.0, f64::max);
        let (x, y) = {
            let unit = &context.units()[source];
            (unit.x(), unit.y())
        };
        let nearby = context.units_mut().units_within(x, y, 2.0 * furthest + EPSILON);
        let nearby = ContactSpreadModel::candidates(context, source, nearby);
        let mut everyone: Option<Vec<Candidate>> = None;

        for shipment in shipments {
            let mut recipient = choose_recipient(context, shipment, &nearby);
            if recipient.is_none() {
                if everyone.is_none() {
                    let ids: Vec<UnitId> = context.units().ids().collect();
                    everyone = Some(ContactSpreadModel::candidates(context, source, ids));
                }
                if let Some(all) = &everyone {
                    recipient = choose_recipient(context, shipment, all);
                }
            }
            let Some(recipient) = recipient else {
                trace!("no recipient for a {:?} shipment from unit {}", shipment.kind, source.index());
                continue;
            };
            if recipient.forbidden {
                debug!(
                    "zone rules forbid {:?} contact from unit {} to unit {}",
                    shipment.kind,
                    source.index(),
                    recipient.id.index()
                );
                continue;
            }
            self.expose(context, source, recipient.id, shipment, day, queue);
        }
    }

    fn expose(
        &mut self,
        context: &mut Context,
        source: UnitId,
        recipient: UnitId,
        shipment: &Shipment,
        day: u32,
        queue: &mut EventQueue,
    ) {
        let (source_type, prevalence) = {
            let unit = &context.units()[source];
            (unit.production_type(), unit.prevalence())
        };
        let Some(block) = self.block(shipment.kind, source_type, shipment.recipient_type) else {
            return;
        };
        let p = if shipment.kind == ContactKind::Direct && context.units().prevalence_curve(source_type).is_some() {
            prevalence
        } else {
            block.prob_infect
        };
        let adequate = context.sample_uniform::<ContactRng>() < p;
        let delay = block
            .shipping_delay
            .as_ref()
            .map_or(0, |sampler| whole_days(context.sample_distr::<ContactRng, f64>(sampler), "shipping delay"));
        trace!(
            "{:?} contact from unit {} to unit {}: P = {p}, adequate {adequate}",
            shipment.kind,
            source.index(),
            recipient.index()
        );

        let exposure = Event::Exposure {
            exposing: Some(source),
            exposed: recipient,
            day: day + delay,
            contact_type: ContactType::from(shipment.kind),
            traceable: true,
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

impl SimModule for ContactSpreadModel {
    fn name(&self) -> &'static str {
        "contact-spread-model"
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

impl Display for ContactSpreadModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for kind in KINDS {
            for (source, row) in self.blocks[kind_index(kind)].iter().enumerate() {
                for (recipient, block) in row.iter().enumerate() {
                    if let Some(block) = block {
                        write!(f, " {kind:?} {source}->{recipient}: rate={}", block.movement_rate)?;
                        if let Some(fixed) = block.fixed_movement_rate {
                            write!(f, " (fixed {fixed})")?;
                        }
                        write!(f, " p={}", block.prob_infect)?;
                    }
                }
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{DiseasePeriods, unit_list_at};
    use crate::zone::ZoneList;

    fn scenario(contact_type: &str, extra: &str) -> Scenario {
        Scenario::from_json_str(&format!(
            r#"{{ "iterations": 1, "days": 10, "contact_spread": [{{ "source": "Cattle", "recipient": "Cattle",
                "contact_type": "{contact_type}", "fixed_movement_rate": 1.0,
                "distance": {{ "type": "point", "value": 2 }}, "prob_infect": 1.0 {extra} }}] }}"#
        ))
        .unwrap()
    }

    /// Unit 0 is infectious clinical; the others are susceptible.
    fn setup(points: &[(f64, f64)], contact_type: &str, extra: &str) -> (Context, ContactSpreadModel) {
        let units = unit_list_at(points);
        let model = ContactSpreadModel::new(&scenario(contact_type, extra), &units).unwrap();
        let mut context = Context::with_units(units);
        context.init_random(9);
        context.units_mut()[UnitId(0)].infect(DiseasePeriods::new(0, 0, 10, 10), 0);
        context.units_mut().step_all();
        (context, model)
    }

    fn exposures(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop()).filter(|e| e.kind() == EventKind::Exposure).collect()
    }

    #[test]
    fn shipment_goes_to_the_unit_nearest_the_drawn_distance() {
        let (mut context, mut model) = setup(&[(0.0, 0.0), (1.0, 0.0), (0.0, 2.1), (9.0, 0.0)], "direct", "");
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert_eq!(
            exposures(&mut queue),
            vec![Event::Exposure {
                exposing: Some(UnitId(0)),
                exposed: UnitId(2),
                day: 1,
                contact_type: ContactType::Direct,
                traceable: true,
                adequate: true,
                initial: None,
            }]
        );
    }

    #[test]
    fn falls_back_to_every_unit_when_none_are_near() {
        let (mut context, mut model) = setup(&[(0.0, 0.0), (30.0, 0.0)], "indirect", "");
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        let exposed: Vec<Option<UnitId>> = exposures(&mut queue).iter().map(Event::unit).collect();
        assert_eq!(exposed, vec![Some(UnitId(1))]);
    }

    #[test]
    fn fixed_rate_spreads_shipments_over_days() {
        let (mut context, mut model) = setup(&[(0.0, 0.0), (2.0, 0.0)], "direct", "");
        model.blocks[0][0][0].as_mut().unwrap().fixed_movement_rate = Some(0.5);
        let mut queue = EventQueue::new();
        let mut per_day = Vec::new();
        for day in 0..4 {
            model.run(&mut context, &Event::NewDay { day }, &mut queue);
            per_day.push(exposures(&mut queue).len());
        }
        assert_eq!(per_day, vec![0, 1, 0, 1]);
    }

    #[test]
    fn quarantine_stops_direct_contact_only() {
        let (mut context, mut direct) = setup(&[(0.0, 0.0), (2.0, 0.0)], "direct", "");
        let mut indirect = ContactSpreadModel::new(&scenario("indirect", ""), context.units()).unwrap();
        context.units_mut()[UnitId(0)].quarantine();
        context.units_mut().step_all();
        assert!(context.units()[UnitId(0)].is_quarantined());

        let mut queue = EventQueue::new();
        direct.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert!(exposures(&mut queue).is_empty());
        indirect.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert_eq!(exposures(&mut queue).len(), 1);
    }

    #[test]
    fn latent_units_need_permission() {
        let units = unit_list_at(&[(0.0, 0.0), (2.0, 0.0)]);
        let mut model = ContactSpreadModel::new(&scenario("direct", ""), &units).unwrap();
        let mut context = Context::with_units(units);
        context.init_random(9);
        context.units_mut()[UnitId(0)].infect(DiseasePeriods::new(5, 5, 5, 5), 0);
        context.units_mut().step_all();
        assert_eq!(context.units()[UnitId(0)].state(), UnitState::Latent);

        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert!(exposures(&mut queue).is_empty());

        model.blocks[0][0][0].as_mut().unwrap().latent_units_can_infect = true;
        model.run(&mut context, &Event::NewDay { day: 2 }, &mut queue);
        assert_eq!(exposures(&mut queue).len(), 1);
    }

    #[test]
    fn movement_control_applies_after_first_detection() {
        let (mut context, mut model) = setup(&[(0.0, 0.0), (2.0, 0.0)], "direct", r#", "movement_control": [[0, 1], [1, 0]]"#);
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert_eq!(exposures(&mut queue).len(), 1);

        context.iteration_mut().first_detection = Some(1);
        model.run(&mut context, &Event::NewDay { day: 3 }, &mut queue);
        assert!(exposures(&mut queue).is_empty());
    }

    #[test]
    fn shipping_delay_holds_exposures() {
        let (mut context, mut model) =
            setup(&[(0.0, 0.0), (2.0, 0.0)], "direct", r#", "shipping_delay": { "type": "point", "value": 1 }"#);
        let mut queue = EventQueue::new();
        model.run(&mut context, &Event::NewDay { day: 1 }, &mut queue);
        assert!(exposures(&mut queue).is_empty());
        assert!(model.has_pending_infections());
        model.run(&mut context, &Event::NewDay { day: 2 }, &mut queue);
        let released = exposures(&mut queue);
        assert_eq!(released.len(), 1);
        assert!(matches!(released[0], Event::Exposure { day: 2, .. }));
    }

    #[test]
    fn ties_prefer_units_the_zones_allow() {
        let (mut context, mut model) = setup(&[(0.0, 0.0), (2.0, 0.0), (-2.0, 0.0)], "indirect", "");
        let mut zones = ZoneList::new();
        let zone = zones.append("Surveillance", Some(1), 1.0);
        context.set_zones(zones);
        let fragment = context.zones_mut().get_mut(zone).unwrap().add_focus(2.0, 0.0);
        context.zones_mut().set_membership(UnitId(1), fragment);

        let mut queue = EventQueue::new();
        for day in 1..10 {
            model.run(&mut context, &Event::NewDay { day }, &mut queue);
            let exposed: Vec<Option<UnitId>> = exposures(&mut queue).iter().map(Event::unit).collect();
            assert_eq!(exposed, vec![Some(UnitId(2))]);
        }
    }
}
