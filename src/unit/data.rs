use crate::{
    HashSet,
    log::{debug, trace},
    rel_chart::RelChart,
    unit::{UnitId, UnitState},
};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The four stage lengths of one disease cycle, in days.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct DiseasePeriods {
    pub latent: u32,
    pub infectious_subclinical: u32,
    pub infectious_clinical: u32,
    pub immunity: u32,
}

impl DiseasePeriods {
    #[must_use]
    pub fn new(latent: u32, infectious_subclinical: u32, infectious_clinical: u32, immunity: u32) -> Self {
        DiseasePeriods {
            latent,
            infectious_subclinical,
            infectious_clinical,
            immunity,
        }
    }

    fn infectious_start_day(&self) -> i64 {
        i64::from(self.latent)
    }

    fn clinical_start_day(&self) -> i64 {
        self.infectious_start_day() + i64::from(self.infectious_subclinical)
    }

    fn immunity_start_day(&self) -> i64 {
        self.clinical_start_day() + i64::from(self.infectious_clinical)
    }

    fn immunity_end_day(&self) -> i64 {
        self.immunity_start_day() + i64::from(self.immunity)
    }
}

/// A deferred mutation, applied during the unit's next `step`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChangeRequest {
    Infect {
        periods: DiseasePeriods,
        day_offset: u32,
    },
    Vaccinate {
        delay: u32,
        immunity_period: u32,
    },
    Quarantine,
    Destroy,
}

/// An observable change made by `Unit::step`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StateChange {
    pub unit_id: UnitId,
    pub old_state: UnitState,
    pub new_state: UnitState,
}

/// A single production unit (farm, herd, premises).
///
/// Everything other modules may change goes through the request methods (`infect`,
/// `vaccinate`, `quarantine`, `destroy`); the requests take effect in `step`, in the
/// order they were registered.
#[derive(Clone, Debug)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) official_id: String,
    pub(crate) production_type: usize,
    pub(crate) production_type_name: Arc<str>,
    pub(crate) size: u32,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) x: f64,
    pub(crate) y: f64,

    pub(crate) state: UnitState,
    pub(crate) initial_state: UnitState,
    pub(crate) days_in_initial_state: u32,
    pub(crate) days_left_in_initial_state: u32,
    pub(crate) days_in_state: u32,
    pub(crate) quarantined: bool,
    pub(crate) prevalence: f64,

    in_vaccine_cycle: bool,
    in_disease_cycle: bool,
    day_in_disease_cycle: u32,
    // Counted down once per step; a transition fires on the step that sees 0. A negative
    // value means the milestone has already passed. The vaccine cycle reuses the two
    // immunity countdowns; the two cycles are never active at once.
    infectious_start_countdown: i64,
    clinical_start_countdown: i64,
    immunity_start_countdown: i64,
    immunity_end_countdown: i64,

    change_requests: Vec<ChangeRequest>,
}

/// Reads a countdown and then decrements it. Returns whether the milestone is today.
fn tick(countdown: &mut i64) -> bool {
    let due = *countdown == 0;
    *countdown -= 1;
    due
}

impl Unit {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: UnitId,
        official_id: String,
        production_type: usize,
        production_type_name: Arc<str>,
        size: u32,
        (latitude, longitude): (f64, f64),
        (x, y): (f64, f64),
        initial_state: UnitState,
    ) -> Self {
        Unit {
            id,
            official_id,
            production_type,
            production_type_name,
            size,
            latitude,
            longitude,
            x,
            y,
            state: UnitState::Susceptible,
            initial_state,
            days_in_initial_state: 0,
            days_left_in_initial_state: 0,
            days_in_state: 0,
            quarantined: false,
            prevalence: 0.0,
            in_vaccine_cycle: false,
            in_disease_cycle: false,
            day_in_disease_cycle: 0,
            infectious_start_countdown: -1,
            clinical_start_countdown: -1,
            immunity_start_countdown: -1,
            immunity_end_countdown: -1,
            change_requests: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[must_use]
    pub fn official_id(&self) -> &str {
        &self.official_id
    }

    #[must_use]
    pub fn production_type(&self) -> usize {
        self.production_type
    }

    #[must_use]
    pub fn production_type_name(&self) -> &str {
        &self.production_type_name
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn state(&self) -> UnitState {
        self.state
    }

    #[must_use]
    pub fn initial_state(&self) -> UnitState {
        self.initial_state
    }

    #[must_use]
    pub fn days_in_initial_state(&self) -> u32 {
        self.days_in_initial_state
    }

    #[must_use]
    pub fn days_left_in_initial_state(&self) -> u32 {
        self.days_left_in_initial_state
    }

    #[must_use]
    pub fn days_in_state(&self) -> u32 {
        self.days_in_state
    }

    #[must_use]
    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    #[must_use]
    pub fn prevalence(&self) -> f64 {
        self.prevalence
    }

    #[must_use]
    pub fn in_disease_cycle(&self) -> bool {
        self.in_disease_cycle
    }

    #[must_use]
    pub fn in_vaccine_cycle(&self) -> bool {
        self.in_vaccine_cycle
    }

    #[must_use]
    pub fn pending_requests(&self) -> &[ChangeRequest] {
        &self.change_requests
    }

    /// Squared planar distance to a point.
    #[must_use]
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }

    pub fn infect(&mut self, periods: DiseasePeriods, day_offset: u32) {
        self.change_requests.push(ChangeRequest::Infect { periods, day_offset });
    }

    pub fn vaccinate(&mut self, delay: u32, immunity_period: u32) {
        self.change_requests.push(ChangeRequest::Vaccinate {
            delay,
            immunity_period,
        });
    }

    pub fn quarantine(&mut self) {
        self.change_requests.push(ChangeRequest::Quarantine);
    }

    pub fn destroy(&mut self) {
        self.change_requests.push(ChangeRequest::Destroy);
    }

    /// Puts the unit back the way it was before any simulation day ran.
    pub(crate) fn reset(&mut self) {
        self.state = UnitState::Susceptible;
        self.days_in_state = 0;
        self.quarantined = false;
        self.prevalence = 0.0;
        self.in_vaccine_cycle = false;
        self.in_disease_cycle = false;
        self.day_in_disease_cycle = 0;
        self.infectious_start_countdown = -1;
        self.clinical_start_countdown = -1;
        self.immunity_start_countdown = -1;
        self.immunity_end_countdown = -1;
        self.change_requests.clear();
    }

    /// Moves to `new_state` if the transition table allows it and keeps `infectious` in sync.
    /// Returns whether the state changed.
    pub(crate) fn change_state(&mut self, new_state: UnitState, infectious: &mut HashSet<UnitId>) -> bool {
        if !self.state.can_transition_to(new_state) {
            debug!(
                "{}->{} transition for unit \"{}\" was not possible",
                self.state, new_state, self.official_id
            );
            return false;
        }
        self.state = new_state;
        self.days_in_state = 0;
        if new_state.is_infected() {
            infectious.insert(self.id);
        } else {
            infectious.remove(&self.id);
        }
        true
    }

    fn apply_infect(&mut self, periods: DiseasePeriods, day_offset: u32, infectious: &mut HashSet<UnitId>) {
        if self.state != UnitState::Susceptible {
            return;
        }
        // An infection overrides vaccine immunity that has not developed yet.
        self.in_vaccine_cycle = false;
        self.in_disease_cycle = true;
        self.day_in_disease_cycle = day_offset;

        let offset = i64::from(day_offset);
        let infectious_start = periods.infectious_start_day();
        let clinical_start = periods.clinical_start_day();
        let immunity_start = periods.immunity_start_day();
        let immunity_end = periods.immunity_end_day();

        // Walk through every stage the offset has already passed, so that each
        // transition is taken in order.
        let mut days_in_state = offset;
        let mut stages = vec![UnitState::Latent];
        if offset >= immunity_end {
            self.in_disease_cycle = false;
            return;
        }
        if offset >= infectious_start {
            stages.push(UnitState::InfectiousSubclinical);
            days_in_state = offset - infectious_start;
        }
        if offset >= clinical_start {
            stages.push(UnitState::InfectiousClinical);
            days_in_state = offset - clinical_start;
        }
        if offset >= immunity_start {
            stages.push(UnitState::NaturallyImmune);
            days_in_state = offset - immunity_start;
        }
        for stage in stages {
            self.change_state(stage, infectious);
        }
        self.days_in_state = u32::try_from(days_in_state).unwrap_or(0);

        let remaining = |milestone: i64| if offset >= milestone { -1 } else { milestone - offset };
        self.infectious_start_countdown = remaining(infectious_start);
        self.clinical_start_countdown = remaining(clinical_start);
        self.immunity_start_countdown = remaining(immunity_start);
        self.immunity_end_countdown = immunity_end - offset;
        trace!(
            "unit \"{}\" infected at day {} of cycle {:?}",
            self.official_id, day_offset, periods
        );
    }

    fn apply_vaccinate(&mut self, delay: u32, immunity_period: u32) {
        if self.state == UnitState::Susceptible && !self.in_vaccine_cycle {
            self.in_vaccine_cycle = true;
            self.immunity_start_countdown = i64::from(delay);
            self.immunity_end_countdown = i64::from(delay) + i64::from(immunity_period);
        } else if self.state == UnitState::VaccineImmune {
            // Revaccination extends immunity.
            self.immunity_end_countdown = i64::from(immunity_period);
        }
    }

    fn apply_destroy(&mut self, infectious: &mut HashSet<UnitId>) {
        self.in_vaccine_cycle = false;
        self.in_disease_cycle = false;
        self.change_state(UnitState::Destroyed, infectious);
    }

    fn apply_change_request(&mut self, request: ChangeRequest, infectious: &mut HashSet<UnitId>) {
        match request {
            ChangeRequest::Infect { periods, day_offset } => self.apply_infect(periods, day_offset, infectious),
            ChangeRequest::Vaccinate {
                delay,
                immunity_period,
            } => self.apply_vaccinate(delay, immunity_period),
            ChangeRequest::Quarantine => self.quarantined = true,
            ChangeRequest::Destroy => self.apply_destroy(infectious),
        }
    }

    /// Advances the unit by one day.
    ///
    /// Pending change requests are applied in registration order and cleared, then the vaccine
    /// and disease countdowns advance. A countdown that reads 0 fires its transition, and
    /// several may fire in one step, always in the order infectious start, clinical start,
    /// immunity start, immunity end.
    pub(crate) fn step(
        &mut self,
        prevalence_curve: Option<&RelChart>,
        infectious: &mut HashSet<UnitId>,
    ) -> Option<StateChange> {
        let old_state = self.state;
        self.days_in_state += 1;

        for request in std::mem::take(&mut self.change_requests) {
            self.apply_change_request(request, infectious);
        }

        if self.in_vaccine_cycle {
            if tick(&mut self.immunity_start_countdown) {
                self.change_state(UnitState::VaccineImmune, infectious);
            }
            if tick(&mut self.immunity_end_countdown) {
                self.change_state(UnitState::Susceptible, infectious);
                self.in_vaccine_cycle = false;
            }
        }

        if self.in_disease_cycle {
            self.prevalence = if self.immunity_start_countdown > 0 {
                match prevalence_curve {
                    None => 1.0,
                    Some(curve) => {
                        let day = f64::from(self.day_in_disease_cycle);
                        #[allow(clippy::cast_precision_loss)]
                        let remaining = self.immunity_start_countdown as f64;
                        curve.lookup((0.5 + day) / (day + remaining))
                    }
                }
            } else {
                0.0
            };

            self.day_in_disease_cycle += 1;
            if tick(&mut self.infectious_start_countdown) {
                self.change_state(UnitState::InfectiousSubclinical, infectious);
            }
            if tick(&mut self.clinical_start_countdown) {
                self.change_state(UnitState::InfectiousClinical, infectious);
            }
            if tick(&mut self.immunity_start_countdown) {
                self.change_state(UnitState::NaturallyImmune, infectious);
            }
            if tick(&mut self.immunity_end_countdown) {
                self.change_state(UnitState::Susceptible, infectious);
                self.in_disease_cycle = false;
            }
        }

        (self.state != old_state).then_some(StateChange {
            unit_id: self.id,
            old_state,
            new_state: self.state,
        })
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<unit {} \"{}\" {} size={} {} for {} day(s)",
            self.id.index(),
            self.official_id,
            self.production_type_name,
            self.size,
            self.state,
            self.days_in_state
        )?;
        if self.quarantined {
            write!(f, " quarantined")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_unit(index: usize) -> Unit {
        Unit::new(
            UnitId(index),
            format!("farm-{index}"),
            0,
            Arc::from("Cattle"),
            100,
            (0.0, 0.0),
            (0.0, 0.0),
            UnitState::Susceptible,
        )
    }

    fn step(unit: &mut Unit, infectious: &mut HashSet<UnitId>) -> Option<StateChange> {
        unit.step(None, infectious)
    }

    #[test]
    fn invalid_transitions_leave_unit_untouched() {
        for from in UnitState::ALL {
            for to in UnitState::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let mut unit = make_unit(0);
                let mut infectious = HashSet::default();
                unit.state = from;
                unit.days_in_state = 7;
                assert!(!unit.change_state(to, &mut infectious));
                assert_eq!(unit.state(), from);
                assert_eq!(unit.days_in_state(), 7);
            }
        }
    }

    #[test]
    fn day_offset_equal_to_latent_period_lands_in_subclinical() {
        let periods = DiseasePeriods::new(4, 3, 2, 10);
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(periods, 4);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::InfectiousSubclinical);
        assert_eq!(unit.days_in_state(), 0);

        let mut unit = make_unit(1);
        unit.infect(periods, 3);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Latent);
        assert_eq!(unit.days_in_state(), 3);
    }

    #[test]
    fn vaccinate_then_destroy_ends_destroyed() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.vaccinate(0, 30);
        unit.destroy();
        let change = step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Destroyed);
        assert!(!unit.in_vaccine_cycle());
        assert_eq!(
            change,
            Some(StateChange {
                unit_id: UnitId(0),
                old_state: UnitState::Susceptible,
                new_state: UnitState::Destroyed
            })
        );
        assert!(unit.pending_requests().is_empty());
    }

    #[test]
    fn destroyed_unit_cannot_be_infected() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.destroy();
        unit.infect(DiseasePeriods::new(1, 1, 1, 1), 0);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Destroyed);
        assert!(!unit.in_disease_cycle());
        assert!(infectious.is_empty());
    }

    #[test]
    fn full_disease_cycle_timeline() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(2, 1, 3, 5), 0);
        let mut timeline = Vec::new();
        for _day in 1..=13 {
            step(&mut unit, &mut infectious);
            timeline.push(unit.state().letter());
        }
        let timeline: String = timeline.into_iter().collect();
        assert_eq!(timeline, "LLBCCCNNNNNSS");
        assert!(!unit.in_disease_cycle());
        assert!(infectious.is_empty());
    }

    #[test]
    fn infectious_set_tracks_infected_states() {
        let mut unit = make_unit(3);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(1, 1, 1, 1), 0);
        step(&mut unit, &mut infectious);
        assert!(infectious.contains(&UnitId(3)));
        step(&mut unit, &mut infectious); // subclinical
        step(&mut unit, &mut infectious); // clinical
        assert!(infectious.contains(&UnitId(3)));
        step(&mut unit, &mut infectious); // naturally immune
        assert_eq!(unit.state(), UnitState::NaturallyImmune);
        assert!(!infectious.contains(&UnitId(3)));
    }

    #[test]
    fn offset_past_immunity_start_passes_every_stage() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(2, 1, 3, 5), 7);
        let change = step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::NaturallyImmune);
        assert_eq!(unit.days_in_state(), 1);
        assert!(infectious.is_empty());
        assert_eq!(change.map(|c| c.new_state), Some(UnitState::NaturallyImmune));
        // Immunity ends on day 11 of the cycle.
        for _ in 0..3 {
            step(&mut unit, &mut infectious);
        }
        assert_eq!(unit.state(), UnitState::NaturallyImmune);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Susceptible);
    }

    #[test]
    fn offset_past_cycle_end_does_nothing() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(1, 1, 1, 1), 4);
        assert_eq!(step(&mut unit, &mut infectious), None);
        assert_eq!(unit.state(), UnitState::Susceptible);
        assert!(!unit.in_disease_cycle());
    }

    #[test]
    fn vaccine_cycle_with_delay() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.vaccinate(2, 3);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Susceptible);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Susceptible);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::VaccineImmune);
        step(&mut unit, &mut infectious);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::VaccineImmune);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Susceptible);
        assert!(!unit.in_vaccine_cycle());
    }

    #[test]
    fn revaccination_refreshes_immunity() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.vaccinate(0, 2);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::VaccineImmune);

        unit.vaccinate(0, 10);
        for _ in 0..9 {
            step(&mut unit, &mut infectious);
            assert_eq!(unit.state(), UnitState::VaccineImmune);
        }
        let mut steps = 0;
        while unit.state() == UnitState::VaccineImmune && steps < 5 {
            step(&mut unit, &mut infectious);
            steps += 1;
        }
        assert_eq!(unit.state(), UnitState::Susceptible);
        assert!(!unit.in_vaccine_cycle());
    }

    #[test]
    fn one_day_vaccine_cycle() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.vaccinate(0, 0);
        let change = step(&mut unit, &mut infectious);
        // Immune and back to susceptible in the same step.
        assert_eq!(unit.state(), UnitState::Susceptible);
        assert_eq!(change, None);
        assert!(!unit.in_vaccine_cycle());
    }

    #[test]
    fn infection_cancels_developing_vaccine_immunity() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.vaccinate(5, 10);
        step(&mut unit, &mut infectious);
        unit.infect(DiseasePeriods::new(3, 1, 1, 1), 0);
        step(&mut unit, &mut infectious);
        assert_eq!(unit.state(), UnitState::Latent);
        assert!(!unit.in_vaccine_cycle());
    }

    #[test]
    fn quarantine_is_independent_of_state() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.quarantine();
        assert_eq!(step(&mut unit, &mut infectious), None);
        assert!(unit.is_quarantined());
        assert_eq!(unit.state(), UnitState::Susceptible);
    }

    #[test]
    fn prevalence_follows_curve() {
        let curve = RelChart::Generic(vec![[0.0, 0.0], [1.0, 1.0]]);
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(1, 1, 2, 5), 0);
        unit.step(Some(&curve), &mut infectious);
        // Day 0 of a cycle with 4 days until immunity.
        assert!((unit.prevalence() - 0.5 / 4.0).abs() < 1e-12);
        unit.step(Some(&curve), &mut infectious);
        assert!((unit.prevalence() - 1.5 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_everything() {
        let mut unit = make_unit(0);
        let mut infectious = HashSet::default();
        unit.infect(DiseasePeriods::new(1, 1, 1, 1), 0);
        unit.quarantine();
        step(&mut unit, &mut infectious);
        unit.vaccinate(1, 1);
        unit.reset();
        assert_eq!(unit.state(), UnitState::Susceptible);
        assert!(!unit.is_quarantined());
        assert!(!unit.in_disease_cycle());
        assert!(unit.pending_requests().is_empty());
        assert_eq!(unit.days_in_state(), 0);
    }
}
