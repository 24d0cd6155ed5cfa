/*!

Runs the Monte Carlo iterations and, within each, the simulated days.

Every day follows the same fixed sequence, and the event queue is drained after each step
before the next one starts:

1. `NewDay(d)`
2. the early-exit check
3. `EndOfDay(d, done)`
4. every unit steps, and a `UnitStateChange` is queued for each visible change
5. `Midnight(d)`, when queued zone foci are applied
6. `EndOfDay2(d, done)`, when outputs are reported

Day 0 is a shortened version of the same thing that puts units into their starting states.

The scheduler itself watches every event as it is dispatched: `Detection` events set the
iteration's first-detection day, and each event observers care about is passed to the
context's notification sink.

*/

use crate::{
    context::{Context, IterationData},
    error::SimError,
    event::{Event, EventQueue},
    log::{debug, info, trace},
    module::SimModule,
    module_loader::load_modules,
    notify::Notification,
    parameters::Scenario,
    random::ContextRandomExt,
    reporting::ContextReportingExt,
};
use std::time::SystemTime;

pub struct Scheduler {
    scenario: Scenario,
    modules: Vec<Box<dyn SimModule>>,
    queue: EventQueue,
}

impl Scheduler {
    #[must_use]
    pub fn new(scenario: Scenario, modules: Vec<Box<dyn SimModule>>) -> Self {
        Scheduler {
            scenario,
            modules,
            queue: EventQueue::new(),
        }
    }

    /// Loads the modules the scenario calls for against the units already in `context`.
    ///
    /// # Errors
    ///
    /// Whatever `load_modules` reports.
    pub fn from_scenario(scenario: Scenario, context: &mut Context) -> Result<Self, SimError> {
        let modules = load_modules(&scenario, context)?;
        Ok(Scheduler::new(scenario, modules))
    }

    #[must_use]
    pub fn modules(&self) -> &[Box<dyn SimModule>] {
        &self.modules
    }

    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Runs every iteration and returns each one's bookkeeping.
    pub fn run(&mut self, context: &mut Context) -> Vec<IterationData> {
        self.begin_run(context);
        let mut results = Vec::with_capacity(self.scenario.iterations as usize);
        for iteration in 0..self.scenario.iterations {
            results.push(self.run_iteration(context, iteration));
        }
        if let Some(start) = context.scenario().start_time {
            if let Ok(elapsed) = start.elapsed() {
                info!("{} iteration(s) finished in {:.3}s", results.len(), elapsed.as_secs_f64());
            }
        }
        results
    }

    /// Announces the output directory, lets modules prepare, then publishes the output
    /// variables they declared.
    pub fn begin_run(&mut self, context: &mut Context) {
        let scenario_info = context.scenario_mut();
        scenario_info.iterations = self.scenario.iterations;
        scenario_info.days = self.scenario.days;
        scenario_info.start_time = Some(SystemTime::now());
        for module in &self.modules {
            debug!("{module}");
        }

        self.push_and_drain(
            context,
            Event::OutputDirectory {
                path: self.scenario.output_directory.clone(),
            },
        );
        self.push_and_drain(context, Event::BeforeAnySimulations);
        let outputs = context.output_declarations();
        self.push_and_drain(context, Event::DeclarationOfOutputs { outputs });
    }

    /// Runs one iteration to its last day or its early exit.
    pub fn run_iteration(&mut self, context: &mut Context, iteration: u32) -> IterationData {
        self.start_iteration(context, iteration);
        for day in 1..=self.scenario.days {
            if self.run_day(context, day) {
                break;
            }
        }
        let summary = context.iteration().clone();
        info!(
            "iteration {iteration} ended on day {}{}",
            summary.day,
            if summary.early_exit { " (early exit)" } else { "" }
        );
        summary
    }

    /// Resets everything and runs day 0, leaving units in their starting states.
    pub fn start_iteration(&mut self, context: &mut Context, iteration: u32) {
        let seed = self
            .scenario
            .seed
            .wrapping_add(u64::from(self.scenario.starting_iteration_number))
            .wrapping_add(u64::from(iteration));
        context.init_random(seed);
        debug!("iteration {iteration}: seed {seed}");

        context.units_mut().reset();
        let unit_count = context.units().len();
        context.zones_mut().reset(unit_count);
        for module in &mut self.modules {
            module.reset();
        }
        context.reset_outputs();
        *context.iteration_mut() = IterationData {
            number: iteration,
            ..IterationData::default()
        };
        self.queue.clear();

        self.push_and_drain(context, Event::BeforeEachSimulation { iteration });
        self.push_and_drain(context, Event::EndOfDay { day: 0, done: false });
        self.step_units(context, 0);
        self.push_and_drain(context, Event::Midnight { day: 0 });
    }

    /// Runs one day. Returns whether the iteration is over.
    pub fn run_day(&mut self, context: &mut Context, day: u32) -> bool {
        context.iteration_mut().day = day;
        self.push_and_drain(context, Event::NewDay { day });

        let done = self.check_early_exit(context, day) || day >= self.scenario.days;

        self.push_and_drain(context, Event::EndOfDay { day, done });
        self.step_units(context, day);
        self.push_and_drain(context, Event::Midnight { day });
        self.push_and_drain(context, Event::EndOfDay2 { day, done });
        done
    }

    fn check_early_exit(&self, context: &mut Context, day: u32) -> bool {
        let pending_infections = self.modules.iter().any(|m| m.has_pending_infections());
        let pending_actions = self.modules.iter().any(|m| m.has_pending_actions());
        let disease_over = context.units().infectious_count() == 0 && !pending_infections;

        let iteration = context.iteration_mut();
        if disease_over && !iteration.disease_ended {
            iteration.disease_ended = true;
            iteration.disease_end_day = Some(day);
            debug!("disease has ended on day {day}");
        }

        let stop = !pending_actions
            && ((self.scenario.stop_on_disease_end && disease_over)
                || (self.scenario.stop_on_first_detection && iteration.first_detection.is_some()));
        if stop {
            iteration.early_exit = true;
        }
        stop
    }

    fn step_units(&mut self, context: &mut Context, day: u32) {
        let changes = context.units_mut().step_all();
        trace!("day {day}: {} unit(s) changed state", changes.len());
        for change in changes {
            self.queue.push(Event::UnitStateChange {
                unit: change.unit_id,
                old_state: change.old_state,
                new_state: change.new_state,
                day,
            });
        }
        self.drain(context);
    }

    fn push_and_drain(&mut self, context: &mut Context, event: Event) {
        self.queue.push(event);
        self.drain(context);
    }

    /// Hands out queued events, including any the handlers add, until the queue is empty.
    fn drain(&mut self, context: &mut Context) {
        while let Some(event) = self.queue.pop() {
            trace!("{event}");
            observe(context, &event);
            let kind = event.kind();
            for module in &mut self.modules {
                if module.is_listening_for(kind) {
                    module.run(context, &event, &mut self.queue);
                }
            }
        }
    }
}

fn observe(context: &mut Context, event: &Event) {
    if let Event::Detection { day, .. } = *event {
        let iteration = context.iteration_mut();
        iteration.detections += 1;
        if iteration.first_detection.is_none() {
            info!("first detection on day {day}");
            iteration.first_detection = Some(day);
        }
    }
    if let Some(notification) = Notification::from_event(event) {
        context.notify(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ContactType, EventKind};
    use crate::module::unexpected_event;
    use crate::modules::{ContactSpreadModel, DiseaseModel, PopulationModel};
    use crate::unit::{UnitId, UnitState, unit_list_at};
    use std::cell::RefCell;
    use std::fmt::{self, Display, Formatter};
    use std::rc::Rc;

    const SEEDER_EVENTS: &[EventKind] = &[EventKind::BeforeEachSimulation, EventKind::NewDay];

    /// Infects unit 0 and reports it detected on chosen days.
    struct Seeder {
        infect_on: Option<u32>,
        detect_on: Option<u32>,
    }

    impl Seeder {
        fn emit(&self, day: u32, queue: &mut EventQueue) {
            if self.infect_on == Some(day) {
                queue.push(Event::Infection {
                    infecting: None,
                    infected: UnitId(0),
                    day,
                    contact_type: ContactType::Direct,
                    initial: None,
                });
            }
            if self.detect_on == Some(day) {
                queue.push(Event::Detection { unit: UnitId(0), day });
            }
        }
    }

    impl SimModule for Seeder {
        fn name(&self) -> &'static str {
            "seeder"
        }

        fn events_listened_for(&self) -> &'static [EventKind] {
            SEEDER_EVENTS
        }

        fn run(&mut self, _context: &mut Context, event: &Event, queue: &mut EventQueue) {
            match *event {
                Event::BeforeEachSimulation { .. } => self.emit(0, queue),
                Event::NewDay { day } => self.emit(day, queue),
                _ => unexpected_event(self, event),
            }
        }
    }

    impl Display for Seeder {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "<{}>", self.name())
        }
    }

    fn scenario(days: u32, flags: &str) -> Scenario {
        Scenario::from_json_str(&format!(
            r#"{{ "iterations": 1, "days": {days}, {flags}
                "production_types": [{{ "name": "Cattle", "disease": {{
                    "latent_period": {{ "type": "point", "value": 2 }},
                    "infectious_subclinical_period": {{ "type": "point", "value": 1 }},
                    "infectious_clinical_period": {{ "type": "point", "value": 3 }},
                    "immunity_period": {{ "type": "point", "value": 5 }} }} }}] }}"#
        ))
        .unwrap()
    }

    fn scheduler(context: &Context, scenario: Scenario, seeder: Seeder) -> Scheduler {
        let disease = DiseaseModel::new(&scenario, context.units()).unwrap();
        Scheduler::new(scenario, vec![Box::new(seeder), Box::new(disease)])
    }

    #[test]
    fn disease_cycle_day_by_day() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0), (10.0, 10.0)]));
        let seeder = Seeder {
            infect_on: Some(1),
            detect_on: None,
        };
        let mut scheduler = scheduler(&context, scenario(12, r#""stop_on_disease_end": false,"#), seeder);
        scheduler.begin_run(&mut context);
        scheduler.start_iteration(&mut context, 0);

        let mut timeline = String::new();
        for day in 1..=12 {
            let done = scheduler.run_day(&mut context, day);
            assert_eq!(done, day == 12);
            timeline.push(context.units()[UnitId(0)].state().letter());
            assert_eq!(context.units()[UnitId(1)].state(), UnitState::Susceptible);
        }
        assert_eq!(timeline, "LLBCCCNNNNNS");
    }

    #[test]
    fn direct_contact_carries_the_disease_to_a_neighbour() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0), (10.0, 0.0)]));
        let flags = r#""stop_on_disease_end": false,
            "contact_spread": [{ "source": "Cattle", "recipient": "Cattle", "contact_type": "direct",
                "movement_rate": 0, "fixed_movement_rate": 1, "prob_infect": 1,
                "distance": { "type": "point", "value": 10 } }],"#;
        let scenario = scenario(8, flags);
        let disease = DiseaseModel::new(&scenario, context.units()).unwrap();
        let spread = ContactSpreadModel::new(&scenario, context.units()).unwrap();
        let seeder = Seeder {
            infect_on: Some(1),
            detect_on: None,
        };
        let modules: Vec<Box<dyn SimModule>> = vec![
            Box::new(seeder),
            Box::new(disease),
            Box::new(spread),
            Box::new(PopulationModel::new()),
        ];
        let mut scheduler = Scheduler::new(scenario, modules);
        scheduler.begin_run(&mut context);
        scheduler.start_iteration(&mut context, 0);

        // Unit 0 is latent on days 1 and 2 and cannot ship infection yet.
        for day in 1..=2 {
            scheduler.run_day(&mut context, day);
            assert_eq!(context.units()[UnitId(1)].state(), UnitState::Susceptible);
        }
        for day in 3..=5 {
            scheduler.run_day(&mut context, day);
        }
        assert!(context.units()[UnitId(1)].in_disease_cycle());
    }

    #[test]
    fn stops_when_the_disease_is_gone() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let seeder = Seeder {
            infect_on: Some(0),
            detect_on: None,
        };
        let mut scheduler = scheduler(&context, scenario(100, ""), seeder);
        let results = scheduler.run(&mut context);
        assert_eq!(results.len(), 1);
        // Latent on day 0, naturally immune after the step on day 6.
        let summary = &results[0];
        assert!(summary.early_exit);
        assert!(summary.disease_ended);
        assert_eq!(summary.disease_end_day, Some(7));
        assert_eq!(summary.day, 7);
        assert_eq!(context.units()[UnitId(0)].state(), UnitState::NaturallyImmune);
    }

    #[test]
    fn stops_on_first_detection_and_notifies() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&seen);
        context.set_notification_sink(Box::new(move |n: Notification| recorder.borrow_mut().push(n)));

        let seeder = Seeder {
            infect_on: Some(0),
            detect_on: Some(2),
        };
        let flags = r#""stop_on_disease_end": false, "stop_on_first_detection": true,"#;
        let mut scheduler = scheduler(&context, scenario(100, flags), seeder);
        let results = scheduler.run(&mut context);
        assert_eq!(results[0].first_detection, Some(2));
        assert_eq!(results[0].detections, 1);
        assert_eq!(results[0].day, 2);
        assert!(results[0].early_exit);

        let seen = seen.borrow();
        assert!(seen.contains(&Notification::Detection { unit: UnitId(0), day: 2 }));
        assert!(seen.contains(&Notification::StateChange {
            unit: UnitId(0),
            state: UnitState::Latent,
            day: 0
        }));
    }

    #[test]
    fn iterations_are_reset_and_reproducible() {
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let seeder = Seeder {
            infect_on: Some(0),
            detect_on: None,
        };
        let mut scenario = scenario(100, "");
        scenario.iterations = 3;
        let mut scheduler = scheduler(&context, scenario, seeder);
        let results = scheduler.run(&mut context);
        let numbers: Vec<u32> = results.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert!(results.iter().all(|r| r.disease_end_day == Some(7)));
    }
}
