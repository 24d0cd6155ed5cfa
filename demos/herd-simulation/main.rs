use ixa_herd::log::{enable_logging, set_log_level, LevelFilter};
use ixa_herd::unit::EquirectangularTransform;
use ixa_herd::{Context, Scenario, Scheduler, SimError, UnitList};
use std::env;
use std::path::PathBuf;

fn initialize(scenario_path: &str) -> Result<(Context, Scheduler), SimError> {
    let scenario = Scenario::from_json_file(scenario_path)?;
    let population = scenario
        .population_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("population.csv"));
    let units = UnitList::load_population_csv(&population, &EquirectangularTransform::new(0.0))?;

    let mut context = Context::with_units(units);
    let scheduler = Scheduler::from_scenario(scenario, &mut context)?;
    Ok((context, scheduler))
}

fn main() {
    enable_logging();
    set_log_level(LevelFilter::Info);

    let scenario_path = env::args().nth(1).unwrap_or_else(|| "scenario.json".to_string());
    let (mut context, mut scheduler) = initialize(&scenario_path).expect("Failed to initialize simulation");

    for summary in scheduler.run(&mut context) {
        println!(
            "iteration {}: {} day(s), first detection {:?}, {} detection(s)",
            summary.number, summary.day, summary.first_detection, summary.detections
        );
    }
}
