/*!

Decides which sub-models a scenario needs and builds them in the order they must hear events.

Controls are only loaded when the scenario asks for them and `disable_all_controls` is off.
Tracing needs detection, trace exams need tracing, and diagnostic tests need trace exams. Spread
models are not controls and load whenever the scenario has parameters for them.
The zone model, the monitors, the output logger and the population model are always loaded,
the population model last so that it resolves the day's exposures after every other module
has had its say.

A module that fails to build is logged and skipped so that every problem in the scenario is
reported at once; the load as a whole then fails.

*/

use crate::{
    context::Context,
    error::SimError,
    log::{debug, error, info, warn},
    module::SimModule,
    modules::{
        AirborneSpreadModel, BasicDestructionModel, BasicZoneFocusModel, ContactRecorderModel,
        ContactSpreadModel, DetectionModel, DiseaseModel, OutputLogger, PopulationModel,
        QuarantineModel, ResourcesModel, RingVaccinationModel, TestModel, TraceExamModel,
        TraceModel, TraceZoneFocusModel, UnitStateMonitor, VaccineModel, ZoneModel, ZoneMonitor,
    },
    parameters::Scenario,
    zone::ZoneList,
};

/// Which optional parts of the model a scenario switches on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelSwitches {
    pub disease: bool,
    pub contact_spread: bool,
    pub airborne_spread: bool,
    pub zones: bool,
    pub detection: bool,
    pub tracing: bool,
    pub trace_exam: bool,
    pub testing: bool,
    pub destruction: bool,
    pub vaccination: bool,
    pub resources: bool,
}

impl ModelSwitches {
    #[must_use]
    pub fn for_scenario(scenario: &Scenario) -> Self {
        let controls = !scenario.disable_all_controls;
        let any = |f: fn(&crate::parameters::ProductionTypeParams) -> bool| scenario.production_types.iter().any(f);

        let zones = controls && !scenario.zones.is_empty();
        let detection = controls && any(|p| p.detection.is_some());
        let destruction = controls && any(|p| p.destruction.is_some());
        let vaccination = controls && any(|p| p.vaccination.is_some());
        let tracing = detection && any(|p| p.tracing.is_some());
        let trace_exam = tracing && any(|p| p.trace_exam.is_some());
        let testing = trace_exam && any(|p| p.test.is_some());
        if controls && !detection && any(|p| p.tracing.is_some()) {
            warn!("production types have tracing parameters but nothing is ever detected, so nothing is traced");
        }
        if destruction && scenario.destruction_program.is_none() {
            warn!("production types have destruction parameters but there is no destruction program");
        }
        if vaccination && scenario.vaccination_program.is_none() {
            warn!("production types have vaccination parameters but there is no vaccination program");
        }
        let resources = (destruction && detection && scenario.destruction_program.is_some())
            || (vaccination && scenario.vaccination_program.is_some());

        ModelSwitches {
            disease: any(|p| p.disease.is_some()),
            contact_spread: !scenario.contact_spread.is_empty(),
            airborne_spread: !scenario.airborne_spread.is_empty(),
            zones,
            detection,
            tracing,
            trace_exam,
            testing,
            destruction,
            vaccination,
            resources,
        }
    }
}

/// Zones in the scenario's order, levels closed up to 1, 2, ... with the background last.
#[must_use]
pub fn build_zone_list(scenario: &Scenario) -> ZoneList {
    let mut zones = ZoneList::new();
    for params in &scenario.zones {
        zones.append(&params.name, params.requested_level(), params.radius);
    }
    zones.renumber_levels();
    zones
}

struct Loader {
    modules: Vec<Box<dyn SimModule>>,
    failures: usize,
}

impl Loader {
    fn add<M: SimModule + 'static>(&mut self, what: &str, module: Result<M, SimError>) {
        match module {
            Ok(module) => {
                debug!("loaded {module}");
                self.modules.push(Box::new(module));
            }
            Err(e) => {
                warn!("could not initialize {what}: {e}");
                self.failures += 1;
            }
        }
    }
}

/// Installs the scenario's zones in `context` and builds the modules it needs.
///
/// # Errors
///
/// `SimError::ModuleLoadError` if any module could not be built; the individual causes are
/// logged as warnings.
pub fn load_modules(scenario: &Scenario, context: &mut Context) -> Result<Vec<Box<dyn SimModule>>, SimError> {
    let switches = ModelSwitches::for_scenario(scenario);
    debug!("model switches: {switches:?}");
    if switches.zones {
        context.set_zones(build_zone_list(scenario));
    } else {
        context.set_zones(ZoneList::new());
    }

    let units = context.units();
    let mut loader = Loader {
        modules: Vec::new(),
        failures: 0,
    };

    if switches.disease {
        loader.add("disease model", DiseaseModel::new(scenario, units));
    }
    if switches.contact_spread {
        loader.add("contact spread model", ContactSpreadModel::new(scenario, units));
    }
    if switches.airborne_spread {
        loader.add("airborne spread model", AirborneSpreadModel::new(scenario, units));
    }
    loader.add("zone model", Ok(ZoneModel::new()));
    if switches.detection {
        loader.add("detection model", DetectionModel::new(scenario, units));
        loader.add("quarantine model", Ok(QuarantineModel::new()));
    }
    if switches.tracing {
        loader.add("contact recorder model", ContactRecorderModel::new(scenario, units));
        loader.add("trace model", Ok(TraceModel::new(scenario, units)));
    }
    if switches.trace_exam {
        loader.add("trace exam model", Ok(TraceExamModel::new(scenario, units)));
    }
    if switches.testing {
        loader.add("test model", TestModel::new(scenario, units));
    }
    if switches.zones && switches.detection {
        loader.add("zone focus model", Ok(BasicZoneFocusModel::new(scenario, units)));
    }
    if switches.zones && switches.tracing {
        loader.add("trace zone focus model", Ok(TraceZoneFocusModel::new(scenario, units)));
    }
    if switches.destruction && switches.detection {
        loader.add("destruction model", Ok(BasicDestructionModel::new(scenario, units)));
    }
    if switches.vaccination {
        loader.add("vaccine model", VaccineModel::new(scenario, units));
    }
    if switches.vaccination && switches.detection {
        loader.add("ring vaccination model", Ok(RingVaccinationModel::new(scenario, units)));
    }
    if switches.resources {
        loader.add("resources model", ResourcesModel::new(scenario));
    }
    loader.add("unit state monitor", Ok(UnitStateMonitor::new()));
    loader.add("zone monitor", Ok(ZoneMonitor::new()));
    loader.add("output logger", Ok(OutputLogger::new()));
    loader.add("population model", Ok(PopulationModel::new()));

    if loader.failures > 0 {
        error!("{} module(s) failed to initialize", loader.failures);
        return Err(SimError::ModuleLoadError(
            "One or more modules could not be initialized".to_string(),
        ));
    }
    info!("loaded {} module(s)", loader.modules.len());
    Ok(loader.modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::unit_list_at;

    const DISEASE: &str = r#""disease": {
        "latent_period": { "type": "point", "value": 2 },
        "infectious_subclinical_period": { "type": "point", "value": 1 },
        "infectious_clinical_period": { "type": "point", "value": 3 },
        "immunity_period": { "type": "point", "value": 5 } }"#;

    fn full_scenario(extra: &str) -> Scenario {
        Scenario::from_json_str(&format!(
            r#"{{ "iterations": 1, "days": 10, {extra}
                "production_types": [{{ "name": "Cattle", {DISEASE},
                    "detection": {{ "prob_report_vs_days_clinical": 1.0 }},
                    "zone_focus_on_detection": true,
                    "zone_focus_on_trace": true,
                    "tracing": {{ "direct": {{ "period": 7, "forward": true }} }},
                    "trace_exam": {{ "test_if_no_signs": true }},
                    "test": {{ "sensitivity": 0.9, "specificity": 0.9 }},
                    "destruction": {{ "priority": 1 }},
                    "vaccination": {{ "immunity_period": {{ "type": "point", "value": 30 }}, "ring_radius": 1.0 }} }}],
                "destruction_program": {{ "capacity": 5 }},
                "vaccination_program": {{ "delay": 1, "capacity": 5 }},
                "contact_spread": [{{ "source": "Cattle", "recipient": "Cattle", "contact_type": "direct",
                    "movement_rate": 1.0, "distance": {{ "type": "point", "value": 1 }}, "prob_infect": 0.5 }}],
                "airborne_spread": [{{ "source": "Cattle", "recipient": "Cattle", "prob_spread_1km": 0.1, "max_spread": 3 }}],
                "zones": [{{ "name": "Outer", "radius": 10.0 }}, {{ "name": "Inner", "level": 1, "radius": 2.0 }}] }}"#
        ))
        .unwrap()
    }

    fn names(modules: &[Box<dyn SimModule>]) -> Vec<&'static str> {
        modules.iter().map(|m| m.name()).collect()
    }

    #[test]
    fn everything_switched_on() {
        let scenario = full_scenario("");
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let modules = load_modules(&scenario, &mut context).unwrap();
        assert_eq!(
            names(&modules),
            vec![
                "disease-model",
                "contact-spread-model",
                "airborne-spread-model",
                "zone-model",
                "detection-model",
                "quarantine-model",
                "contact-recorder-model",
                "trace-model",
                "trace-exam-model",
                "test-model",
                "basic-zone-focus-model",
                "trace-zone-focus-model",
                "basic-destruction-model",
                "vaccine-model",
                "ring-vaccination-model",
                "resources-and-implementation-of-controls-model",
                "unit-state-monitor",
                "zone-monitor",
                "output-logger",
                "population-model",
            ]
        );
        let zones: Vec<(&str, u32)> = context.zones().iter().map(|z| (z.name(), z.level())).collect();
        assert_eq!(zones, vec![("Inner", 1), ("Outer", 2), ("", 3)]);
    }

    #[test]
    fn disabling_controls_leaves_the_core() {
        let scenario = full_scenario(r#""disable_all_controls": true,"#);
        let mut context = Context::with_units(unit_list_at(&[(0.0, 0.0)]));
        let modules = load_modules(&scenario, &mut context).unwrap();
        assert_eq!(
            names(&modules),
            vec![
                "disease-model",
                "contact-spread-model",
                "airborne-spread-model",
                "zone-model",
                "unit-state-monitor",
                "zone-monitor",
                "output-logger",
                "population-model",
            ]
        );
        assert_eq!(context.zones().foreground_count(), 0);
    }

    #[test]
    fn failures_are_collected() {
        // No unit is of type "Cattle", so the disease model cannot be built.
        let scenario = full_scenario("");
        let mut units = crate::unit::UnitList::new();
        units.push("pig".to_string(), "Swine", 1, (0.0, 0.0), (0.0, 0.0), (crate::unit::UnitState::Susceptible, 0, 0));
        let mut context = Context::with_units(units);
        match load_modules(&scenario, &mut context) {
            Err(SimError::ModuleLoadError(message)) => {
                assert_eq!(message, "One or more modules could not be initialized");
            }
            other => panic!("expected a load error, got {:?}", other.map(|m| names(&m))),
        }
    }

    #[test]
    fn switches_need_programs_for_resources() {
        let scenario = Scenario::from_json_str(
            r#"{ "iterations": 1, "days": 1, "production_types": [
                { "name": "Cattle", "detection": { "prob_report_vs_days_clinical": 0.5 },
                  "destruction": { "priority": 1 } }] }"#,
        )
        .unwrap();
        let switches = ModelSwitches::for_scenario(&scenario);
        assert!(switches.detection && switches.destruction);
        assert!(!switches.resources);
        assert!(!switches.disease);
    }

    #[test]
    fn tracing_chain_needs_each_link() {
        let switches = |types: &str| {
            let scenario = Scenario::from_json_str(&format!(
                r#"{{ "iterations": 1, "days": 1, "production_types": [{{ "name": "Cattle", {types} }}] }}"#
            ))
            .unwrap();
            let s = ModelSwitches::for_scenario(&scenario);
            (s.tracing, s.trace_exam, s.testing)
        };
        let tracing = r#""tracing": { "indirect": { "period": 3, "back": true } }"#;
        let exam = r#""trace_exam": { "test_if_no_signs": true }"#;
        let test = r#""test": { "sensitivity": 1, "specificity": 1 }"#;
        let detection = r#""detection": { "prob_report_vs_days_clinical": 0.5 }"#;

        assert_eq!(switches(&format!("{tracing}, {exam}, {test}")), (false, false, false));
        assert_eq!(switches(&format!("{detection}, {exam}, {test}")), (false, false, false));
        assert_eq!(switches(&format!("{detection}, {tracing}, {test}")), (true, false, false));
        assert_eq!(switches(&format!("{detection}, {tracing}, {exam}")), (true, true, false));
        assert_eq!(switches(&format!("{detection}, {tracing}, {exam}, {test}")), (true, true, true));
    }
}
