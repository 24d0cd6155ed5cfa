/*!

Scenario parameters, read from a JSON file.

```json
{
  "iterations": 10,
  "days": 365,
  "seed": 42,
  "production_types": [
    {
      "name": "Cattle",
      "disease": {
        "latent_period": { "type": "point", "value": 2 },
        "infectious_subclinical_period": { "type": "point", "value": 1 },
        "infectious_clinical_period": { "type": "uniform", "a": 2, "b": 4 },
        "immunity_period": { "type": "gamma", "shape": 10, "scale": 18 }
      },
      "detection": { "prob_report_vs_days_clinical": [[0, 0.1], [5, 0.9]] },
      "zone_focus_on_detection": true,
      "destruction": { "priority": 1 },
      "tracing": { "direct": { "period": 14, "forward": true, "success": 0.9 } },
      "trace_exam": { "detection_multiplier": 2.0, "test_if_no_signs": true },
      "test": { "sensitivity": 0.95, "specificity": 0.99 }
    }
  ],
  "contact_spread": [{
    "source": "Cattle", "recipient": "Cattle", "contact_type": "direct",
    "movement_rate": 0.5, "distance": { "type": "gamma", "shape": 2, "scale": 3 },
    "prob_infect": 0.4
  }],
  "airborne_spread": [{
    "source": "Cattle", "recipient": "Cattle",
    "prob_spread_1km": 0.05, "max_spread": 3.0
  }],
  "destruction_program": { "delay": 2, "capacity": 10 },
  "zones": [{ "name": "High risk", "radius": 3.0 }]
}
```

Parsing only checks shape. `Scenario::validate` checks values, and both loaders call it.

*/

use crate::{
    HashSet,
    error::SimError,
    event::ContactType,
    random::PeriodDistribution,
    rel_chart::RelChart,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_wind_end() -> f64 {
    360.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub iterations: u32,
    pub days: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub starting_iteration_number: u32,
    #[serde(default = "default_true")]
    pub stop_on_disease_end: bool,
    #[serde(default)]
    pub stop_on_first_detection: bool,
    #[serde(default)]
    pub disable_all_controls: bool,
    #[serde(default)]
    pub production_types: Vec<ProductionTypeParams>,
    #[serde(default)]
    pub destruction_program: Option<ProgramParams>,
    #[serde(default)]
    pub vaccination_program: Option<ProgramParams>,
    #[serde(default)]
    pub zones: Vec<ZoneParams>,
    #[serde(default)]
    pub contact_spread: Vec<ContactSpreadParams>,
    #[serde(default)]
    pub airborne_spread: Vec<AirborneSpreadParams>,
    /// Population CSV, relative to the scenario file when loaded from one.
    #[serde(default)]
    pub population_file: Option<PathBuf>,
    #[serde(default)]
    pub output_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTypeParams {
    pub name: String,
    #[serde(default)]
    pub disease: Option<DiseaseParams>,
    #[serde(default)]
    pub detection: Option<DetectionParams>,
    #[serde(default)]
    pub zone_focus_on_detection: bool,
    #[serde(default)]
    pub destruction: Option<DestructionParams>,
    #[serde(default)]
    pub vaccination: Option<VaccinationParams>,
    #[serde(default)]
    pub tracing: Option<TracingParams>,
    #[serde(default)]
    pub zone_focus_on_trace: bool,
    /// Examination of units of this type that a trace finds.
    #[serde(default)]
    pub trace_exam: Option<ExamParams>,
    /// Diagnostic testing of units of this type.
    #[serde(default)]
    pub test: Option<TestParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseParams {
    pub latent_period: PeriodDistribution,
    pub infectious_subclinical_period: PeriodDistribution,
    pub infectious_clinical_period: PeriodDistribution,
    pub immunity_period: PeriodDistribution,
    /// Fraction of animals shedding, against fraction of the way through the infectious period.
    #[serde(default)]
    pub prevalence: Option<RelChart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    pub prob_report_vs_days_clinical: RelChart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructionParams {
    /// Lower numbers are destroyed first.
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationParams {
    /// Days from vaccination until immunity begins.
    #[serde(default)]
    pub delay: u32,
    pub immunity_period: PeriodDistribution,
    /// Units of any vaccinated type within this distance of a detected unit of this type are
    /// vaccinated.
    #[serde(default)]
    pub ring_radius: Option<f64>,
    #[serde(default)]
    pub priority: u32,
}

/// Which contacts of a detected unit of this type are traced, and how well contacts recorded
/// against this type can be found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracingParams {
    #[serde(default)]
    pub direct: Option<TraceParams>,
    #[serde(default)]
    pub indirect: Option<TraceParams>,
}

impl TracingParams {
    #[must_use]
    pub fn for_contact_type(&self, contact_type: ContactType) -> Option<&TraceParams> {
        match contact_type {
            ContactType::Direct => self.direct.as_ref(),
            ContactType::Indirect => self.indirect.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceParams {
    /// How many days back a trace looks.
    pub period: u32,
    #[serde(default)]
    pub forward: bool,
    #[serde(default)]
    pub back: bool,
    /// Probability that a trace finds a recorded contact. Absent means 1.
    #[serde(default)]
    pub success: Option<f64>,
    /// Days until a successful trace is reported.
    #[serde(default)]
    pub delay: Option<PeriodDistribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamParams {
    #[serde(default = "default_one")]
    pub detection_multiplier: f64,
    #[serde(default)]
    pub test_if_no_signs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestParams {
    /// Probability of a positive result for an infected or recovered unit.
    pub sensitivity: f64,
    /// Probability of a negative result for a healthy unit.
    pub specificity: f64,
    /// Days until the result comes back.
    #[serde(default)]
    pub delay: Option<PeriodDistribution>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Direct,
    Indirect,
}

impl From<ContactKind> for ContactType {
    fn from(kind: ContactKind) -> Self {
        match kind {
            ContactKind::Direct => ContactType::Direct,
            ContactKind::Indirect => ContactType::Indirect,
        }
    }
}

/// Shipments of animals (direct) or of people, vehicles and products (indirect) from units of
/// one production type to units of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSpreadParams {
    pub source: String,
    pub recipient: String,
    pub contact_type: ContactKind,
    /// Mean shipments per source unit per day.
    #[serde(default)]
    pub movement_rate: f64,
    /// If set, exactly this many shipments per day on average, spread evenly over the days.
    #[serde(default)]
    pub fixed_movement_rate: Option<f64>,
    /// Shipping distance in km.
    pub distance: PeriodDistribution,
    #[serde(default)]
    pub shipping_delay: Option<PeriodDistribution>,
    /// Probability that a shipment infects its recipient. Direct contacts from a unit with a
    /// prevalence curve use the unit's prevalence instead.
    pub prob_infect: f64,
    #[serde(default)]
    pub latent_units_can_infect: bool,
    #[serde(default = "default_true")]
    pub subclinical_units_can_infect: bool,
    /// Multiplier on the movement rate against days since the first detection.
    #[serde(default)]
    pub movement_control: Option<RelChart>,
}

/// Airborne spread, falling off linearly with distance up to `max_spread`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirborneSpreadParams {
    pub source: String,
    pub recipient: String,
    pub prob_spread_1km: f64,
    /// Start of the area at risk, as a compass heading in degrees from the source.
    #[serde(default)]
    pub wind_direction_start: f64,
    #[serde(default = "default_wind_end")]
    pub wind_direction_end: f64,
    /// km.
    pub max_spread: f64,
    #[serde(default)]
    pub delay: Option<PeriodDistribution>,
}

/// A destruction or vaccination program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramParams {
    /// Days after the first detection before the program starts.
    #[serde(default)]
    pub delay: u32,
    /// Units per day against days since the program started.
    pub capacity: RelChart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneParams {
    pub name: String,
    /// 1 is the highest priority. Absent or negative means after every zone so far.
    #[serde(default)]
    pub level: Option<i64>,
    pub radius: f64,
}

impl ZoneParams {
    #[must_use]
    pub fn requested_level(&self) -> Option<u32> {
        self.level.and_then(|level| u32::try_from(level).ok()).filter(|level| *level > 0)
    }
}

fn config_error(message: String) -> SimError {
    SimError::ConfigError(message)
}

fn check_probabilities(chart: &RelChart, what: &str) -> Result<(), SimError> {
    chart.validate()?;
    if chart.min() < 0.0 || chart.max() > 1.0 {
        return Err(config_error(format!("{what}: probabilities must be between 0 and 1")));
    }
    Ok(())
}

fn check_probability(p: f64, what: &str) -> Result<(), SimError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(config_error(format!("{what} must be between 0 and 1, not {p}")));
    }
    Ok(())
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Scenario, SimError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads a scenario file. A relative `population_file` is resolved against the file's
    /// directory.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Scenario, SimError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let mut scenario = Scenario::from_json_str(&data)?;
        if let (Some(population), Some(parent)) = (&scenario.population_file, path.parent()) {
            if population.is_relative() {
                scenario.population_file = Some(parent.join(population));
            }
        }
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.iterations == 0 {
            return Err(config_error("iterations must be at least 1".to_string()));
        }
        if self.days == 0 {
            return Err(config_error("days must be at least 1".to_string()));
        }

        let mut names = HashSet::default();
        for params in &self.production_types {
            if !names.insert(params.name.as_str()) {
                return Err(config_error(format!(
                    "production type \"{}\" has more than one parameter block",
                    params.name
                )));
            }
            params.validate()?;
        }

        for program in self.destruction_program.iter().chain(&self.vaccination_program) {
            program.capacity.validate()?;
            if program.capacity.min() < 0.0 {
                return Err(config_error("program capacity cannot be negative".to_string()));
            }
        }

        for zone in &self.zones {
            if !zone.radius.is_finite() || zone.radius < 0.0 {
                return Err(config_error(format!("zone \"{}\" has an invalid radius {}", zone.name, zone.radius)));
            }
        }

        for params in &self.contact_spread {
            params.validate()?;
        }
        for params in &self.airborne_spread {
            params.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn production_type(&self, name: &str) -> Option<&ProductionTypeParams> {
        self.production_types.iter().find(|params| params.name == name)
    }
}

impl ProductionTypeParams {
    fn validate(&self) -> Result<(), SimError> {
        let context = |e: SimError| match e {
            SimError::ConfigError(message) => config_error(format!("production type \"{}\": {message}", self.name)),
            other => other,
        };
        if let Some(disease) = &self.disease {
            for period in [
                &disease.latent_period,
                &disease.infectious_subclinical_period,
                &disease.infectious_clinical_period,
                &disease.immunity_period,
            ] {
                period.sampler().map_err(context)?;
            }
            if let Some(prevalence) = &disease.prevalence {
                check_probabilities(prevalence, "prevalence").map_err(context)?;
            }
        }
        if let Some(detection) = &self.detection {
            check_probabilities(&detection.prob_report_vs_days_clinical, "detection").map_err(context)?;
        }
        if let Some(vaccination) = &self.vaccination {
            vaccination.immunity_period.sampler().map_err(context)?;
            if let Some(radius) = vaccination.ring_radius {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(context(config_error(format!("invalid ring radius {radius}"))));
                }
            }
        }
        if let Some(tracing) = &self.tracing {
            for trace in tracing.direct.iter().chain(&tracing.indirect) {
                if let Some(success) = trace.success {
                    check_probability(success, "trace success").map_err(context)?;
                }
                if let Some(delay) = &trace.delay {
                    delay.sampler().map_err(context)?;
                }
            }
        }
        if let Some(exam) = &self.trace_exam {
            if !exam.detection_multiplier.is_finite() || exam.detection_multiplier < 0.0 {
                return Err(context(config_error(format!(
                    "invalid exam detection multiplier {}",
                    exam.detection_multiplier
                ))));
            }
        }
        if let Some(test) = &self.test {
            check_probability(test.sensitivity, "test sensitivity").map_err(context)?;
            check_probability(test.specificity, "test specificity").map_err(context)?;
            if let Some(delay) = &test.delay {
                delay.sampler().map_err(context)?;
            }
        }
        Ok(())
    }
}

impl ContactSpreadParams {
    fn validate(&self) -> Result<(), SimError> {
        let what = format!("{:?} contact from \"{}\" to \"{}\"", self.contact_type, self.source, self.recipient);
        let context = |e: SimError| match e {
            SimError::ConfigError(message) => config_error(format!("{what}: {message}")),
            other => other,
        };
        let rate = self.fixed_movement_rate.unwrap_or(self.movement_rate);
        if !rate.is_finite() || rate < 0.0 || !self.movement_rate.is_finite() || self.movement_rate < 0.0 {
            return Err(context(config_error(format!("invalid movement rate {rate}"))));
        }
        self.distance.sampler().map_err(context)?;
        if let Some(delay) = &self.shipping_delay {
            delay.sampler().map_err(context)?;
        }
        check_probability(self.prob_infect, "probability of infection").map_err(context)?;
        if let Some(chart) = &self.movement_control {
            chart.validate().map_err(context)?;
            if chart.min() < 0.0 {
                return Err(context(config_error("movement control cannot be negative".to_string())));
            }
        }
        Ok(())
    }
}

impl AirborneSpreadParams {
    fn validate(&self) -> Result<(), SimError> {
        let what = format!("airborne spread from \"{}\" to \"{}\"", self.source, self.recipient);
        let context = |e: SimError| match e {
            SimError::ConfigError(message) => config_error(format!("{what}: {message}")),
            other => other,
        };
        check_probability(self.prob_spread_1km, "probability of spread at 1 km").map_err(context)?;
        for angle in [self.wind_direction_start, self.wind_direction_end] {
            if !angle.is_finite() {
                return Err(context(config_error(format!("invalid wind direction {angle}"))));
            }
        }
        if !self.max_spread.is_finite() {
            return Err(context(config_error(format!("invalid maximum spread {}", self.max_spread))));
        }
        if let Some(delay) = &self.delay {
            delay.sampler().map_err(context)?;
        }
        Ok(())
    }
}
