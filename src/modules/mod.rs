//! The sub-models a simulation is assembled from. `module_loader` decides which ones a scenario
//! needs; each one only reacts to the event kinds it lists.

mod airborne_spread;
mod basic_destruction;
mod basic_zone_focus;
mod contact_recorder;
mod contact_spread;
mod detection_model;
mod disease_model;
mod output_logger;
mod population_model;
mod quarantine_model;
mod resources_model;
mod ring_vaccination;
mod test_model;
mod trace_exam;
mod trace_model;
mod trace_zone_focus;
mod unit_state_monitor;
mod vaccine_model;
mod zone_model;
mod zone_monitor;

pub use airborne_spread::AirborneSpreadModel;
pub use basic_destruction::BasicDestructionModel;
pub use basic_zone_focus::BasicZoneFocusModel;
pub use contact_recorder::ContactRecorderModel;
pub use contact_spread::ContactSpreadModel;
pub use detection_model::DetectionModel;
pub use disease_model::DiseaseModel;
pub use output_logger::OutputLogger;
pub use population_model::PopulationModel;
pub use quarantine_model::QuarantineModel;
pub use resources_model::ResourcesModel;
pub use ring_vaccination::RingVaccinationModel;
pub use test_model::TestModel;
pub use trace_exam::TraceExamModel;
pub use trace_model::TraceModel;
pub use trace_zone_focus::TraceZoneFocusModel;
pub use unit_state_monitor::UnitStateMonitor;
pub use vaccine_model::VaccineModel;
pub use zone_model::ZoneModel;
pub use zone_monitor::ZoneMonitor;
