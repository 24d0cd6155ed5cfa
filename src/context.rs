/*!

The `Context` owns all state for one simulation run: the units, the zones, bookkeeping for the
current iteration, the notification sink, and a type-keyed map of data plugins that extension
traits (`ContextRandomExt`, `ContextReportingExt`) keep their private state in.

Modules never hold units or zones themselves. They receive `&mut Context` in `run` and route
unit mutation through change requests and zone mutation through pending foci.

*/

use crate::{
    HashMap,
    notify::{Notification, NotificationSink, NullSink},
    unit::UnitList,
    zone::ZoneList,
};
use std::any::{Any, TypeId};
use std::time::SystemTime;

/// A type that can be stored in the `Context` and created on first use.
pub trait DataPlugin: Any {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self;
}

/// Facts about the whole run, shared by every iteration.
#[derive(Clone, Debug, Default)]
pub struct ScenarioInfo {
    pub iterations: u32,
    pub days: u32,
    pub start_time: Option<SystemTime>,
}

/// Per-iteration flags, cleared before each iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationData {
    pub number: u32,
    pub day: u32,
    pub first_detection: Option<u32>,
    pub detections: usize,
    pub disease_ended: bool,
    pub disease_end_day: Option<u32>,
    pub early_exit: bool,
}

pub struct Context {
    units: UnitList,
    zones: ZoneList,
    scenario: ScenarioInfo,
    iteration: IterationData,
    sink: Box<dyn NotificationSink>,
    // Values are always the `DataPlugin` type their key names.
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    /// An empty context: no units, only the background zone, notifications discarded.
    #[must_use]
    pub fn new() -> Self {
        Context {
            units: UnitList::new(),
            zones: ZoneList::new(),
            scenario: ScenarioInfo::default(),
            iteration: IterationData::default(),
            sink: Box::new(NullSink),
            data_plugins: HashMap::default(),
        }
    }

    #[must_use]
    pub fn with_units(units: UnitList) -> Self {
        let mut context = Context::new();
        let count = units.len();
        context.units = units;
        context.zones.reset(count);
        context
    }

    #[must_use]
    pub fn units(&self) -> &UnitList {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut UnitList {
        &mut self.units
    }

    #[must_use]
    pub fn zones(&self) -> &ZoneList {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut ZoneList {
        &mut self.zones
    }

    /// Replaces the zone list, putting every unit in the new list's background zone.
    pub fn set_zones(&mut self, zones: ZoneList) {
        self.zones = zones;
        self.zones.reset(self.units.len());
    }

    /// Both collections at once, for code that rezones units while reading their positions.
    pub fn units_and_zones_mut(&mut self) -> (&mut UnitList, &mut ZoneList) {
        (&mut self.units, &mut self.zones)
    }

    #[must_use]
    pub fn scenario(&self) -> &ScenarioInfo {
        &self.scenario
    }

    pub fn scenario_mut(&mut self) -> &mut ScenarioInfo {
        &mut self.scenario
    }

    #[must_use]
    pub fn iteration(&self) -> &IterationData {
        &self.iteration
    }

    pub fn iteration_mut(&mut self) -> &mut IterationData {
        &mut self.iteration
    }

    /// The current simulation day.
    #[must_use]
    pub fn day(&self) -> u32 {
        self.iteration.day
    }

    pub fn set_notification_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sink = sink;
    }

    /// Swaps the sink out, for callers that want their recording back.
    pub fn take_notification_sink(&mut self) -> Box<dyn NotificationSink> {
        std::mem::replace(&mut self.sink, Box::new(NullSink))
    }

    pub fn notify(&mut self, notification: Notification) {
        self.sink.notify(notification);
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new((T::new)()))
            .downcast_mut::<T>()
            .unwrap() // Will never panic as data container has the matching type
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use `Context::get_data_container_mut()`.
    #[must_use]
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T>())
    }
}
