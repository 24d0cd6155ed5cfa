use crate::{
    HashMap, HashSet,
    rel_chart::RelChart,
    unit::{GridIndex, SpatialIndex, StateChange, Unit, UnitId, UnitState},
};
use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Default grid cell edge for the spatial index, in kilometres.
const DEFAULT_CELL_SIZE: f64 = 5.0;

/// All units in a run, in load order. A unit's `UnitId` is its position.
#[derive(Clone, Debug, Default)]
pub struct UnitList {
    units: Vec<Unit>,
    /// Distinct production type names in first-seen order.
    production_types: Vec<Arc<str>>,
    production_type_ids: HashMap<Arc<str>, usize>,
    /// Indexed by production type.
    prevalence_curves: Vec<Option<RelChart>>,
    /// Units currently Latent or infectious.
    infectious: HashSet<UnitId>,
    spatial_index: Option<GridIndex>,
}

impl UnitList {
    #[must_use]
    pub fn new() -> Self {
        UnitList::default()
    }

    /// Returns the id for a production type name, registering it if it is new.
    pub fn production_type_id(&mut self, name: &str) -> usize {
        if let Some(id) = self.production_type_ids.get(name) {
            return *id;
        }
        let id = self.production_types.len();
        let name: Arc<str> = Arc::from(name);
        self.production_types.push(name.clone());
        self.production_type_ids.insert(name, id);
        self.prevalence_curves.push(None);
        id
    }

    #[must_use]
    pub fn find_production_type(&self, name: &str) -> Option<usize> {
        self.production_type_ids.get(name).copied()
    }

    #[must_use]
    pub fn production_types(&self) -> &[Arc<str>] {
        &self.production_types
    }

    /// Appends a unit. Coordinates are the planar position; `lat_lon` is kept for output.
    pub(crate) fn push(
        &mut self,
        official_id: String,
        production_type: &str,
        size: u32,
        lat_lon: (f64, f64),
        xy: (f64, f64),
        initial: (UnitState, u32, u32),
    ) -> UnitId {
        let production_type_id = self.production_type_id(production_type);
        let id = UnitId(self.units.len());
        let mut unit = Unit::new(
            id,
            official_id,
            production_type_id,
            self.production_types[production_type_id].clone(),
            size,
            lat_lon,
            xy,
            initial.0,
        );
        unit.days_in_initial_state = initial.1;
        unit.days_left_in_initial_state = initial.2;
        self.units.push(unit);
        // Any existing index is now stale.
        self.spatial_index = None;
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.0)
    }

    /// Mutable access for registering change requests.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> + use<> {
        (0..self.units.len()).map(UnitId)
    }

    #[must_use]
    pub fn get_by_state(&self, state: UnitState) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|unit| unit.state == state)
            .map(|unit| unit.id)
            .collect()
    }

    #[must_use]
    pub fn get_by_initial_state(&self, state: UnitState) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|unit| unit.initial_state == state)
            .map(|unit| unit.id)
            .collect()
    }

    /// Units currently Latent, InfectiousSubclinical or InfectiousClinical, in index order.
    #[must_use]
    pub fn infectious_units(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.infectious.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn infectious_count(&self) -> usize {
        self.infectious.len()
    }

    /// Number of units in each state, indexed by `UnitState::index()`.
    #[must_use]
    pub fn state_counts(&self) -> [usize; UnitState::COUNT] {
        let mut counts = [0; UnitState::COUNT];
        for unit in &self.units {
            counts[unit.state.index()] += 1;
        }
        counts
    }

    pub fn set_prevalence_curve(&mut self, production_type: usize, curve: Option<RelChart>) {
        if let Some(slot) = self.prevalence_curves.get_mut(production_type) {
            *slot = curve;
        }
    }

    #[must_use]
    pub fn prevalence_curve(&self, production_type: usize) -> Option<&RelChart> {
        self.prevalence_curves.get(production_type).and_then(Option::as_ref)
    }

    /// Resets every unit and empties the infectious set.
    pub(crate) fn reset(&mut self) {
        for unit in &mut self.units {
            unit.reset();
        }
        self.infectious.clear();
    }

    /// Steps every unit once, in index order, and returns the observable state changes.
    pub(crate) fn step_all(&mut self) -> Vec<StateChange> {
        let UnitList {
            units,
            prevalence_curves,
            infectious,
            ..
        } = self;
        units
            .iter_mut()
            .filter_map(|unit| {
                let curve = prevalence_curves.get(unit.production_type).and_then(Option::as_ref);
                unit.step(curve, infectious)
            })
            .collect()
    }

    /// (Re)builds the grid used by `units_within`.
    pub fn build_spatial_index(&mut self, cell_size: f64) {
        let points = self.units.iter().map(|unit| (unit.id, unit.x, unit.y));
        self.spatial_index = Some(GridIndex::build(points, cell_size));
    }

    /// Units whose planar distance from `(x, y)` is at most `radius`, in index order.
    pub fn units_within(&mut self, x: f64, y: f64, radius: f64) -> Vec<UnitId> {
        if self.spatial_index.is_none() {
            self.build_spatial_index(DEFAULT_CELL_SIZE);
        }
        let radius_sq = radius * radius;
        match &self.spatial_index {
            Some(index) => index
                .candidates_within(x, y, radius)
                .into_iter()
                .filter(|id| self.units[id.0].distance_sq(x, y) <= radius_sq)
                .collect(),
            None => Vec::new(),
        }
    }

    /// One line per state with a non-zero count of units and animals.
    #[must_use]
    pub fn prevalence_summary(&self) -> String {
        let mut units = [0usize; UnitState::COUNT];
        let mut animals = [0u64; UnitState::COUNT];
        for unit in &self.units {
            units[unit.state.index()] += 1;
            animals[unit.state.index()] += u64::from(unit.size);
        }
        UnitState::ALL
            .iter()
            .filter(|state| units[state.index()] > 0)
            .map(|state| format!("{state}: {} units, {} animals", units[state.index()], animals[state.index()]))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Index<UnitId> for UnitList {
    type Output = Unit;

    fn index(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }
}

impl IndexMut<UnitId> for UnitList {
    fn index_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0]
    }
}

impl Display for UnitList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<unit list of {} units", self.units.len())?;
        for unit in &self.units {
            write!(f, "\n  {unit}")?;
        }
        write!(f, ">")
    }
}
