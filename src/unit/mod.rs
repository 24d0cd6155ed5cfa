mod data;
mod list;
mod loader;
mod projection;
mod spatial;
mod state;

pub use data::{ChangeRequest, DiseasePeriods, StateChange, Unit};
pub use list::UnitList;
pub use loader::UnitRecord;
pub use projection::{CoordinateTransform, EquirectangularTransform, IdentityTransform};
pub use spatial::{GridIndex, SpatialIndex};
pub use state::UnitState;

#[cfg(test)]
pub(crate) use list::tests::unit_list_at;

use serde::Serialize;

/// A unit's position in its `UnitList`. Stable for the whole run.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}
