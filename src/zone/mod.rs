/*!

Surveillance zones.

A `ZoneList` holds zones in priority order (level 1 first) and ends with the background zone,
which covers everywhere no other zone claims. Each zone grows as foci are added around units;
see `Zone::add_focus`. Every unit belongs to exactly one `ZoneFragment` at any time.

*/

mod fragment;
pub mod geometry;
mod list;
mod shape;

pub use fragment::ZoneFragment;
pub use list::ZoneList;
pub use shape::Zone;

use serde::Serialize;

/// A zone's creation-order id. Unlike its position in the list, this never changes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct ZoneId(pub(crate) usize);

/// Names one fragment: the zone it belongs to and its position in that zone's fragment list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct FragmentId {
    pub zone: ZoneId,
    pub index: usize,
}
