use crate::{
    log::{debug, info},
    unit::UnitId,
    zone::{FragmentId, Zone, ZoneFragment, ZoneId, geometry::EPSILON},
};
use std::fmt::{self, Display, Formatter};

/// Zones in ascending level order, the background zone last, plus each unit's current fragment
/// and the foci waiting for the next day boundary.
#[derive(Clone, Debug)]
pub struct ZoneList {
    zones: Vec<Zone>,
    next_id: usize,
    /// One entry per unit index.
    membership: Vec<FragmentId>,
    pending_foci: Vec<(f64, f64)>,
}

impl Default for ZoneList {
    fn default() -> Self {
        ZoneList::new()
    }
}

impl ZoneList {
    /// A list holding only an unnamed background zone.
    #[must_use]
    pub fn new() -> Self {
        let mut list = ZoneList {
            zones: Vec::new(),
            next_id: 0,
            membership: Vec::new(),
            pending_foci: Vec::new(),
        };
        list.append("", None, 0.0);
        list
    }

    fn allocate_id(&mut self) -> ZoneId {
        let id = ZoneId(self.next_id);
        self.next_id += 1;
        id
    }

    fn background_position(&self) -> Option<usize> {
        self.zones.iter().position(Zone::is_background)
    }

    /// Adds a zone. `level` of `None` means one past the current lowest-priority zone.
    ///
    /// A requested level already in use pushes that zone and every zone after it down by one.
    /// A radius below the distance tolerance names the background zone, of which there is only
    /// ever one: the request is merged into it, and its name is adopted only if it has none.
    pub fn append(&mut self, name: &str, level: Option<u32>, radius: f64) -> ZoneId {
        if radius < EPSILON {
            if let Some(position) = self.background_position() {
                let background = &mut self.zones[position];
                if background.name.is_empty() {
                    background.name = name.to_string();
                }
                return background.id;
            }
            let id = self.allocate_id();
            let level = self.zones.last().map_or(1, |zone| zone.level + 1);
            self.zones.push(Zone::new(id, name, level, 0.0));
            return id;
        }

        let foreground_end = self.background_position().unwrap_or(self.zones.len());
        let level = level.filter(|level| *level > 0).unwrap_or_else(|| {
            self.zones[..foreground_end].last().map_or(1, |zone| zone.level + 1)
        });
        let position = self.zones[..foreground_end]
            .iter()
            .position(|zone| zone.level >= level)
            .unwrap_or(foreground_end);
        if self.zones.get(position).is_some_and(|zone| zone.level == level && !zone.is_background()) {
            for zone in &mut self.zones[position..] {
                zone.level += 1;
            }
        }
        let id = self.allocate_id();
        self.zones.insert(position, Zone::new(id, name, level, radius));

        // Keep the background strictly below every other zone.
        let foreground_max = self.zones.iter().filter(|z| !z.is_background()).map(|z| z.level).max();
        if let (Some(position), Some(max)) = (self.background_position(), foreground_max) {
            if self.zones[position].level <= max {
                self.zones[position].level = max + 1;
            }
        }
        debug!("added zone \"{name}\" at level {level}");
        id
    }

    /// Renumbers levels to 1, 2, ... in list order.
    pub fn renumber_levels(&mut self) {
        for (position, zone) in self.zones.iter_mut().enumerate() {
            zone.level = u32::try_from(position + 1).unwrap_or(u32::MAX);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Number of zones other than the background.
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.zones.iter().filter(|zone| !zone.is_background()).count()
    }

    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    #[must_use]
    pub fn position_of(&self, id: ZoneId) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id == id)
    }

    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    pub fn get_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|zone| zone.id == id)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    #[must_use]
    pub fn level_of(&self, id: ZoneId) -> Option<u32> {
        self.get(id).map(Zone::level)
    }

    #[must_use]
    pub fn background(&self) -> Option<&Zone> {
        self.zones.last()
    }

    /// The background zone's only fragment.
    #[must_use]
    pub fn get_background(&self) -> FragmentId {
        let zone = self.zones.last().map_or(ZoneId(0), Zone::id);
        FragmentId { zone, index: 0 }
    }

    #[must_use]
    pub fn fragment(&self, id: FragmentId) -> Option<&ZoneFragment> {
        self.get(id.zone).and_then(|zone| zone.fragment(id.index))
    }

    pub(crate) fn fragment_mut(&mut self, id: FragmentId) -> Option<&mut ZoneFragment> {
        self.get_mut(id.zone).and_then(|zone| zone.fragment_mut(id.index))
    }

    #[must_use]
    pub fn same_zone(&self, a: FragmentId, b: FragmentId) -> bool {
        a.zone == b.zone
    }

    /// Same zone and, after any merges, the same contour.
    #[must_use]
    pub fn same_fragment(&self, a: FragmentId, b: FragmentId) -> bool {
        if !self.same_zone(a, b) {
            return false;
        }
        match (self.fragment(a), self.fragment(b)) {
            (Some(fa), Some(fb)) => fa.contour == fb.contour,
            _ => false,
        }
    }

    /// Whether `inner` lies inside `outer`, following the cached `nests_in` links one level at
    /// a time rather than testing geometry.
    #[must_use]
    pub fn nests_in(&self, inner: FragmentId, outer: FragmentId) -> bool {
        let (Some(inner_level), Some(outer_level)) = (self.level_of(inner.zone), self.level_of(outer.zone)) else {
            return false;
        };
        if inner_level >= outer_level {
            return false;
        }
        let Some(next) = self.fragment(inner).and_then(ZoneFragment::nests_in) else {
            return false;
        };
        match self.level_of(next.zone) {
            Some(level) if level == outer_level => self.same_fragment(next, outer),
            Some(_) => self.nests_in(next, outer),
            None => false,
        }
    }

    /// Whether zone rules stop a shipment from a unit in `from` to a unit in `to`. Shipments may
    /// stay within one fragment, or move out to the fragment one level further out that `from`
    /// nests in. Anything else is forbidden.
    #[must_use]
    pub fn contact_forbidden(&self, from: FragmentId, to: FragmentId) -> bool {
        if from == to {
            return false;
        }
        let (Some(from_level), Some(to_level)) = (self.level_of(from.zone), self.level_of(to.zone)) else {
            return true;
        };
        if to_level > from_level {
            return true;
        }
        if to_level == from_level {
            return !self.same_fragment(from, to);
        }
        from_level - to_level > 1 || !self.nests_in(to, from)
    }

    pub(crate) fn set_nests_in(&mut self, inner: FragmentId, outer: Option<FragmentId>) {
        if let Some(fragment) = self.fragment_mut(inner) {
            fragment.nests_in = outer;
        }
    }

    /// The fragment a unit is in. Units the list has not seen are in the background.
    #[must_use]
    pub fn membership_of(&self, unit: UnitId) -> FragmentId {
        self.membership
            .get(unit.index())
            .copied()
            .unwrap_or_else(|| self.get_background())
    }

    pub(crate) fn set_membership(&mut self, unit: UnitId, fragment: FragmentId) {
        let background = self.get_background();
        if unit.index() >= self.membership.len() {
            self.membership.resize(unit.index() + 1, background);
        }
        self.membership[unit.index()] = fragment;
    }

    /// The zone a unit is in.
    #[must_use]
    pub fn zone_of(&self, unit: UnitId) -> Option<&Zone> {
        self.get(self.membership_of(unit).zone)
    }

    #[must_use]
    pub fn membership(&self) -> &[FragmentId] {
        &self.membership
    }

    /// Queues a focus to be applied at the next day boundary.
    pub fn add_pending_focus(&mut self, x: f64, y: f64) {
        self.pending_foci.push((x, y));
    }

    #[must_use]
    pub fn pending_foci(&self) -> &[(f64, f64)] {
        &self.pending_foci
    }

    pub(crate) fn take_pending_foci(&mut self) -> Vec<(f64, f64)> {
        std::mem::take(&mut self.pending_foci)
    }

    /// Clears every zone's geometry, puts all `unit_count` units in the background and drops
    /// pending foci.
    pub fn reset(&mut self, unit_count: usize) {
        for zone in &mut self.zones {
            zone.reset();
        }
        let background = self.get_background();
        self.membership.clear();
        self.membership.resize(unit_count, background);
        self.pending_foci.clear();
    }

    /// Logs the zone table at `info` level.
    pub fn log_summary(&self) {
        for zone in &self.zones {
            info!("{zone}");
        }
    }
}

impl Display for ZoneList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<zone list")?;
        for zone in &self.zones {
            write!(f, "\n  {zone}")?;
        }
        write!(f, ">")
    }
}
