/*!

Grows the surveillance zones around requested foci and keeps unit membership up to date.

Requests for a focus are only queued during the day. At midnight each queued focus is added to
every zone in priority order; the fragments that end up holding it are chained together with
`nests_in`, and units that the new circles (or any holes they closed) now cover are moved into
the highest-priority zone that claims them. A unit never moves to a lower-priority zone.

*/

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    log::{debug, trace},
    module::{SimModule, unexpected_event},
    unit::{UnitId, UnitList},
    zone::{FragmentId, ZoneId, ZoneList, geometry},
};
use geo::{BoundingRect, LineString};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[
    EventKind::BeforeEachSimulation,
    EventKind::RequestForZoneFocus,
    EventKind::Midnight,
];

#[derive(Default)]
pub struct ZoneModel {
    foci_applied: usize,
}

impl ZoneModel {
    #[must_use]
    pub fn new() -> Self {
        ZoneModel::default()
    }

    fn apply_pending_foci(&mut self, context: &mut Context, day: u32, queue: &mut EventQueue) {
        let (units, zones) = context.units_and_zones_mut();
        let foci = zones.take_pending_foci();
        if foci.is_empty() {
            return;
        }
        let foreground: Vec<ZoneId> = zones.iter().filter(|z| !z.is_background()).map(|z| z.id()).collect();
        if foreground.is_empty() {
            return;
        }
        for focus in foci {
            apply_focus(units, zones, &foreground, focus, day, queue);
            self.foci_applied += 1;
        }
        debug!("day {day}: zones now cover {} focus/foci", self.foci_applied);
    }
}

/// Adds one focus to every foreground zone and rezones the units it affects.
fn apply_focus(
    units: &mut UnitList,
    zones: &mut ZoneList,
    foreground: &[ZoneId],
    focus: (f64, f64),
    day: u32,
    queue: &mut EventQueue,
) {
    let (fx, fy) = focus;
    let mut fragments = Vec::with_capacity(foreground.len());
    let mut holes: Vec<(FragmentId, Vec<LineString<f64>>)> = Vec::new();
    for id in foreground {
        let Some(zone) = zones.get_mut(*id) else {
            continue;
        };
        let (fragment, filled) = zone.add_focus_with_holes(fx, fy);
        fragments.push(fragment);
        if !filled.is_empty() {
            holes.push((fragment, filled));
        }
    }

    for pair in fragments.windows(2) {
        zones.set_nests_in(pair[0], Some(pair[1]));
    }
    if let Some(last) = fragments.last() {
        let background = zones.get_background();
        zones.set_nests_in(*last, Some(background));
    }

    let max_radius = foreground
        .iter()
        .filter_map(|id| zones.get(*id))
        .map(|zone| zone.radius())
        .fold(0.0, f64::max);
    for unit in units.units_within(fx, fy, max_radius + geometry::EPSILON) {
        let (x, y) = (units[unit].x(), units[unit].y());
        let target = foreground.iter().zip(&fragments).find_map(|(id, fragment)| {
            zones
                .get(*id)
                .filter(|zone| zone.circle_covers(focus, x, y))
                .map(|_| *fragment)
        });
        if let Some(target) = target {
            move_if_higher_priority(zones, unit, target, day, queue);
        }
    }

    for (fragment, rings) in holes {
        for ring in &rings {
            for unit in units_in_ring(units, ring) {
                move_if_higher_priority(zones, unit, fragment, day, queue);
            }
        }
    }
}

fn units_in_ring(units: &mut UnitList, ring: &LineString<f64>) -> Vec<UnitId> {
    let Some(bounds) = ring.bounding_rect() else {
        return Vec::new();
    };
    let centre = bounds.center();
    let reach = 0.5 * bounds.width().hypot(bounds.height());
    let candidates = units.units_within(centre.x, centre.y, reach);
    candidates
        .into_iter()
        .filter(|id| geometry::ring_contains(ring, units[*id].x(), units[*id].y()))
        .collect()
}

fn move_if_higher_priority(zones: &mut ZoneList, unit: UnitId, target: FragmentId, day: u32, queue: &mut EventQueue) {
    let current = zones.membership_of(unit);
    let (Some(target_level), Some(current_level)) = (zones.level_of(target.zone), zones.level_of(current.zone)) else {
        return;
    };
    if target_level >= current_level {
        return;
    }
    trace!("unit {} moves from level {current_level} to level {target_level}", unit.index());
    zones.set_membership(unit, target);
    queue.push(Event::UnitZoneChange {
        unit,
        old_fragment: current,
        new_fragment: target,
        day,
    });
}

impl SimModule for ZoneModel {
    fn name(&self) -> &'static str {
        "zone-model"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, queue: &mut EventQueue) {
        match *event {
            Event::BeforeEachSimulation { .. } => {
                let unit_count = context.units().len();
                context.zones_mut().reset(unit_count);
                self.foci_applied = 0;
            }
            Event::RequestForZoneFocus { unit, .. } => {
                let (x, y) = (context.units()[unit].x(), context.units()[unit].y());
                context.zones_mut().add_pending_focus(x, y);
            }
            Event::Midnight { day } => self.apply_pending_foci(context, day, queue),
            _ => unexpected_event(self, event),
        }
    }

    fn reset(&mut self) {
        self.foci_applied = 0;
    }
}

impl Display for ZoneModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}
