use crate::{
    log::{debug, trace},
    zone::{
        FragmentId, ZoneFragment, ZoneId,
        geometry::{self, EPSILON},
    },
};
use geo::{LineString, MultiPolygon};
use std::fmt::{self, Display, Formatter};

/// A surveillance zone: the union of circles of one radius drawn around foci.
///
/// A zone with radius below `EPSILON` is the background zone. It has no geometry and exactly
/// one fragment, which has no contour.
#[derive(Clone, Debug)]
pub struct Zone {
    pub(crate) id: ZoneId,
    pub(crate) name: String,
    pub(crate) level: u32,
    radius: f64,
    radius_sq: f64,
    /// `(radius + EPSILON)^2 - radius^2`: slack allowed when testing `d^2 <= radius^2`.
    epsilon_sq: f64,
    foci: Vec<(f64, f64)>,
    polygon: MultiPolygon<f64>,
    fragments: Vec<ZoneFragment>,
    area: f64,
    perimeter: f64,
    holes_filled: u32,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, name: &str, level: u32, radius: f64) -> Self {
        let radius = radius.max(0.0);
        let mut zone = Zone {
            id,
            name: name.to_string(),
            level,
            radius,
            radius_sq: radius * radius,
            epsilon_sq: (radius + EPSILON).powi(2) - radius * radius,
            foci: Vec::new(),
            polygon: geometry::empty_shape(),
            fragments: Vec::new(),
            area: 0.0,
            perimeter: 0.0,
            holes_filled: 0,
        };
        if zone.is_background() {
            zone.fragments.push(ZoneFragment::background(id));
        }
        zone
    }

    #[must_use]
    pub fn id(&self) -> ZoneId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[must_use]
    pub fn radius_sq(&self) -> f64 {
        self.radius_sq
    }

    #[must_use]
    pub fn epsilon_sq(&self) -> f64 {
        self.epsilon_sq
    }

    #[must_use]
    pub fn is_background(&self) -> bool {
        self.radius < EPSILON
    }

    #[must_use]
    pub fn foci(&self) -> &[(f64, f64)] {
        &self.foci
    }

    #[must_use]
    pub fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    #[must_use]
    pub fn contour_count(&self) -> usize {
        self.polygon.0.len()
    }

    /// Number of interior rings. Always 0 between updates.
    #[must_use]
    pub fn hole_count(&self) -> usize {
        self.polygon.0.iter().map(|polygon| polygon.interiors().len()).sum()
    }

    #[must_use]
    pub fn fragments(&self) -> &[ZoneFragment] {
        &self.fragments
    }

    #[must_use]
    pub fn fragment(&self, index: usize) -> Option<&ZoneFragment> {
        self.fragments.get(index)
    }

    pub(crate) fn fragment_mut(&mut self, index: usize) -> Option<&mut ZoneFragment> {
        self.fragments.get_mut(index)
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    #[must_use]
    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    #[must_use]
    pub fn holes_filled(&self) -> u32 {
        self.holes_filled
    }

    /// Whether `(x, y)` is inside or on the boundary of this zone's shape.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        geometry::contour_containing(&self.polygon, x, y).is_some()
    }

    /// Whether `(x, y)` is within this zone's radius of the point `(fx, fy)`, with tolerance.
    #[must_use]
    pub fn circle_covers(&self, (fx, fy): (f64, f64), x: f64, y: f64) -> bool {
        let dx = x - fx;
        let dy = y - fy;
        dx * dx + dy * dy - self.radius_sq <= self.epsilon_sq
    }

    pub fn update_area(&mut self) -> f64 {
        self.area = geometry::area(&self.polygon);
        self.area
    }

    pub fn update_perimeter(&mut self) -> f64 {
        self.perimeter = geometry::perimeter(&self.polygon);
        self.perimeter
    }

    fn fragment_id(&self, index: usize) -> FragmentId {
        FragmentId {
            zone: self.id,
            index,
        }
    }

    /// Adds a focus and returns the fragment that now contains it.
    pub fn add_focus(&mut self, x: f64, y: f64) -> FragmentId {
        self.add_focus_with_holes(x, y).0
    }

    /// Adds a focus, returning the fragment that now contains it and any holes that were
    /// filled in along the way.
    pub fn add_focus_with_holes(&mut self, x: f64, y: f64) -> (FragmentId, Vec<LineString<f64>>) {
        if self.is_background() {
            return (self.fragment_id(0), Vec::new());
        }
        self.foci.push((x, y));

        let old_contours = self.polygon.0.len();
        let circle = MultiPolygon::new(vec![geometry::circle(x, y, self.radius)]);
        let merged = geometry::union(&self.polygon, &circle);
        let (polygon, holes) = geometry::fill_holes(merged);
        if !holes.is_empty() {
            debug!("zone \"{}\": filled {} hole(s)", self.name, holes.len());
            self.holes_filled += u32::try_from(holes.len()).unwrap_or(u32::MAX);
        }
        self.polygon = polygon;

        // Contour order is not preserved by the clipper; re-find each fragment by its sample.
        self.remap_fragments();

        let tolerance = EPSILON.max(0.01 * self.radius);
        let new_contour = if self.polygon.0.len() == old_contours + 1 {
            geometry::find_circle_contour(&self.polygon, x, y, self.radius, tolerance)
                .or_else(|| geometry::contour_containing(&self.polygon, x, y))
        } else {
            None
        };

        let result = match new_contour {
            // A new disjoint area.
            Some(contour) if !self.fragments.iter().any(|f| f.contour == Some(contour)) => {
                self.push_fragment(contour, x, y)
            }
            _ => {
                let contour = geometry::contour_containing(&self.polygon, x, y);
                match self.fragments.iter().position(|f| f.contour.is_some() && f.contour == contour) {
                    Some(index) => self.fragment_id(index),
                    None => self.push_fragment(contour.unwrap_or(0), x, y),
                }
            }
        };

        self.update_area();
        self.update_perimeter();
        trace!(
            "zone \"{}\": focus ({x}, {y}) -> fragment {} of {}, {} contour(s)",
            self.name,
            result.index,
            self.fragments.len(),
            self.polygon.0.len()
        );
        (result, holes)
    }

    fn push_fragment(&mut self, contour: usize, x: f64, y: f64) -> FragmentId {
        let index = self.fragments.len();
        self.fragments.push(ZoneFragment::new(self.id, contour, (x, y)));
        self.fragment_id(index)
    }

    /// Points every fragment at the contour that now covers its sample point.
    fn remap_fragments(&mut self) {
        for fragment in &mut self.fragments {
            let Some(sample) = fragment.sample else {
                continue;
            };
            match geometry::contour_containing(&self.polygon, sample.0, sample.1) {
                Some(contour) => fragment.contour = Some(contour),
                None => debug!(
                    "zone \"{}\": sample ({}, {}) is outside every contour; keeping contour {:?}",
                    self.name, sample.0, sample.1, fragment.contour
                ),
            }
        }
    }

    /// Empties the zone's geometry. The background zone is left as it is.
    pub fn reset(&mut self) {
        if self.is_background() {
            return;
        }
        self.foci.clear();
        self.polygon = geometry::empty_shape();
        self.fragments.clear();
        self.area = 0.0;
        self.perimeter = 0.0;
        self.holes_filled = 0;
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<zone \"{}\" level={}", self.name, self.level)?;
        if self.is_background() {
            write!(f, " all other areas>")
        } else {
            write!(
                f,
                " radius={:.3} {} separate area(s) area={:.3} perimeter={:.3}>",
                self.radius,
                self.polygon.0.len(),
                self.area,
                self.perimeter
            )
        }
    }
}
