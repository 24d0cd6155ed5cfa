use crate::zone::{FragmentId, ZoneId};

/// A persistently identified piece of a zone.
///
/// `contour` is renumbered whenever the zone's shape changes; the fragment itself is not. Two
/// fragments may point at the same contour after their areas merge, which keeps "the zone around
/// unit X" meaningful after the merge.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneFragment {
    pub(crate) parent: ZoneId,
    pub(crate) contour: Option<usize>,
    /// A point known to be inside the fragment; `None` only for the background fragment.
    pub(crate) sample: Option<(f64, f64)>,
    /// The fragment of the next lower-priority zone that encloses this one.
    pub(crate) nests_in: Option<FragmentId>,
}

impl ZoneFragment {
    pub(crate) fn new(parent: ZoneId, contour: usize, sample: (f64, f64)) -> Self {
        ZoneFragment {
            parent,
            contour: Some(contour),
            sample: Some(sample),
            nests_in: None,
        }
    }

    pub(crate) fn background(parent: ZoneId) -> Self {
        ZoneFragment {
            parent,
            contour: None,
            sample: None,
            nests_in: None,
        }
    }

    #[must_use]
    pub fn parent(&self) -> ZoneId {
        self.parent
    }

    #[must_use]
    pub fn contour(&self) -> Option<usize> {
        self.contour
    }

    #[must_use]
    pub fn sample(&self) -> Option<(f64, f64)> {
        self.sample
    }

    #[must_use]
    pub fn nests_in(&self) -> Option<FragmentId> {
        self.nests_in
    }

    #[must_use]
    pub fn is_background(&self) -> bool {
        self.contour.is_none()
    }
}
