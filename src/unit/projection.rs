/*!

Conversion between geographic coordinates and the planar kilometre grid that zone geometry and
distance calculations work in.

*/

/// Converts latitude/longitude in degrees to planar `(x, y)` in kilometres and back.
pub trait CoordinateTransform {
    fn project(&self, latitude: f64, longitude: f64) -> (f64, f64);
    fn unproject(&self, x: f64, y: f64) -> (f64, f64);
}

/// `x = longitude`, `y = latitude`. Used when the population is already planar.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn project(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        (longitude, latitude)
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        (y, x)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equirectangular projection about a reference latitude. Distances are accurate near the
/// reference latitude, which is enough for regional study areas.
#[derive(Copy, Clone, Debug)]
pub struct EquirectangularTransform {
    reference_latitude: f64,
    cos_reference: f64,
}

impl EquirectangularTransform {
    #[must_use]
    pub fn new(reference_latitude: f64) -> Self {
        EquirectangularTransform {
            reference_latitude,
            cos_reference: reference_latitude.to_radians().cos(),
        }
    }

    #[must_use]
    pub fn reference_latitude(&self) -> f64 {
        self.reference_latitude
    }
}

impl CoordinateTransform for EquirectangularTransform {
    fn project(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let x = EARTH_RADIUS_KM * longitude.to_radians() * self.cos_reference;
        let y = EARTH_RADIUS_KM * latitude.to_radians();
        (x, y)
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let latitude = (y / EARTH_RADIUS_KM).to_degrees();
        let longitude = (x / (EARTH_RADIUS_KM * self.cos_reference)).to_degrees();
        (latitude, longitude)
    }
}
