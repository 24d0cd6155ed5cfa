/*!

Loading a population of units.

A population file is a CSV table with a header row. Recognised columns:

| column | meaning |
|---|---|
| `id` | free-text official id |
| `production_type` | category name; types are numbered in first-seen order |
| `size` | number of animals, at least 1 |
| `latitude`, `longitude` | geographic location in degrees |
| `x`, `y` | planar location in kilometres (instead of latitude/longitude) |
| `initial_state` | state code (`S`, `L`, `B`, `C`, `N`, `V`, `D` or the long names) |
| `days_in_initial_state`, `days_left_in_initial_state` | optional, for units already partway through a state |

Bad values are replaced with documented defaults and a warning; only structural problems (an
unreadable file, a table mixing geographic and planar locations) are errors.

*/

use crate::{
    error::SimError,
    log::{info, warn},
    unit::{CoordinateTransform, UnitList, UnitState},
};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UnitRecord {
    pub id: String,
    pub production_type: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub size: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub y: Option<f64>,
    #[serde(default)]
    pub initial_state: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub days_in_initial_state: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub days_left_in_initial_state: Option<u32>,
}

impl UnitRecord {
    fn is_planar(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

/// Wraps a longitude into the range -180 to 180.
fn wrap_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps 180 to -180; keep the caller's sign for the antimeridian.
    if wrapped == -180.0 && longitude > 0.0 { 180.0 } else { wrapped }
}

impl UnitList {
    /// Builds a unit list from records, projecting geographic locations with `transform`.
    pub fn from_records<I>(records: I, transform: &dyn CoordinateTransform) -> Result<UnitList, SimError>
    where
        I: IntoIterator<Item = UnitRecord>,
    {
        let mut units = UnitList::new();
        let mut planar: Option<bool> = None;

        for record in records {
            let record_is_planar = record.is_planar();
            match planar {
                None => planar = Some(record_is_planar),
                Some(expected) if expected != record_is_planar => {
                    return Err(SimError::ConfigError(format!(
                        "unit \"{}\" uses {} coordinates but earlier units do not",
                        record.id,
                        if record_is_planar { "x/y" } else { "latitude/longitude" }
                    )));
                }
                Some(_) => {}
            }

            let size = match record.size {
                Some(size) if size >= 1 => u32::try_from(size).unwrap_or(u32::MAX),
                other => {
                    warn!("unit \"{}\" has size {other:?}, using 1", record.id);
                    1
                }
            };

            let (lat_lon, xy) = if record_is_planar {
                let x = record.x.unwrap_or_else(|| {
                    warn!("unit \"{}\" is missing x, using 0", record.id);
                    0.0
                });
                let y = record.y.unwrap_or_else(|| {
                    warn!("unit \"{}\" is missing y, using 0", record.id);
                    0.0
                });
                (transform.unproject(x, y), (x, y))
            } else {
                let mut latitude = record.latitude.unwrap_or_else(|| {
                    warn!("unit \"{}\" is missing latitude, using 0", record.id);
                    0.0
                });
                if !(-90.0..=90.0).contains(&latitude) {
                    let clamped = latitude.clamp(-90.0, 90.0);
                    warn!("unit \"{}\" latitude {latitude} out of range, using {clamped}", record.id);
                    latitude = clamped;
                }
                let longitude = wrap_longitude(record.longitude.unwrap_or_else(|| {
                    warn!("unit \"{}\" is missing longitude, using 0", record.id);
                    0.0
                }));
                ((latitude, longitude), transform.project(latitude, longitude))
            };

            let initial_state = match record.initial_state.as_deref() {
                None | Some("") => UnitState::Susceptible,
                Some(code) => code.parse().unwrap_or_else(|_| {
                    warn!("unit \"{}\" has unknown state \"{code}\", using Susceptible", record.id);
                    UnitState::Susceptible
                }),
            };

            units.push(
                record.id,
                &record.production_type,
                size,
                lat_lon,
                xy,
                (
                    initial_state,
                    record.days_in_initial_state.unwrap_or(0),
                    record.days_left_in_initial_state.unwrap_or(0),
                ),
            );
        }

        Ok(units)
    }

    /// Reads a population CSV table from any reader.
    pub fn from_csv_reader<R: Read>(reader: R, transform: &dyn CoordinateTransform) -> Result<UnitList, SimError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let records = reader
            .deserialize::<UnitRecord>()
            .collect::<Result<Vec<_>, csv::Error>>()?;
        let units = UnitList::from_records(records, transform)?;
        info!(
            "loaded {} units of {} production types",
            units.len(),
            units.production_types().len()
        );
        Ok(units)
    }

    /// Reads a population CSV file.
    pub fn load_population_csv(path: &Path, transform: &dyn CoordinateTransform) -> Result<UnitList, SimError> {
        let file = std::fs::File::open(path)?;
        UnitList::from_csv_reader(file, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{IdentityTransform, UnitId};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_csv_file_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,production_type,size,latitude,longitude,initial_state").unwrap();
        writeln!(file, "A1,Cattle,120,45.0,-75.0,S").unwrap();
        writeln!(file, "A2,Swine,0,95.0,190.0,Lat").unwrap();
        writeln!(file, "A3,Cattle,abc,-10.0,10.0,Q").unwrap();
        file.flush().unwrap();

        let units = UnitList::load_population_csv(file.path(), &IdentityTransform).unwrap();
        assert_eq!(units.len(), 3);

        let a2 = &units[UnitId(1)];
        assert_eq!(a2.size(), 1);
        assert_eq!(a2.latitude(), 90.0);
        assert!((a2.longitude() + 170.0).abs() < 1e-9);
        assert_eq!(a2.initial_state(), UnitState::Latent);

        let a3 = &units[UnitId(2)];
        assert_eq!(a3.size(), 1);
        assert_eq!(a3.initial_state(), UnitState::Susceptible);
        assert_eq!(a3.production_type(), 0);
        // Identity projection: x is longitude.
        assert_eq!(a3.x(), 10.0);
        assert_eq!(a3.y(), -10.0);
    }

    #[test]
    fn planar_records() {
        let data = "id,production_type,size,x,y,initial_state,days_in_initial_state,days_left_in_initial_state\n\
                    u0,Cattle,5,0,0,S,,\n\
                    u1,Cattle,5,10,10,N,2,3\n";
        let units = UnitList::from_csv_reader(data.as_bytes(), &IdentityTransform).unwrap();
        let u1 = &units[UnitId(1)];
        assert_eq!((u1.x(), u1.y()), (10.0, 10.0));
        assert_eq!(u1.initial_state(), UnitState::NaturallyImmune);
        assert_eq!(u1.days_in_initial_state(), 2);
        assert_eq!(u1.days_left_in_initial_state(), 3);
    }

    #[test]
    fn mixed_coordinates_are_rejected() {
        let records = vec![
            UnitRecord {
                id: "a".to_string(),
                production_type: "Cattle".to_string(),
                latitude: Some(1.0),
                longitude: Some(1.0),
                ..UnitRecord::default()
            },
            UnitRecord {
                id: "b".to_string(),
                production_type: "Cattle".to_string(),
                x: Some(1.0),
                y: Some(1.0),
                ..UnitRecord::default()
            },
        ];
        let result = UnitList::from_records(records, &IdentityTransform);
        assert!(matches!(result, Err(SimError::ConfigError(_))));
    }

    #[test]
    fn longitude_wrapping() {
        assert_eq!(wrap_longitude(0.0), 0.0);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert!((wrap_longitude(190.0) + 170.0).abs() < 1e-9);
        assert!((wrap_longitude(-200.0) - 160.0).abs() < 1e-9);
    }
}
