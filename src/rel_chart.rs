/*!

Relational charts: piecewise-linear functions given as `(x, y)` points.

Charts appear in scenario files either as a single number (a constant function) or as a list of
`[x, y]` pairs with strictly increasing `x`:

```json
{ "prevalence": [[0.0, 0.0], [0.5, 1.0], [1.0, 0.2]] }
```

Lookups outside the charted range clamp `x` to the first or last point.

*/

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelChart {
    Point(f64),
    Generic(Vec<[f64; 2]>),
}

impl RelChart {
    /// Checks that the chart has at least one point, finite values and increasing `x`.
    pub fn validate(&self) -> Result<(), SimError> {
        match self {
            RelChart::Point(value) if value.is_finite() => Ok(()),
            RelChart::Point(value) => Err(SimError::ConfigError(format!(
                "chart value {value} is not finite"
            ))),
            RelChart::Generic(points) => {
                if points.is_empty() {
                    return Err(SimError::ConfigError("chart has no points".to_string()));
                }
                if points.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(SimError::ConfigError(
                        "chart contains a non-finite value".to_string(),
                    ));
                }
                if points.windows(2).any(|pair| pair[1][0] <= pair[0][0]) {
                    return Err(SimError::ConfigError(
                        "chart x values must be strictly increasing".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Evaluates the chart at `x`, interpolating linearly between points.
    #[must_use]
    pub fn lookup(&self, x: f64) -> f64 {
        let points = match self {
            RelChart::Point(value) => return *value,
            RelChart::Generic(points) => points,
        };
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 0.0;
        };
        if x <= first[0] {
            return first[1];
        }
        if x >= last[0] {
            return last[1];
        }
        // First point strictly to the right of `x`; exists because x < last[0].
        let right = points.partition_point(|p| p[0] <= x);
        let [x0, y0] = points[right - 1];
        let [x1, y1] = points[right];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        match self {
            RelChart::Point(value) => *value,
            RelChart::Generic(points) => points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max),
        }
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        match self {
            RelChart::Point(value) => *value,
            RelChart::Generic(points) => points.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min),
        }
    }
}

impl Display for RelChart {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RelChart::Point(value) => write!(f, "<relationship chart point {value}>"),
            RelChart::Generic(points) => {
                write!(f, "<relationship chart")?;
                for [x, y] in points {
                    write!(f, " ({x},{y})")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_chart_is_constant() {
        let chart = RelChart::Point(0.25);
        assert_eq!(chart.lookup(-4.0), 0.25);
        assert_eq!(chart.lookup(100.0), 0.25);
    }

    #[test]
    fn generic_chart_interpolates_and_clamps() {
        let chart = RelChart::Generic(vec![[0.0, 0.0], [1.0, 1.0], [3.0, 0.0]]);
        assert_eq!(chart.lookup(-1.0), 0.0);
        assert!((chart.lookup(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(chart.lookup(1.0), 1.0);
        assert!((chart.lookup(2.0) - 0.5).abs() < 1e-12);
        assert_eq!(chart.lookup(10.0), 0.0);
        assert_eq!(chart.max(), 1.0);
        assert_eq!(chart.min(), 0.0);
    }

    #[test]
    fn deserializes_both_forms() {
        let point: RelChart = serde_json::from_str("0.5").unwrap();
        assert_eq!(point, RelChart::Point(0.5));
        let generic: RelChart = serde_json::from_str("[[0, 0], [2, 1]]").unwrap();
        assert_eq!(generic, RelChart::Generic(vec![[0.0, 0.0], [2.0, 1.0]]));
    }

    #[test]
    fn rejects_unsorted_points() {
        let chart = RelChart::Generic(vec![[1.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(chart.validate(), Err(SimError::ConfigError(_))));
        assert!(RelChart::Generic(vec![]).validate().is_err());
        assert!(RelChart::Generic(vec![[0.0, 0.0], [1.0, 1.0]]).validate().is_ok());
    }
}
