use geo::{GeodesicDistance, Point};

use crate::geocoder::{Coordinates, Geocode};

/// Geodesic distance on the WGS-84 ellipsoid, in kilometers.
///
/// `None` when either end could not be geocoded.
pub fn distance_km(from: &Geocode, to: &Geocode) -> Option<f64> {
    let from = to_point(from.coordinates()?);
    let to = to_point(to.coordinates()?);
    Some(from.geodesic_distance(&to) / 1000.0)
}

fn to_point(coordinates: Coordinates) -> Point<f64> {
    Point::new(coordinates.longitude, coordinates.latitude)
}
