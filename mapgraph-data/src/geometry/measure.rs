//! Spherical measures over WGS84 geometries.
//!
//! Areas are geodesic, distances and bearings use the haversine model.
//! Centroids are planar, matching what the graph stores for every node.

use geo::{
    Bearing, BoundingRect, Centroid, Closest, ClosestPoint, Coord, Distance, GeodesicArea,
    Geometry, Haversine, Point, Rect,
};

/// Unsigned geodesic area in square metres; zero for non-areal geometries.
pub(crate) fn area(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Polygon(polygon) => polygon.geodesic_area_unsigned(),
        Geometry::MultiPolygon(polygons) => polygons.geodesic_area_unsigned(),
        Geometry::Rect(rect) => rect.to_polygon().geodesic_area_unsigned(),
        Geometry::Triangle(triangle) => triangle.to_polygon().geodesic_area_unsigned(),
        Geometry::GeometryCollection(collection) => collection.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Planar centroid, or `None` for empty geometries.
pub(crate) fn centroid(geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    geometry.centroid().map(|point| point.0)
}

/// Bounding box, or `None` for empty geometries.
pub(crate) fn bounds(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Surface distance in metres from `point` to the closest part of
/// `geometry`; zero when the point lies on or inside it.
///
/// The point is also tried one turn east and west so geometries on the far
/// side of the antimeridian are measured the short way round.
pub(crate) fn distance_to(point: Coord<f64>, geometry: &Geometry<f64>) -> Option<f64> {
    [0.0, -360.0, 360.0]
        .into_iter()
        .filter_map(|shift| {
            let origin = Point::new(point.x + shift, point.y);
            match geometry.closest_point(&origin) {
                Closest::Intersection(_) => Some(0.0),
                Closest::SinglePoint(nearest) => Some(Haversine.distance(origin, nearest)),
                Closest::Indeterminate => None,
            }
        })
        .min_by(f64::total_cmp)
}

/// Initial great-circle bearing from `from` to `to`, in degrees clockwise
/// from north within `[0, 360)`.
pub(crate) fn bearing(from: Coord<f64>, to: Coord<f64>) -> f64 {
    Haversine
        .bearing(Point::from(from), Point::from(to))
        .rem_euclid(360.0)
}
