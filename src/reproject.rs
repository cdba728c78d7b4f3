use geojson::{Geometry as GeoJsonGeometry, Value as GeoJsonValue};
use proj::Proj;

use crate::error::ReprojectError;

/// ETRS89 geographic coordinates, the CRS of the source datasets.
pub const GEOGRAPHIC_CRS: &str = "EPSG:4258";
/// ETRS89 / UTM zone 30N, metric CRS used for clustering distances.
pub const METRIC_CRS: &str = "EPSG:25830";

/// Forward and inverse transformation between the geographic and the metric CRS.
///
/// `Proj` handles are not shared between threads; every worker builds its own
/// reprojector.
pub struct Reprojector {
    forward: Proj,
    inverse: Proj,
}

impl Reprojector {
    pub fn new() -> Result<Self, ReprojectError> {
        Ok(Self {
            forward: known_crs(GEOGRAPHIC_CRS, METRIC_CRS)?,
            inverse: known_crs(METRIC_CRS, GEOGRAPHIC_CRS)?,
        })
    }

    /// Projects `(lon, lat)` to `(x, y)` meters, rounded to millimeters.
    pub fn to_metric(&self, lon: f64, lat: f64) -> Result<(f64, f64), ReprojectError> {
        let (x, y) = convert(&self.forward, lon, lat)?;
        Ok((round_to(x, 3), round_to(y, 3)))
    }

    /// Inverse of [`Reprojector::to_metric`], rounded to 6 decimal degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), ReprojectError> {
        let (lon, lat) = convert(&self.inverse, x, y)?;
        Ok((round_to(lon, 6), round_to(lat, 6)))
    }

    /// Projects a point geometry. Any other geometry type is rejected.
    pub fn project_geometry(
        &self,
        geometry: &GeoJsonGeometry,
    ) -> Result<(f64, f64), ReprojectError> {
        match &geometry.value {
            GeoJsonValue::Point(coords) if coords.len() >= 2 => {
                self.to_metric(coords[0], coords[1])
            }
            other => Err(ReprojectError::UnsupportedGeometry(
                geometry_type(other).to_string(),
            )),
        }
    }
}

fn geometry_type(value: &GeoJsonValue) -> &'static str {
    match value {
        GeoJsonValue::Point(_) => "Point",
        GeoJsonValue::MultiPoint(_) => "MultiPoint",
        GeoJsonValue::LineString(_) => "LineString",
        GeoJsonValue::MultiLineString(_) => "MultiLineString",
        GeoJsonValue::Polygon(_) => "Polygon",
        GeoJsonValue::MultiPolygon(_) => "MultiPolygon",
        GeoJsonValue::GeometryCollection(_) => "GeometryCollection",
    }
}

fn known_crs(from: &'static str, to: &'static str) -> Result<Proj, ReprojectError> {
    Proj::new_known_crs(from, to, None)
        .map_err(|source| ReprojectError::Create { from, to, source })
}

fn convert(proj: &Proj, a: f64, b: f64) -> Result<(f64, f64), ReprojectError> {
    let (u, v) = proj
        .convert((a, b))
        .map_err(|e| ReprojectError::Convert(a, b, e))?;
    if !u.is_finite() || !v.is_finite() {
        return Err(ReprojectError::NonFinite(a, b));
    }
    Ok((u, v))
}

/// Rounds to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
