use geojson::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Feature properties kept from the source dataset, in partition column order.
pub const STREET_NUMBER_FIELDS: [&str; 4] = ["id_porpk", "codigo_postal", "tipo_vial", "poblacion"];

/// Columns a partition file must carry for the centroid stage.
pub const REQUIRED_COLUMNS: [&str; 3] = ["x", "y", "codigo_postal"];

/// One street-number point as written to a partition file.
///
/// `x`/`y` are metric coordinates; they are `None` when the source geometry
/// could not be projected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressPoint {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub id_porpk: Option<String>,
    pub codigo_postal: String,
    pub tipo_vial: Option<String>,
    pub poblacion: Option<String>,
}

impl AddressPoint {
    /// Builds a record from feature properties. Returns `None` when the
    /// feature has no postal code.
    pub fn from_properties(
        coords: Option<(f64, f64)>,
        properties: Option<&JsonObject>,
    ) -> Option<Self> {
        let field = |name: &str| properties.and_then(|p| p.get(name)).and_then(property_text);

        Some(Self {
            x: coords.map(|c| c.0),
            y: coords.map(|c| c.1),
            id_porpk: field("id_porpk"),
            codigo_postal: field("codigo_postal")?,
            tipo_vial: field("tipo_vial"),
            poblacion: field("poblacion"),
        })
    }
}

/// Partition row as read back, before coordinates are validated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAddressRow {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub id_porpk: Option<String>,
    pub codigo_postal: String,
    #[serde(default)]
    pub tipo_vial: Option<String>,
    #[serde(default)]
    pub poblacion: Option<String>,
}

/// Row of the final centroid table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidRow {
    pub pct: f64,
    pub num_points: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub id_porpk: Option<String>,
    pub codigo_postal: String,
    pub tipo_vial: Option<String>,
    pub poblacion: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub status: String,
}

fn property_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::Null => return None,
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Empty CSV cells deserialize as `Some("")`; treat them as missing.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(value: JsonValue) -> JsonObject {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn keeps_only_allow_listed_fields() {
        let props = properties(json!({
            "id_porpk": 123456,
            "codigo_postal": "46001",
            "tipo_vial": "CALLE",
            "poblacion": "Valencia",
            "numero": 12,
        }));
        let coords = Some((725000.5, 4372000.25));
        let point = AddressPoint::from_properties(coords, Some(&props)).unwrap();
        assert_eq!(
            point,
            AddressPoint {
                x: Some(725000.5),
                y: Some(4372000.25),
                id_porpk: Some("123456".to_string()),
                codigo_postal: "46001".to_string(),
                tipo_vial: Some("CALLE".to_string()),
                poblacion: Some("Valencia".to_string()),
            }
        );
    }

    #[test]
    fn missing_or_blank_postal_code_is_rejected() {
        let blank = properties(json!({ "codigo_postal": "  ", "poblacion": "Elx" }));
        let null = properties(json!({ "codigo_postal": null }));
        assert!(AddressPoint::from_properties(Some((0.0, 0.0)), Some(&blank)).is_none());
        assert!(AddressPoint::from_properties(Some((0.0, 0.0)), Some(&null)).is_none());
        assert!(AddressPoint::from_properties(Some((0.0, 0.0)), None).is_none());
    }

    #[test]
    fn property_text_is_trimmed() {
        let props = properties(json!({
            "codigo_postal": " 46001 ",
            "tipo_vial": "CALLE\t",
            "poblacion": "  València",
        }));
        let point = AddressPoint::from_properties(None, Some(&props)).unwrap();
        assert_eq!(point.codigo_postal, "46001");
        assert_eq!(point.tipo_vial.as_deref(), Some("CALLE"));
        assert_eq!(point.poblacion.as_deref(), Some("València"));
    }

    #[test]
    fn keeps_record_without_coordinates() {
        let props = properties(json!({ "codigo_postal": "03001" }));
        let point = AddressPoint::from_properties(None, Some(&props)).unwrap();
        assert_eq!(point.x, None);
        assert_eq!(point.y, None);
        assert_eq!(point.poblacion, None);
    }
}
