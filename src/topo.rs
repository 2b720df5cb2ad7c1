//! World-atlas TopoJSON decoding into country polygons.
//!
//! TopoJSON stores shared borders once as "arcs"; polygons reference arcs
//! by index, with a negative index `!i` meaning arc `i` traversed in
//! reverse. Quantized topologies delta-encode arc points and carry a
//! `transform` mapping integer coordinates back to longitude/latitude.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::{Error, Result};

pub type Point = [f64; 2];
pub type Ring = Vec<Point>;
/// Outer ring followed by holes.
pub type Polygon = Vec<Ring>;

#[derive(Debug, Clone, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TopoObject {
    GeometryCollection {
        geometries: Vec<TopoObject>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Properties,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Properties,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    pub objects: BTreeMap<String, TopoObject>,
    pub arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryShape {
    pub id: String,
    pub name: String,
    pub polygons: Vec<Polygon>,
}

impl CountryShape {
    /// Point-in-polygon test honouring holes.
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.polygons.iter().any(|polygon| {
            let mut rings = polygon.iter();
            match rings.next() {
                Some(outer) if ring_contains(outer, lng, lat) => {
                    !rings.any(|hole| ring_contains(hole, lng, lat))
                }
                _ => false,
            }
        })
    }
}

/// Even-odd ray casting.
fn ring_contains(ring: &[Point], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Topology {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Absolute coordinates for every arc.
    fn decoded_arcs(&self) -> Result<Vec<Ring>> {
        self.arcs
            .iter()
            .enumerate()
            .map(|(idx, arc)| {
                let (mut x, mut y) = (0.0, 0.0);
                arc.iter()
                    .map(|position| {
                        let (&px, &py) = match position.as_slice() {
                            [px, py, ..] => (px, py),
                            _ => {
                                return Err(Error::invalid_data(format!(
                                    "arc {} has a position with fewer than two coordinates",
                                    idx
                                )));
                            }
                        };
                        Ok(match &self.transform {
                            Some(t) => {
                                x += px;
                                y += py;
                                [x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1]]
                            }
                            None => [px, py],
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Country shapes from the `countries` object (or the first object
    /// when that name is absent).
    pub fn countries(&self) -> Result<Vec<CountryShape>> {
        let arcs = self.decoded_arcs()?;
        let object = self
            .objects
            .get("countries")
            .or_else(|| self.objects.values().next())
            .ok_or_else(|| Error::invalid_data("topology has no objects"))?;

        let mut shapes = Vec::new();
        collect_shapes(object, &arcs, &mut shapes)?;
        Ok(shapes)
    }
}

fn collect_shapes(object: &TopoObject, arcs: &[Ring], out: &mut Vec<CountryShape>) -> Result<()> {
    match object {
        TopoObject::GeometryCollection { geometries } => {
            for geometry in geometries {
                collect_shapes(geometry, arcs, out)?;
            }
        }
        TopoObject::Polygon { arcs: rings, id, properties } => {
            out.push(shape(id, properties, vec![polygon(rings, arcs)?]));
        }
        TopoObject::MultiPolygon { arcs: polygons, id, properties } => {
            let polygons = polygons
                .iter()
                .map(|rings| polygon(rings, arcs))
                .collect::<Result<Vec<_>>>()?;
            out.push(shape(id, properties, polygons));
        }
        TopoObject::Unsupported => {}
    }
    Ok(())
}

fn shape(id: &Option<serde_json::Value>, properties: &Properties, polygons: Vec<Polygon>) -> CountryShape {
    let id = match id {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    CountryShape {
        name: properties.name.clone().unwrap_or_else(|| id.clone()),
        id,
        polygons,
    }
}

fn polygon(rings: &[Vec<i64>], arcs: &[Ring]) -> Result<Polygon> {
    rings.iter().map(|ring| stitch(ring, arcs)).collect()
}

/// Join arcs into a ring, dropping the duplicated junction point.
fn stitch(indices: &[i64], arcs: &[Ring]) -> Result<Ring> {
    let mut ring: Ring = Vec::new();
    for &index in indices {
        let (arc_idx, reversed) = if index >= 0 {
            (index as usize, false)
        } else {
            ((!index) as usize, true)
        };
        let arc = arcs
            .get(arc_idx)
            .ok_or_else(|| Error::invalid_data(format!("arc index {} out of range", index)))?;

        let mut points = arc.clone();
        if reversed {
            points.reverse();
        }
        let skip = usize::from(!ring.is_empty());
        ring.extend(points.into_iter().skip(skip));
    }
    Ok(ring)
}

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("united states", "united states of america"),
    ("usa", "united states of america"),
    ("us", "united states of america"),
    ("uk", "united kingdom"),
    ("czech republic", "czechia"),
];

/// Case-insensitive lookup with a few common aliases.
pub fn find_country<'a>(shapes: &'a [CountryShape], name: &str) -> Option<&'a CountryShape> {
    let wanted = name.trim().to_lowercase();
    let canonical = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == wanted)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(wanted.as_str());
    shapes
        .iter()
        .find(|shape| shape.name.to_lowercase() == canonical || shape.name.to_lowercase() == wanted)
}

pub fn country_at(shapes: &[CountryShape], lng: f64, lat: f64) -> Option<&CountryShape> {
    shapes.iter().find(|shape| shape.contains(lng, lat))
}

/// Fetch and decode the configured world atlas; failures are logged and
/// yield no shapes.
pub fn load_world(config: &Config) -> Vec<CountryShape> {
    match fetch_world(config) {
        Ok(shapes) => {
            tracing::debug!(countries = shapes.len(), "loaded world atlas");
            shapes
        }
        Err(e) => {
            tracing::warn!(error = %e, url = %config.world_atlas_url, "world atlas unavailable");
            Vec::new()
        }
    }
}

fn fetch_world(config: &Config) -> Result<Vec<CountryShape>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let body = client
        .get(&config.world_atlas_url)
        .send()?
        .error_for_status()?
        .text()?;
    Topology::parse(&body)?.countries()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two unit squares sharing the edge x=1, quantized with scale 1 and
    /// translate (10, 20).
    const TWO_SQUARES: &str = r#"{
        "type": "Topology",
        "transform": { "scale": [1, 1], "translate": [10, 20] },
        "objects": {
            "countries": {
                "type": "GeometryCollection",
                "geometries": [
                    { "type": "Polygon", "id": "001", "arcs": [[0, 1]], "properties": { "name": "Westland" } },
                    { "type": "MultiPolygon", "id": 2, "arcs": [[[-1, 2]]], "properties": { "name": "Eastland" } },
                    { "type": "Point", "coordinates": [0, 0] }
                ]
            }
        },
        "arcs": [
            [[1, 0], [0, 1]],
            [[1, 1], [-1, 0], [0, -1], [1, 0]],
            [[1, 0], [1, 0], [0, 1], [-1, 0]]
        ]
    }"#;

    #[test]
    fn test_decodes_delta_arcs_with_transform() {
        let topo = Topology::parse(TWO_SQUARES).unwrap();
        let arcs = topo.decoded_arcs().unwrap();
        assert_eq!(arcs[0], vec![[11.0, 20.0], [11.0, 21.0]]);
        assert_eq!(arcs[1][3], [11.0, 20.0]);
    }

    #[test]
    fn test_stitches_shared_and_reversed_arcs() {
        let topo = Topology::parse(TWO_SQUARES).unwrap();
        let shapes = topo.countries().unwrap();
        assert_eq!(shapes.len(), 2);

        let west = &shapes[0];
        assert_eq!(west.id, "001");
        assert_eq!(west.polygons[0][0].len(), 5);
        assert_eq!(west.polygons[0][0].first(), west.polygons[0][0].last());

        let east = &shapes[1];
        assert_eq!(east.id, "2");
        assert_eq!(east.polygons[0][0][0], [11.0, 21.0]);
    }

    #[test]
    fn test_point_in_country() {
        let shapes = Topology::parse(TWO_SQUARES).unwrap().countries().unwrap();
        assert_eq!(country_at(&shapes, 10.5, 20.5).map(|s| s.name.as_str()), Some("Westland"));
        assert_eq!(country_at(&shapes, 11.5, 20.5).map(|s| s.name.as_str()), Some("Eastland"));
        assert!(country_at(&shapes, 15.0, 25.0).is_none());
    }

    #[test]
    fn test_hole_is_excluded() {
        let shape = CountryShape {
            id: "x".into(),
            name: "Ring".into(),
            polygons: vec![vec![
                vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]],
            ]],
        };
        assert!(shape.contains(1.0, 1.0));
        assert!(!shape.contains(5.0, 5.0));
    }

    #[test]
    fn test_find_country_aliases() {
        let shapes = vec![CountryShape {
            id: "840".into(),
            name: "United States of America".into(),
            polygons: vec![],
        }];
        assert!(find_country(&shapes, "United States").is_some());
        assert!(find_country(&shapes, "united states of america").is_some());
        assert!(find_country(&shapes, "Canada").is_none());
    }

    #[test]
    fn test_out_of_range_arc_is_an_error() {
        let body = r#"{"type":"Topology","objects":{"countries":{"type":"Polygon","arcs":[[5]]}},"arcs":[]}"#;
        let topo = Topology::parse(body).unwrap();
        assert!(topo.countries().is_err());
    }
}
