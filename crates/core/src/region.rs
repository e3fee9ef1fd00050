//! Region selection: the user-drawn polygon and its bounding box

use crate::error::{Error, Result};
use geo::{BoundingRect, Centroid};
use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest bounding box, in square degrees, accepted for a transition query
pub const DEFAULT_MAX_AREA: f64 = 20.0;

/// A geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse `xmin,ymin,xmax,ymax`
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidRegion(format!("bad bbox '{}': {}", s, e)))?;
        if parts.len() != 4 {
            return Err(Error::InvalidRegion(format!(
                "bbox needs 4 values xmin,ymin,xmax,ymax, got {}",
                parts.len()
            )));
        }
        let bbox = Self::new(parts[0], parts[1], parts[2], parts[3]);
        if bbox.min_x > bbox.max_x || bbox.min_y > bbox.max_y {
            return Err(Error::InvalidRegion(format!("inverted bbox '{}'", s)));
        }
        Ok(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Planar area in squared map units (square degrees for lon/lat)
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Whether the box lies inside the lon/lat world extent
    pub fn within_world(&self) -> bool {
        self.min_x >= -180.0 && self.max_x <= 180.0 && self.min_y >= -90.0 && self.max_y <= 90.0
    }
}

/// A single-ring polygon of (longitude, latitude) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygon: Polygon<f64>,
}

impl Region {
    /// Build a region from a ring of (lon, lat) pairs; the ring is closed if needed.
    pub fn from_ring(points: &[(f64, f64)]) -> Result<Self> {
        let mut coords: Vec<Coord<f64>> = points.iter().map(|&(x, y)| Coord { x, y }).collect();
        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::InvalidRegion("ring has non-finite coordinates".into()));
        }
        if coords.first() != coords.last() {
            if let Some(&first) = coords.first() {
                coords.push(first);
            }
        }
        // A closed ring needs at least three distinct vertices
        if coords.len() < 4 {
            return Err(Error::InvalidRegion(format!(
                "ring needs at least 3 vertices, got {}",
                coords.len().saturating_sub(1)
            )));
        }
        Ok(Self {
            polygon: Polygon::new(LineString::new(coords), vec![]),
        })
    }

    /// Region spanning exactly `bbox`
    pub fn from_bbox(bbox: &BBox) -> Self {
        let ring = [
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ];
        let coords: Vec<Coord<f64>> = ring.iter().map(|&(x, y)| Coord { x, y }).collect();
        Self {
            polygon: Polygon::new(LineString::new(coords), vec![]),
        }
    }

    /// Parse a GeoJSON `Feature`, `FeatureCollection` (first feature) or bare
    /// `Polygon` geometry. Only the exterior ring is used.
    pub fn from_geojson(value: &Value) -> Result<Self> {
        let geometry = match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => value
                .get("features")
                .and_then(|f| f.get(0))
                .and_then(|f| f.get("geometry"))
                .ok_or_else(|| Error::InvalidRegion("feature collection is empty".into()))?,
            Some("Feature") => value
                .get("geometry")
                .ok_or_else(|| Error::InvalidRegion("feature has no geometry".into()))?,
            Some("Polygon") => value,
            other => {
                return Err(Error::InvalidRegion(format!(
                    "expected a Polygon feature, got type {:?}",
                    other
                )))
            }
        };

        if geometry.get("type").and_then(Value::as_str) != Some("Polygon") {
            return Err(Error::InvalidRegion("geometry is not a Polygon".into()));
        }

        let ring = geometry
            .get("coordinates")
            .and_then(|c| c.get(0))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidRegion("polygon has no exterior ring".into()))?;

        let points = ring
            .iter()
            .map(|pt| match (pt.get(0).and_then(Value::as_f64), pt.get(1).and_then(Value::as_f64)) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(Error::InvalidRegion(format!("bad position {}", pt))),
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_ring(&points)
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Bounding box (xmin, ymin, xmax, ymax) used to slice the rasters
    pub fn bbox(&self) -> BBox {
        match self.polygon.bounding_rect() {
            Some(rect) => BBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            None => BBox::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// Centroid as (lat, lon), the order map widgets expect
    pub fn center(&self) -> Option<(f64, f64)> {
        self.polygon.centroid().map(|p| (p.y(), p.x()))
    }

    /// Reject regions that are too large to fetch or that wrap past the antimeridian
    pub fn validate(&self, max_area: f64) -> Result<BBox> {
        let bbox = self.bbox();
        if !bbox.within_world() {
            return Err(Error::RegionOutOfBounds(format!(
                "({:.4}, {:.4}, {:.4}, {:.4})",
                bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
            )));
        }
        if bbox.area() > max_area {
            return Err(Error::RegionTooLarge {
                area: bbox.area(),
                limit: max_area,
            });
        }
        Ok(bbox)
    }
}
