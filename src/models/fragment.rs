use serde::{Deserialize, Serialize};

/// Bounding region of a recognized text span.
///
/// Engines emit one of two shapes. The shape is fixed when the adapter builds
/// the fragment, so nothing downstream has to inspect coordinates to find out
/// which one it holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoxRepr", into = "BoxRepr")]
pub enum BoundingBox {
    /// Top-left corner plus extents, serialized as `[x, y, w, h]`
    AxisAligned { x: f64, y: f64, w: f64, h: f64 },
    /// Four corners in engine order, serialized as `[[x, y], ...]`
    Polygon { points: [(f64, f64); 4] },
}

/// JSON shape of a bounding box: a flat 4-array or an array of 4 points
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BoxRepr {
    Points([[f64; 2]; 4]),
    Rect([f64; 4]),
}

impl From<BoxRepr> for BoundingBox {
    fn from(repr: BoxRepr) -> Self {
        match repr {
            BoxRepr::Rect([x, y, w, h]) => BoundingBox::AxisAligned { x, y, w, h },
            BoxRepr::Points(points) => BoundingBox::Polygon {
                points: points.map(|[x, y]| (x, y)),
            },
        }
    }
}

impl From<BoundingBox> for BoxRepr {
    fn from(bbox: BoundingBox) -> Self {
        match bbox {
            BoundingBox::AxisAligned { x, y, w, h } => BoxRepr::Rect([x, y, w, h]),
            BoundingBox::Polygon { points } => BoxRepr::Points(points.map(|(x, y)| [x, y])),
        }
    }
}

impl BoundingBox {
    /// Create an axis-aligned box from `[left, top, width, height]`
    pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::AxisAligned { x, y, w, h }
    }

    /// Create a quadrilateral box from four corners
    pub fn quad(points: [(f64, f64); 4]) -> Self {
        Self::Polygon { points }
    }
}

/// One recognized text span with its confidence and location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Fragment {
    pub fn new(text: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_serializes_as_flat_array() {
        let bbox = BoundingBox::rect(10.0, 20.0, 30.0, 40.0);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[10.0,20.0,30.0,40.0]");
    }

    #[test]
    fn test_polygon_serializes_as_point_list() {
        let bbox = BoundingBox::quad([(0.0, 0.0), (5.0, 0.0), (5.0, 2.0), (0.0, 2.0)]);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[[0.0,0.0],[5.0,0.0],[5.0,2.0],[0.0,2.0]]");
    }

    #[test]
    fn test_shape_is_chosen_from_json_layout() {
        let rect: BoundingBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(rect, BoundingBox::rect(1.0, 2.0, 3.0, 4.0));

        let quad: BoundingBox = serde_json::from_str("[[1,2],[3,2],[3,4],[1,4]]").unwrap();
        assert!(matches!(quad, BoundingBox::Polygon { .. }));
    }

    #[test]
    fn test_fragment_json_field_names() {
        let fragment = Fragment::new("hello", 0.9, BoundingBox::rect(0.0, 0.0, 1.0, 1.0));
        let value = serde_json::to_value(&fragment).unwrap();
        assert_eq!(value["text"], "hello");
        assert_eq!(value["confidence"], 0.9);
        assert!(value["bbox"].is_array());
    }
}
