//! Geometry accessors shared by both bounding-box shapes.
//!
//! Every function answers the same question for an axis-aligned box and for a
//! quadrilateral, so layout code never branches on shape.

use crate::models::fragment::BoundingBox;

fn xs(points: &[(f64, f64); 4]) -> impl Iterator<Item = f64> + '_ {
    points.iter().map(|p| p.0)
}

fn ys(points: &[(f64, f64); 4]) -> impl Iterator<Item = f64> + '_ {
    points.iter().map(|p| p.1)
}

fn min(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::INFINITY, f64::min)
}

fn max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, f64::max)
}

/// Vertical center: mean of point Y values, or `y + h/2`
pub fn center_y(bbox: &BoundingBox) -> f64 {
    match bbox {
        BoundingBox::AxisAligned { y, h, .. } => y + h / 2.0,
        BoundingBox::Polygon { points } => ys(points).sum::<f64>() / points.len() as f64,
    }
}

/// Horizontal center: mean of point X values, or `x + w/2`
pub fn center_x(bbox: &BoundingBox) -> f64 {
    match bbox {
        BoundingBox::AxisAligned { x, w, .. } => x + w / 2.0,
        BoundingBox::Polygon { points } => xs(points).sum::<f64>() / points.len() as f64,
    }
}

/// Leftmost X coordinate
pub fn left_x(bbox: &BoundingBox) -> f64 {
    match bbox {
        BoundingBox::AxisAligned { x, .. } => *x,
        BoundingBox::Polygon { points } => min(xs(points)),
    }
}

/// Rightmost X coordinate
pub fn right_x(bbox: &BoundingBox) -> f64 {
    match bbox {
        BoundingBox::AxisAligned { x, w, .. } => x + w,
        BoundingBox::Polygon { points } => max(xs(points)),
    }
}

/// Vertical extent
pub fn height(bbox: &BoundingBox) -> f64 {
    match bbox {
        BoundingBox::AxisAligned { h, .. } => *h,
        BoundingBox::Polygon { points } => max(ys(points)) - min(ys(points)),
    }
}

/// Horizontal extent
pub fn width(bbox: &BoundingBox) -> f64 {
    right_x(bbox) - left_x(bbox)
}
