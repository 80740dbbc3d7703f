use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Rectangular crop request in pixel coordinates.
///
/// Values are signed and unclamped; clamping happens against the actual image
/// when the crop is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CropRegion {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl CropRegion {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A crop is only applied when both dimensions are positive
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,width,height`
impl FromStr for CropRegion {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OcrError::Configuration(format!("Invalid crop region '{}': {}", s, e)))?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(OcrError::Configuration(format!(
                "Invalid crop region '{}': expected x,y,width,height",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_validation() {
        assert!(CropRegion::new(0, 0, 100, 100).is_valid());
        assert!(!CropRegion::new(0, 0, 0, 100).is_valid());
        assert!(!CropRegion::new(0, 0, 100, -3).is_valid());
    }

    #[test]
    fn test_parse_region() {
        let region: CropRegion = "10, 20,300,40".parse().unwrap();
        assert_eq!(region, CropRegion::new(10, 20, 300, 40));
        assert_eq!(region.to_string(), "10,20,300,40");

        let negative: CropRegion = "-5,-5,10000,10000".parse().unwrap();
        assert_eq!(negative.x, -5);
    }

    #[test]
    fn test_parse_region_rejects_bad_input() {
        assert!("1,2,3".parse::<CropRegion>().is_err());
        assert!("a,b,c,d".parse::<CropRegion>().is_err());
        assert!("".parse::<CropRegion>().is_err());
    }

    #[test]
    fn test_region_offsets_default_to_zero() {
        let region: CropRegion = serde_json::from_str(r#"{"width": 50, "height": 20}"#).unwrap();
        assert_eq!(region, CropRegion::new(0, 0, 50, 20));
    }
}
