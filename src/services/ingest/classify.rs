use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;
const TOLERANCE: f64 = 0.1;

/// Coarse shape of a visual stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShapeCategory {
    Landscape,
    Portrait,
    Other,
    Indeterminate,
}

impl ShapeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeCategory::Landscape => "landscape",
            ShapeCategory::Portrait => "portrait",
            ShapeCategory::Other => "other",
            ShapeCategory::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for ShapeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map pixel dimensions to a shape category.
///
/// Missing or zero dimensions are `Indeterminate`. Landscape is tested first.
pub fn classify(width: Option<u32>, height: Option<u32>) -> ShapeCategory {
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return ShapeCategory::Indeterminate,
    };

    classify_ratio(width as f64 / height as f64)
}

pub fn classify_ratio(ratio: f64) -> ShapeCategory {
    if (ratio - LANDSCAPE_RATIO).abs() < TOLERANCE {
        ShapeCategory::Landscape
    } else if (ratio - PORTRAIT_RATIO).abs() < TOLERANCE {
        ShapeCategory::Portrait
    } else {
        ShapeCategory::Other
    }
}
