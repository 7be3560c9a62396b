//! Mock vessel annotations
//!
//! Coordinates and sizes are percentages of the image extent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One annotated vessel overlaid on an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "type")]
    pub vessel_type: String,
    pub metadata: BTreeMap<String, String>,
}

impl Vessel {
    fn new(
        id: &str,
        (x, y): (f64, f64),
        (width, height): (f64, f64),
        vessel_type: &str,
        metadata: &[(&str, &str)],
    ) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            vessel_type: vessel_type.to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// The fixed detection result attached to every image
pub fn mock_vessels() -> Vec<Vessel> {
    vec![
        Vessel::new(
            "1",
            (25.0, 30.0),
            (5.0, 2.0),
            "Cargo Ship",
            &[
                ("Length", "320m"),
                ("Width", "45m"),
                ("Speed", "12 knots"),
                ("Direction", "North-East"),
                ("Estimated Capacity", "10,000 TEU"),
            ],
        ),
        Vessel::new(
            "2",
            (60.0, 45.0),
            (3.0, 1.5),
            "Tanker",
            &[
                ("Length", "250m"),
                ("Width", "40m"),
                ("Speed", "8 knots"),
                ("Direction", "South"),
                ("Cargo Type", "Oil"),
            ],
        ),
        Vessel::new(
            "3",
            (40.0, 70.0),
            (2.0, 1.0),
            "Fishing Vessel",
            &[
                ("Length", "35m"),
                ("Width", "10m"),
                ("Speed", "5 knots"),
                ("Direction", "West"),
                ("Activity", "Active fishing"),
            ],
        ),
    ]
}
