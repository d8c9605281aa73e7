use serde::{Deserialize, Serialize};

pub type UserId = uuid::Uuid;

/// A single point of a stroke, together with the panning offset the author
/// had when drawing it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingPoint {
    pub x: f64,
    pub y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl DrawingPoint {
    pub fn offset(&self) -> PanningOffset {
        PanningOffset {
            x: self.offset_x,
            y: self.offset_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PanningOffset {
    pub x: f64,
    pub y: f64,
}
