use serde::Deserialize;

use crate::types::{Pt, Rect, Size};

/// Field box in unit-square coordinates, `[x0, y0, x1, y1]` in the spec file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct NormBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl From<[f32; 4]> for NormBox {
    fn from(v: [f32; 4]) -> Self {
        Self {
            x0: v[0],
            y0: v[1],
            x1: v[2],
            y1: v[3],
        }
    }
}

/// Which page corner the normalized coordinates are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoxOrigin {
    #[default]
    BottomLeft,
    TopLeft,
}

/// A field box in absolute page units, PDF orientation (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: Pt,
    pub y0: Pt,
    pub x1: Pt,
    pub y1: Pt,
}

impl PageBox {
    pub fn width(&self) -> Pt {
        self.x1 - self.x0
    }

    pub fn height(&self) -> Pt {
        self.y1 - self.y0
    }

    pub fn to_rect(&self) -> Rect {
        Rect {
            x: self.x0,
            y: self.y0,
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Multiplies each coordinate by the matching page dimension. No clamping
/// and no reordering: an inverted or off-page box comes back as given.
pub fn denormalize(b: NormBox, page_width: f32, page_height: f32) -> PageBox {
    PageBox {
        x0: Pt::from_f32(b.x0 * page_width),
        y0: Pt::from_f32(b.y0 * page_height),
        x1: Pt::from_f32(b.x1 * page_width),
        y1: Pt::from_f32(b.y1 * page_height),
    }
}

pub fn denormalize_on_page(b: NormBox, page: Size, origin: BoxOrigin) -> PageBox {
    let b = match origin {
        BoxOrigin::BottomLeft => b,
        BoxOrigin::TopLeft => NormBox {
            x0: b.x0,
            y0: 1.0 - b.y1,
            x1: b.x1,
            y1: 1.0 - b.y0,
        },
    };
    denormalize(b, page.width.to_f32(), page.height.to_f32())
}
