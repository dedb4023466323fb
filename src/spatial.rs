//! Spatial reasoning: where an object sits in the frame and how close it looks.
//!
//! The two axes are classified independently:
//! - horizontal position from the box center against the frame thirds,
//! - depth from the share of the frame the box covers.
//!
//! Boundary values resolve to the middle bucket on both axes.

use std::fmt;

use crate::config::SpatialSettings;
use crate::detect::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Horizontal {
    Left,
    Center,
    Right,
}

impl Horizontal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizontal::Left => "left",
            Horizontal::Center => "center",
            Horizontal::Right => "right",
        }
    }
}

impl fmt::Display for Horizontal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Depth {
    Near,
    MidDistance,
    Far,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Near => "near",
            Depth::MidDistance => "mid-distance",
            Depth::Far => "far",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position and apparent proximity of one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpatialDescriptor {
    pub horizontal: Horizontal,
    pub depth: Depth,
}

impl fmt::Display for SpatialDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.horizontal, self.depth)
    }
}

/// Bucket edges used by [`SpatialThresholds::describe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialThresholds {
    /// The outer zones each span `width / split_divisor`.
    split_divisor: f64,
    near_ratio: f64,
    far_ratio: f64,
}

impl Default for SpatialThresholds {
    fn default() -> Self {
        Self {
            split_divisor: 3.0,
            near_ratio: 0.15,
            far_ratio: 0.05,
        }
    }
}

impl SpatialThresholds {
    /// Thresholds from validated settings.
    pub fn from_settings(settings: &SpatialSettings) -> Self {
        Self {
            split_divisor: 1.0 / settings.horizontal_split,
            near_ratio: settings.near_ratio,
            far_ratio: settings.far_ratio,
        }
    }

    /// Classify a box in an `img_width` x `img_height` frame.
    ///
    /// Callers pass non-zero dimensions and a box inside the frame.
    /// Zero-area boxes are accepted and read as far away.
    pub fn describe(&self, bbox: &BoundingBox, img_width: u32, img_height: u32) -> SpatialDescriptor {
        let center_x = (bbox.x1 as f64 + bbox.x2 as f64) / 2.0;
        let box_area = (bbox.x2 as f64 - bbox.x1 as f64) * (bbox.y2 as f64 - bbox.y1 as f64);
        let img_area = img_width as f64 * img_height as f64;
        SpatialDescriptor {
            horizontal: self.horizontal(center_x, img_width as f64),
            depth: self.depth(box_area / img_area),
        }
    }

    /// Horizontal bucket of `center_x`; the zone edges belong to `Center`.
    pub fn horizontal(&self, center_x: f64, img_width: f64) -> Horizontal {
        let outer = img_width / self.split_divisor;
        let right_edge = (self.split_divisor - 1.0) * outer;
        if center_x < outer {
            Horizontal::Left
        } else if center_x > right_edge {
            Horizontal::Right
        } else {
            Horizontal::Center
        }
    }

    /// Depth bucket of an area ratio; both thresholds belong to `MidDistance`.
    pub fn depth(&self, ratio: f64) -> Depth {
        if ratio > self.near_ratio {
            Depth::Near
        } else if ratio < self.far_ratio {
            Depth::Far
        } else {
            Depth::MidDistance
        }
    }
}

/// Classify a box with the default thresholds.
pub fn describe(bbox: &BoundingBox, img_width: u32, img_height: u32) -> SpatialDescriptor {
    SpatialThresholds::default().describe(bbox, img_width, img_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    #[test]
    fn centers_on_third_edges_are_center() {
        // third = 100, center_x = 100 and 200 exactly.
        assert_eq!(describe(&bbox(90.0, 0.0, 110.0, 10.0), 300, 300).horizontal, Horizontal::Center);
        assert_eq!(describe(&bbox(190.0, 0.0, 210.0, 10.0), 300, 300).horizontal, Horizontal::Center);
    }

    #[test]
    fn centers_past_edges_are_outer() {
        assert_eq!(describe(&bbox(0.0, 0.0, 199.0, 10.0), 300, 300).horizontal, Horizontal::Left);
        assert_eq!(describe(&bbox(101.0, 0.0, 300.0, 10.0), 300, 300).horizontal, Horizontal::Right);
    }

    #[test]
    fn edges_are_center_for_widths_not_divisible_by_three() {
        let t = SpatialThresholds::default();
        for width in [1u32, 2, 4, 5, 7, 641, 1279] {
            let w = width as f64;
            let third = w / 3.0;
            assert_eq!(t.horizontal(third, w), Horizontal::Center, "width {}", width);
            assert_eq!(t.horizontal(2.0 * third, w), Horizontal::Center, "width {}", width);
        }
    }

    #[test]
    fn ratio_boundaries_are_mid_distance() {
        // 100x100 frame: area 1500 -> 0.15, area 500 -> 0.05.
        assert_eq!(describe(&bbox(0.0, 0.0, 30.0, 50.0), 100, 100).depth, Depth::MidDistance);
        assert_eq!(describe(&bbox(0.0, 0.0, 10.0, 50.0), 100, 100).depth, Depth::MidDistance);
        assert_eq!(describe(&bbox(0.0, 0.0, 31.0, 50.0), 100, 100).depth, Depth::Near);
        assert_eq!(describe(&bbox(0.0, 0.0, 9.0, 50.0), 100, 100).depth, Depth::Far);
    }

    #[test]
    fn zero_area_box_is_far() {
        assert_eq!(describe(&bbox(50.0, 50.0, 50.0, 80.0), 100, 100).depth, Depth::Far);
    }

    #[test]
    fn cup_example_is_center_mid_distance() {
        let d = describe(&bbox(100.0, 100.0, 200.0, 200.0), 300, 300);
        assert_eq!(d.horizontal, Horizontal::Center);
        assert_eq!(d.depth, Depth::MidDistance);
        assert_eq!(d.to_string(), "center mid-distance");
    }

    #[test]
    fn configured_split_moves_edges() {
        let t = SpatialThresholds::from_settings(&SpatialSettings {
            horizontal_split: 0.25,
            ..SpatialSettings::default()
        });
        assert_eq!(t.horizontal(24.0, 100.0), Horizontal::Left);
        assert_eq!(t.horizontal(25.0, 100.0), Horizontal::Center);
        assert_eq!(t.horizontal(75.0, 100.0), Horizontal::Center);
        assert_eq!(t.horizontal(76.0, 100.0), Horizontal::Right);
    }

    #[test]
    fn default_settings_match_default_thresholds() {
        let t = SpatialThresholds::from_settings(&SpatialSettings::default());
        assert_eq!(t, SpatialThresholds::default());
    }
}
