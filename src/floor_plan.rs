//! Ready-made floor plans.

use crate::error::Result;
use crate::geometry::Point;
use crate::layout::{AccessPoint, LayoutBuilder, Rect};
use serde::{Deserialize, Serialize};

/// Wall rectangle of a given material, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WallSpec {
    pub material: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Physical wall thickness; the material's reference thickness if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
}

impl WallSpec {
    pub fn new(material: &str, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            material: material.to_string(),
            x,
            y,
            w,
            h,
            thickness: None,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn apply(&self, builder: &mut LayoutBuilder) -> Result<()> {
        builder.add_wall(&self.material, self.rect(), self.thickness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// No walls besides the configured ones.
    Empty,
    /// Meeting rooms, an open area and private offices behind concrete walls.
    #[default]
    Office,
}

const OUTER_WALL: f64 = 0.6;
const PARTITION: f64 = 0.3;
const DOOR_WIDTH: f64 = 2.0;
const WINDOW_WIDTH: f64 = 4.0;

/// Walls of `preset` for a floor of `width` x `height` meters.
pub fn preset_walls(preset: Preset, width: f64, height: f64) -> Vec<WallSpec> {
    match preset {
        Preset::Empty => Vec::new(),
        Preset::Office => office_walls(width, height),
    }
}

fn office_walls(width: f64, height: f64) -> Vec<WallSpec> {
    let mut walls = vec![
        WallSpec::new("concrete", 0.0, 0.0, OUTER_WALL, height),
        WallSpec::new("concrete", 0.0, height - OUTER_WALL, width, OUTER_WALL),
        WallSpec::new("concrete", width - OUTER_WALL, 0.0, OUTER_WALL, height),
        WallSpec::new("concrete", 0.0, 0.0, width, OUTER_WALL),
    ];

    // Four meeting rooms along one side.
    let room_width = width / 4.0 - OUTER_WALL;
    let room_height = height / 3.0;
    for i in 0..4 {
        let x = i as f64 * width / 4.0 + OUTER_WALL;
        if i < 3 {
            let divider_x = (i + 1) as f64 * width / 4.0;
            walls.push(WallSpec::new("drywall", divider_x, OUTER_WALL, PARTITION, room_height));
        }
        let centre = x + room_width / 2.0;
        walls.push(WallSpec::new(
            "glass",
            centre - WINDOW_WIDTH / 2.0,
            room_height - OUTER_WALL,
            WINDOW_WIDTH,
            OUTER_WALL,
        ));
        walls.push(WallSpec::new(
            "wood",
            centre - DOOR_WIDTH / 2.0,
            room_height + PARTITION,
            DOOR_WIDTH,
            PARTITION,
        ));
    }

    // Open area between two partitions.
    walls.push(WallSpec::new("drywall", 0.0, room_height, width, PARTITION));
    walls.push(WallSpec::new("drywall", 0.0, 2.0 * room_height, width, PARTITION));

    // Five private offices along the other side.
    let office_width = width / 5.0 - OUTER_WALL;
    for i in 0..5 {
        let x = i as f64 * width / 5.0 + OUTER_WALL;
        if i < 4 {
            let divider_x = (i + 1) as f64 * width / 5.0;
            walls.push(WallSpec::new(
                "drywall",
                divider_x,
                2.0 * room_height,
                PARTITION,
                room_height - OUTER_WALL,
            ));
        }
        walls.push(WallSpec::new(
            "wood",
            x + office_width / 2.0 - DOOR_WIDTH / 2.0,
            2.0 * room_height - PARTITION,
            DOOR_WIDTH,
            PARTITION,
        ));
    }

    walls
}

/// Four access points at (10, 10), (40, 10), (10, 20) and (40, 20) on a
/// 50 x 30 m floor, scaled to the actual extent.
pub fn default_access_points(width: f64, height: f64) -> Vec<AccessPoint> {
    let sx = width / 50.0;
    let sy = height / 30.0;
    [(10.0, 10.0), (40.0, 10.0), (10.0, 20.0), (40.0, 20.0)]
        .into_iter()
        .enumerate()
        .map(|(i, (x, y))| {
            AccessPoint::new(&format!("AP{}", i + 1), Point::new(x * sx, y * sy))
                .with_channel(1 + 5 * i as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialCatalog;
    use std::sync::Arc;

    #[test]
    fn office_preset_builds() {
        let catalog = Arc::new(MaterialCatalog::standard());
        let mut builder = LayoutBuilder::new(50.0, 30.0, 0.1, catalog).unwrap();
        let walls = preset_walls(Preset::Office, 50.0, 30.0);
        assert_eq!(walls.len(), 4 + 3 + 8 + 2 + 4 + 5);
        for wall in &walls {
            wall.apply(&mut builder).unwrap();
        }
        for ap in default_access_points(50.0, 30.0) {
            builder.add_access_point(ap).unwrap();
        }
        let layout = builder.build();

        assert!(!layout.occupants(0, 150).is_empty());
        assert!(!layout.occupants(250, 299).is_empty());
        assert!(layout.occupants(250, 150).is_empty());
        let channels: Vec<_> = layout.access_points().iter().map(|ap| ap.channel).collect();
        assert_eq!(channels, vec![Some(1), Some(6), Some(11), Some(16)]);
    }

    #[test]
    fn access_points_scale_with_extent() {
        let aps = default_access_points(25.0, 15.0);
        assert_eq!(aps[3].position, Point::new(20.0, 10.0));
        assert!(preset_walls(Preset::Empty, 25.0, 15.0).is_empty());
    }
}
