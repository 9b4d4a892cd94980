//! Layout Calculation Engine
//!
//! Places monitors relative to the primary by walking its neighbour chains,
//! and derives the screen size needed to contain them.
//!
//! The primary sits at the origin of a cross:
//!
//! ```text
//!              ┌────┐
//!              │top │
//!   ┌────┬────┬┴────┴┬─────┐
//!   │ L2 │ L1 │  P   │ R1  │
//!   └────┴────┴┬────┬┴─────┘
//!              │bot │
//!              └────┘
//! ```
//!
//! Monitors on the left chain stack leftward from the primary's left edge,
//! right-chain monitors stack rightward from its right edge, and the vertical
//! chains work the same way along the y axis. The primary's own position is
//! chosen so the leftmost and topmost monitors land on zero.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{Direction, Monitor, MonitorId, Point};
use crate::display::{ModeId, ModeInfo, ScreenSize};

/// Extents of a layout along both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenLimits {
    /// Sum of widths along left chain, primary and right chain
    pub x_axis_width: u32,
    /// Tallest monitor on the horizontal axis
    pub x_axis_max_height: u32,
    /// Sum of heights along top chain, primary and bottom chain
    pub y_axis_height: u32,
    /// Widest monitor on the vertical axis
    pub y_axis_max_width: u32,
    /// `x_axis_width` in millimetres
    pub x_axis_width_mm: u32,
    /// `x_axis_max_height` in millimetres
    pub x_axis_max_height_mm: u32,
    /// `y_axis_height` in millimetres
    pub y_axis_height_mm: u32,
    /// `y_axis_max_width` in millimetres
    pub y_axis_max_width_mm: u32,
}

impl ScreenLimits {
    /// Smallest screen that contains every monitor
    pub fn screen_size(&self) -> ScreenSize {
        ScreenSize {
            width: self.x_axis_width.max(self.y_axis_max_width),
            height: self.y_axis_height.max(self.x_axis_max_height),
            mm_width: self.x_axis_width_mm.max(self.y_axis_max_width_mm),
            mm_height: self.y_axis_height_mm.max(self.x_axis_max_height_mm),
        }
    }
}

/// Monitors reachable from `start` by repeatedly following `direction`
///
/// `start` itself is not included. A walk that revisits a monitor stops
/// there with a warning instead of looping.
pub fn chain(monitors: &[Monitor], start: MonitorId, direction: Direction) -> Vec<MonitorId> {
    let mut visited = HashSet::from([start]);
    let mut members = Vec::new();
    let mut current = monitors.get(start.0).and_then(|m| m.neighbor(direction));

    while let Some(id) = current {
        let Some(monitor) = monitors.get(id.0) else {
            warn!("{:?} chain from {} points at missing {}", direction, start, id);
            break;
        };
        if !visited.insert(id) {
            warn!("{:?} chain from {} loops back to {}", direction, start, id);
            break;
        }
        members.push(id);
        current = monitor.neighbor(direction);
    }

    members
}

fn width(monitors: &[Monitor], id: MonitorId) -> u32 {
    monitors[id.0].normalized_size().0
}

fn height(monitors: &[Monitor], id: MonitorId) -> u32 {
    monitors[id.0].normalized_size().1
}

/// Measure the layout around `primary`
pub fn calculate_limits(monitors: &[Monitor], primary: MonitorId) -> ScreenLimits {
    let mut horizontal = chain(monitors, primary, Direction::Left);
    horizontal.push(primary);
    horizontal.extend(chain(monitors, primary, Direction::Right));

    let mut vertical = chain(monitors, primary, Direction::Top);
    vertical.push(primary);
    vertical.extend(chain(monitors, primary, Direction::Bottom));

    let mut limits = ScreenLimits::default();
    for &id in &horizontal {
        let (w, h) = monitors[id.0].normalized_size();
        let (w_mm, h_mm) = monitors[id.0].normalized_size_mm();
        limits.x_axis_width += w;
        limits.x_axis_max_height = limits.x_axis_max_height.max(h);
        limits.x_axis_width_mm += w_mm;
        limits.x_axis_max_height_mm = limits.x_axis_max_height_mm.max(h_mm);
    }
    for &id in &vertical {
        let (w, h) = monitors[id.0].normalized_size();
        let (w_mm, h_mm) = monitors[id.0].normalized_size_mm();
        limits.y_axis_height += h;
        limits.y_axis_max_width = limits.y_axis_max_width.max(w);
        limits.y_axis_height_mm += h_mm;
        limits.y_axis_max_width_mm = limits.y_axis_max_width_mm.max(w_mm);
    }

    debug!("Layout limits: {:?}", limits);
    limits
}

/// Position every monitor in the primary's cross
///
/// Mirrors of positioned monitors are moved onto their source. Returns the
/// primary's position.
pub fn calculate_relative_positions(monitors: &mut [Monitor], primary: MonitorId) -> Point {
    let left = chain(monitors, primary, Direction::Left);
    let right = chain(monitors, primary, Direction::Right);
    let top = chain(monitors, primary, Direction::Top);
    let bottom = chain(monitors, primary, Direction::Bottom);

    let root = Point::new(
        left.iter().map(|&id| width(monitors, id)).sum::<u32>() as i32,
        top.iter().map(|&id| height(monitors, id)).sum::<u32>() as i32,
    );
    monitors[primary.0].set_position(root);

    let mut x = root.x;
    for &id in &left {
        x -= width(monitors, id) as i32;
        monitors[id.0].set_position(Point::new(x, root.y));
    }

    let mut x = root.x + width(monitors, primary) as i32;
    for &id in &right {
        monitors[id.0].set_position(Point::new(x, root.y));
        x += width(monitors, id) as i32;
    }

    let mut y = root.y;
    for &id in &top {
        y -= height(monitors, id) as i32;
        monitors[id.0].set_position(Point::new(root.x, y));
    }

    let mut y = root.y + height(monitors, primary) as i32;
    for &id in &bottom {
        monitors[id.0].set_position(Point::new(root.x, y));
        y += height(monitors, id) as i32;
    }

    let placed = std::iter::once(primary).chain(left).chain(right).chain(top).chain(bottom);
    for id in placed {
        let source = &monitors[id.0];
        if let (Some(target), Some(position)) = (source.mirror(), source.position()) {
            if let Some(mirror) = monitors.get_mut(target.0) {
                if mirror.controller().is_some() {
                    mirror.set_position(position);
                }
            }
        }
    }

    debug!("Primary placed at {}", root);
    root
}

/// First mode, in screen enumeration order, both monitors support
pub fn find_common_output_mode<'a>(
    modes: impl IntoIterator<Item = &'a ModeInfo>,
    a: &Monitor,
    b: &Monitor,
) -> Option<ModeId> {
    modes
        .into_iter()
        .map(|m| m.id)
        .find(|&id| a.is_output_mode_supported(id) && b.is_output_mode_supported(id))
}
