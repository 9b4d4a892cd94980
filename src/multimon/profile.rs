//! Stored compass layouts
//!
//! A [`LayoutProfile`] names a primary output and the outputs placed on each
//! of its sides. Profiles are kept in the INI settings store under a
//! `[Layout]` section:
//!
//! ```text
//! [Layout]
//! primary=LVDS-1
//! right=DP-2
//! rotate=0
//! ```

use tracing::{debug, info};

use super::{ConfigurationManager, Direction, MonitorId, MultiMonitorError, Result};
use crate::display::Rotation;
use crate::ini::{Ini, IniSection};

/// A primary output with one optional neighbour per side and a mirror
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutProfile {
    /// Interface name of the primary output
    pub primary: String,
    /// Output left of the primary
    pub left: Option<String>,
    /// Output right of the primary
    pub right: Option<String>,
    /// Output above the primary
    pub top: Option<String>,
    /// Output below the primary
    pub bottom: Option<String>,
    /// Output showing the same content as the primary
    pub mirror: Option<String>,
    /// Rotation of the primary
    pub rotation: Rotation,
}

impl LayoutProfile {
    /// INI section holding a profile
    pub const SECTION: &'static str = "Layout";

    /// Profile with `primary` alone
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Self::default()
        }
    }

    fn neighbors(&self) -> [(Direction, Option<&str>); 4] {
        [
            (Direction::Left, self.left.as_deref()),
            (Direction::Right, self.right.as_deref()),
            (Direction::Top, self.top.as_deref()),
            (Direction::Bottom, self.bottom.as_deref()),
        ]
    }

    fn key(direction: Direction) -> &'static str {
        match direction {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Top => "top",
            Direction::Bottom => "bottom",
        }
    }

    /// Read the first `[Layout]` section of `ini`
    pub fn from_ini(ini: &Ini) -> Result<Self> {
        let section = ini.section(Self::SECTION).ok_or_else(|| {
            MultiMonitorError::InvalidProfile(format!("no [{}] section", Self::SECTION))
        })?;

        let primary = section
            .get_string("primary")
            .ok_or_else(|| MultiMonitorError::InvalidProfile("missing primary".to_string()))?;

        let rotation = match section.get_string("rotate") {
            None => Rotation::Normal,
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .and_then(Rotation::from_degrees)
                .ok_or_else(|| {
                    MultiMonitorError::InvalidProfile(format!("invalid rotation {raw:?}"))
                })?,
        };

        let get = |key: &str| section.get_string(key).map(str::to_string);
        Ok(Self {
            primary: primary.to_string(),
            left: get("left"),
            right: get("right"),
            top: get("top"),
            bottom: get("bottom"),
            mirror: get("mirror"),
            rotation,
        })
    }

    /// Render the profile as an INI document
    pub fn to_ini(&self) -> Result<Ini> {
        let mut section = IniSection::new(Self::SECTION)?;
        section.set_string("primary", &self.primary)?;
        for (direction, name) in self.neighbors() {
            if let Some(name) = name {
                section.set_string(Self::key(direction), name)?;
            }
        }
        if let Some(mirror) = &self.mirror {
            section.set_string("mirror", mirror)?;
        }
        section.set_int("rotate", i32::from(self.rotation.degrees()))?;

        let mut ini = Ini::new();
        ini.add_section(section);
        Ok(ini)
    }

    /// Build the layout on `manager`
    ///
    /// Every named output is given a controller and its preferred mode, the
    /// primary is rotated and linked to its neighbours, and the mirror (if
    /// any) is set up. Outputs not named are left untouched. Nothing is sent
    /// to the server until [`ConfigurationManager::commit`].
    ///
    /// # Returns
    ///
    /// The primary monitor
    ///
    /// # Errors
    ///
    /// Returns error if an output is unknown, no controller is free for it,
    /// or the mirror shares no mode with the primary
    pub fn apply(&self, manager: &mut ConfigurationManager) -> Result<MonitorId> {
        let primary = self.enable(manager, &self.primary)?;
        manager.set_primary(primary)?;
        manager.set_rotation(primary, self.rotation)?;

        for (direction, name) in self.neighbors() {
            if let Some(name) = name {
                let neighbor = self.enable(manager, name)?;
                manager.set_neighbor(primary, direction, Some(neighbor))?;
            }
        }

        if let Some(name) = &self.mirror {
            let mirror = self.enable(manager, name)?;
            manager.set_mirror(primary, Some(mirror))?;
        }

        info!("Applied layout profile around {}", self.primary);
        Ok(primary)
    }

    fn enable(&self, manager: &mut ConfigurationManager, name: &str) -> Result<MonitorId> {
        let id = manager.monitor_by_name(name)?;
        if !manager.reconfigure(id)? {
            return Err(MultiMonitorError::NoController(name.to_string()));
        }
        if let Some(mode) = manager.monitor(id)?.preferred_output_mode() {
            manager.set_output_mode(id, mode)?;
            debug!("{} uses preferred {}", name, mode);
        }
        Ok(id)
    }
}
