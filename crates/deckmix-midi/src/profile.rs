//! Controller mapping profiles
//!
//! A profile is the editable, persisted form of a mapping set: a list of
//! records pairing a physical control with a parameter path such as
//! `channel.1.fader`. [`MappingProfile::compile`] resolves the paths once
//! into the [`MappingTable`] the engine swaps in.
//!
//! ```yaml
//! name: DDJ-400
//! controller: pioneer_ddj
//! mappings:
//!   - controller_id: 1
//!     control: { type: ControlChange, channel: 0, cc: 19 }
//!     target: channel.1.fader
//!     transform: linear
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use deckmix_core::config::{default_profile_dir, load_config_strict, save_config};
use deckmix_core::control::{ControlKey, ControlNumber, MappingEntry, MappingTable, ParameterTarget, Transform};
use deckmix_core::MappingError;
use serde::{Deserialize, Serialize};

/// One control → parameter binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub controller_id: u16,
    pub control: ControlNumber,
    /// Parameter path, e.g. `mixer.crossfader` or `effect.master.mix`
    pub target: String,
    #[serde(default)]
    pub transform: Transform,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingProfile {
    pub name: String,
    /// Controller family id this profile was made for (see `detect_controller`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    pub mappings: Vec<MappingRecord>,
}

impl MappingProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Bind a control, replacing any existing binding of the same control
    ///
    /// The path is parsed here so typos surface at edit time; channel range
    /// is checked by [`compile`](Self::compile), which knows the channel count.
    pub fn map_control(
        &mut self,
        controller_id: u16,
        control: ControlNumber,
        target: &str,
        transform: Transform,
    ) -> Result<(), MappingError> {
        ParameterTarget::parse(target)?;

        let record = MappingRecord {
            controller_id,
            control,
            target: target.to_string(),
            transform,
        };
        match self
            .mappings
            .iter_mut()
            .find(|r| r.controller_id == controller_id && r.control == control)
        {
            Some(existing) => *existing = record,
            None => self.mappings.push(record),
        }
        log::info!("profile: mapped {} on controller {} to {}", control, controller_id, target);
        Ok(())
    }

    /// Drop a binding; returns whether one existed
    pub fn unmap_control(&mut self, controller_id: u16, control: ControlNumber) -> bool {
        let before = self.mappings.len();
        self.mappings
            .retain(|r| !(r.controller_id == controller_id && r.control == control));
        self.mappings.len() != before
    }

    /// Resolve every record for a mixer with `channel_count` channels
    pub fn compile(&self, channel_count: usize) -> Result<MappingTable, MappingError> {
        let mut table = MappingTable::new();
        for record in &self.mappings {
            let target = ParameterTarget::parse(&record.target)?;
            table.insert(
                ControlKey {
                    controller: record.controller_id,
                    control: record.control,
                },
                MappingEntry {
                    target,
                    transform: record.transform,
                },
                channel_count,
            )?;
        }
        log::debug!("profile: compiled '{}' ({} mappings)", self.name, table.len());
        Ok(table)
    }
}

/// Default location of a named profile
pub fn default_profile_path(name: &str) -> PathBuf {
    default_profile_dir().join(format!("{}.yaml", name))
}

/// Load a profile, failing on a missing or malformed file
pub fn load_profile(path: &Path) -> Result<MappingProfile> {
    let profile: MappingProfile = load_config_strict(path)?;
    log::info!(
        "profile: loaded '{}' from {:?} ({} mappings)",
        profile.name,
        path,
        profile.mappings.len()
    );
    Ok(profile)
}

/// Save a profile, creating parent directories
pub fn save_profile(profile: &MappingProfile, path: &Path) -> Result<()> {
    save_config(profile, path)
}
