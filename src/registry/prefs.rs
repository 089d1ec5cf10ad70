//! Filter preferences
//!
//! One exclusion toggle per flag, all enabled by default. Preferences live
//! in the device-synchronized storage domain, separate from the registry,
//! so they follow the user across devices while records stay local.

use serde::{Deserialize, Serialize};

use super::record::Flag;

fn default_true() -> bool {
    true
}

/// User-configurable exclusion toggles, one per flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub exclude_watched: bool,
    #[serde(default = "default_true")]
    pub exclude_liked: bool,
    #[serde(default = "default_true")]
    pub exclude_listed: bool,
    #[serde(default = "default_true")]
    pub exclude_skipped: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            exclude_watched: true,
            exclude_liked: true,
            exclude_listed: true,
            exclude_skipped: true,
        }
    }
}

impl Preferences {
    /// Whether films with `flag` set should be excluded
    pub fn excludes(&self, flag: Flag) -> bool {
        match flag {
            Flag::Watched => self.exclude_watched,
            Flag::Liked => self.exclude_liked,
            Flag::Listed => self.exclude_listed,
            Flag::Skipped => self.exclude_skipped,
        }
    }

    /// Set the exclusion toggle for `flag`
    pub fn set_exclude(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Watched => self.exclude_watched = value,
            Flag::Liked => self.exclude_liked = value,
            Flag::Listed => self.exclude_listed = value,
            Flag::Skipped => self.exclude_skipped = value,
        }
    }
}
