//! Load-once settings access.
//!
//! Code that can take a `Settings` argument should do so. The process-wide cache
//! exists for scripts and tests that need a single shared snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::{
    config::{EnvSource, ProcessEnv, Settings},
    error::ConfigError,
};

/// Loads settings from `source` on first use and keeps the snapshot until
/// [`SettingsCache::reset`] is called. Failed loads are not cached.
#[derive(Debug)]
pub struct SettingsCache<S> {
    source: S,
    slot: RwLock<Option<Arc<Settings>>>,
}

impl<S: EnvSource> SettingsCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Result<Arc<Settings>, ConfigError> {
        if let Some(settings) = self.read_slot() {
            return Ok(settings);
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the slot while we waited for the lock.
        if let Some(settings) = slot.as_ref() {
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(Settings::from_source(&self.source)?);
        debug!(?settings, "settings loaded");
        *slot = Some(Arc::clone(&settings));
        Ok(settings)
    }

    pub fn reset(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn read_slot(&self) -> Option<Arc<Settings>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
    }
}

static SETTINGS: Lazy<SettingsCache<ProcessEnv>> = Lazy::new(|| SettingsCache::new(ProcessEnv));

pub fn get_settings() -> Result<Arc<Settings>, ConfigError> {
    SETTINGS.get()
}

/// Forgets the process-wide snapshot. Intended for tests that change the
/// environment between cases.
pub fn reset_settings() {
    SETTINGS.reset();
}
