use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Tab redirection seam. The host environment (popup shell, extension
/// bridge) supplies the implementation that actually swaps a tab's URL; the
/// gatekeeper only decides where it should go.
pub trait TabNavigator: Send + Sync {
    fn navigate(&self, tab_id: u64, url: &str) -> Result<(), InfraError>;
}

/// Default wiring for hosts that consume the advisory response instead of
/// pushing navigation from the backend.
#[derive(Debug, Default)]
pub struct NullTabNavigator;

impl TabNavigator for NullTabNavigator {
    fn navigate(&self, _tab_id: u64, _url: &str) -> Result<(), InfraError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingTabNavigator {
    navigations: Mutex<Vec<(u64, String)>>,
}

impl RecordingTabNavigator {
    pub fn navigations(&self) -> Vec<(u64, String)> {
        self.navigations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl TabNavigator for RecordingTabNavigator {
    fn navigate(&self, tab_id: u64, url: &str) -> Result<(), InfraError> {
        let mut guard = self.navigations.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("navigator lock poisoned: {error}"))
        })?;
        guard.push((tab_id, url.to_string()));
        Ok(())
    }
}
