use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Structured cache key: hostname and the ordered task list, kept as separate
/// fields so `["a", "b"]` and `["ab"]` can never collide the way joined
/// string keys would.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClassificationKey {
    hostname: String,
    tasks: Vec<String>,
}

impl ClassificationKey {
    fn new(hostname: &str, tasks: &[String]) -> Option<Self> {
        let hostname = hostname.trim().to_ascii_lowercase();
        if hostname.is_empty() {
            return None;
        }
        Some(Self {
            hostname,
            tasks: tasks.to_vec(),
        })
    }
}

pub trait ClassificationCache: Send + Sync {
    fn lookup(&self, hostname: &str, tasks: &[String]) -> Result<Option<bool>, InfraError>;
    fn store(&self, hostname: &str, tasks: &[String], verdict: bool) -> Result<(), InfraError>;
    fn invalidate_all(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryClassificationCache {
    verdicts: Mutex<HashMap<ClassificationKey, bool>>,
}

impl ClassificationCache for InMemoryClassificationCache {
    fn lookup(&self, hostname: &str, tasks: &[String]) -> Result<Option<bool>, InfraError> {
        let Some(key) = ClassificationKey::new(hostname, tasks) else {
            return Ok(None);
        };
        let verdicts = self.verdicts.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("classification cache lock poisoned: {error}"))
        })?;
        Ok(verdicts.get(&key).copied())
    }

    fn store(&self, hostname: &str, tasks: &[String], verdict: bool) -> Result<(), InfraError> {
        let Some(key) = ClassificationKey::new(hostname, tasks) else {
            return Ok(());
        };
        let mut verdicts = self.verdicts.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("classification cache lock poisoned: {error}"))
        })?;
        verdicts.insert(key, verdict);
        Ok(())
    }

    fn invalidate_all(&self) -> Result<(), InfraError> {
        let mut verdicts = self.verdicts.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("classification cache lock poisoned: {error}"))
        })?;
        verdicts.clear();
        Ok(())
    }
}
