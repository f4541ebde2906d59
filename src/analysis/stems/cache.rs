//! Process-wide registry of loaded separation models
//!
//! Models are expensive to load and safe to share, so one instance per
//! (model name, device) key lives for the process lifetime. First-time
//! initialization is serialized per key; unrelated keys never block each
//! other. A model's device binding is fixed by its key and never mutated
//! after loading, so concurrent requests for different devices each get
//! their own instance.

use crate::error::{Result, TracklabError};
use crate::types::Device;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

/// Cache key: model variant plus the device it is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub name: String,
    pub device: Device,
}

/// One cache entry; its lock serializes the first load for this key
struct Slot<M> {
    state: Mutex<Option<Arc<M>>>,
}

impl<M> Slot<M> {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

/// Keyed cache of loaded model instances
pub struct ModelCache<M> {
    slots: Mutex<HashMap<ModelKey, Arc<Slot<M>>>>,
}

impl<M> ModelCache<M> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the cached instance for `key`, loading it with `load` on first
    /// access
    ///
    /// Concurrent callers for the same key wait on one load; callers for
    /// other keys proceed independently. A failed load leaves the slot
    /// empty so a later call can retry.
    pub fn get_or_load<F>(&self, key: &ModelKey, load: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Result<M>,
    {
        let slot = {
            let mut slots = self.slots.lock().map_err(|_| TracklabError::ModelLoadError {
                reason: "model cache lock poisoned".to_string(),
            })?;
            Arc::clone(
                slots
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Slot::new())),
            )
        };

        let mut state = slot.state.lock().map_err(|_| TracklabError::ModelLoadError {
            reason: "model cache slot lock poisoned".to_string(),
        })?;

        if let Some(model) = state.as_ref() {
            debug!("model cache hit for {} on {}", key.name, key.device);
            return Ok(Arc::clone(model));
        }

        info!("loading model {} on {}", key.name, key.device);
        let model = Arc::new(load()?);
        *state = Some(Arc::clone(&model));
        Ok(model)
    }
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide separation model registry
pub fn separation_models() -> &'static ModelCache<super::model::SeparationModel> {
    static CACHE: OnceLock<ModelCache<super::model::SeparationModel>> = OnceLock::new();
    CACHE.get_or_init(ModelCache::new)
}
