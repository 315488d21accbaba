//! Process-scoped cache of loaded speech pipelines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::asr::{AsrError, LoadProgress, PipelineHandle, PipelineLoader};

type Slot = Arc<Mutex<Option<Arc<PipelineHandle>>>>;

/// Holds at most one pipeline per model id for the lifetime of the worker.
///
/// Each model id gets its own slot lock, so a caller arriving while a load is
/// in progress waits for that load instead of starting another one. A failed
/// load leaves the slot empty.
pub struct ModelCache {
    loader: Box<dyn PipelineLoader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ModelCache {
    pub fn new(loader: Box<dyn PipelineLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        let slot = match self.slots.lock() {
            Ok(slots) => slots.get(model_id).cloned(),
            Err(_) => return false,
        };
        slot.and_then(|slot| slot.try_lock().ok().map(|guard| guard.is_some()))
            .unwrap_or(false)
    }

    pub fn get_or_load(
        &self,
        model_id: &str,
        on_progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Arc<PipelineHandle>, AsrError> {
        let slot = {
            let mut slots = self.slots.lock().map_err(|_| AsrError::Busy)?;
            Arc::clone(slots.entry(model_id.to_string()).or_default())
        };

        let mut guard = slot.lock().map_err(|_| AsrError::Busy)?;
        if let Some(handle) = guard.as_ref() {
            log::debug!("Reusing loaded pipeline for {model_id}");
            return Ok(Arc::clone(handle));
        }

        let start = Instant::now();
        log::info!("Loading pipeline for {model_id}");
        let handle = match self.loader.load(model_id, on_progress) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("Failed to load pipeline for {model_id}: {err}");
                drop(guard);
                self.release_empty_slot(model_id, &slot);
                return Err(err);
            }
        };
        log::info!("Pipeline for {model_id} ready in {:?}", start.elapsed());

        let handle = Arc::new(handle);
        *guard = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Drops the slot of a failed load unless another caller is waiting on it,
    /// so unknown or unloadable ids do not accumulate.
    fn release_empty_slot(&self, model_id: &str, slot: &Slot) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let idle = slots
            .get(model_id)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(held) == 2);
        if idle {
            slots.remove(model_id);
        }
    }
}
