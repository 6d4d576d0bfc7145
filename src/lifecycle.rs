// src/lifecycle.rs

use std::process::Command;
use std::sync::Mutex;
use tracing::{error, info};

type Hook = Box<dyn FnOnce() + Send>;

/// Owns the shutdown hook for the local model. The hook runs at most once,
/// on an explicit [`shutdown`](Self::shutdown) or, failing that, on drop.
pub struct ModelLifecycle {
    hook: Mutex<Option<Hook>>,
}

impl ModelLifecycle {
    pub fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            hook: Mutex::new(Some(Box::new(hook))),
        }
    }

    /// Lifecycle with nothing to do at shutdown.
    pub fn disabled() -> Self {
        Self {
            hook: Mutex::new(None),
        }
    }

    /// Stop `model` with the `ollama` CLI at shutdown.
    pub fn for_ollama(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(move || stop_ollama_model(&model))
    }

    pub fn shutdown(&self) {
        let hook = match self.hook.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Drop for ModelLifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fire-and-forget `ollama stop <model>`; failures are only logged.
pub fn stop_ollama_model(model: &str) {
    match Command::new("ollama").args(["stop", model]).status() {
        Ok(status) if status.success() => info!(model = %model, "Ollama model stopped on exit"),
        Ok(status) => error!(model = %model, %status, "ollama stop exited with failure"),
        Err(e) => error!(model = %model, error = %e, "Error stopping Ollama"),
    }
}
