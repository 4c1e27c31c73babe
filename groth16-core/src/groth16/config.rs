use std::sync::Arc;

use crate::backend::BackendKind;
use crate::dag::Schedule;
use crate::transcripts::{FieldHasher, Sha3FieldHasher};

/// Per-call prover options.
#[derive(Clone, Debug)]
pub struct ProverConfig {
    pub backend: BackendKind,
    pub device_id: usize,
    /// Overrides the backend's default schedule.
    pub schedule: Option<Schedule>,
    pub hasher: Arc<dyn FieldHasher>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cpu,
            device_id: 0,
            schedule: None,
            hasher: Arc::new(Sha3FieldHasher),
        }
    }
}

impl ProverConfig {
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn FieldHasher>) -> Self {
        self.hasher = hasher;
        self
    }
}

#[derive(Clone, Debug)]
pub struct VerifierConfig {
    pub hasher: Arc<dyn FieldHasher>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            hasher: Arc::new(Sha3FieldHasher),
        }
    }
}

impl VerifierConfig {
    pub fn with_hasher(mut self, hasher: Arc<dyn FieldHasher>) -> Self {
        self.hasher = hasher;
        self
    }
}

impl From<&ProverConfig> for VerifierConfig {
    fn from(config: &ProverConfig) -> Self {
        Self {
            hasher: Arc::clone(&config.hasher),
        }
    }
}
