use std::path::PathBuf;

use super::BackendKind;
use crate::utils::errors::{ContextError, ProveError};

pub const BACKEND_INSTALL_DIR_ENV: &str = "ICICLE_BACKEND_INSTALL_DIR";
pub const DEVICE_ID_ENV: &str = "GROTH16_DEVICE_ID";
pub const BACKEND_ENV: &str = "GROTH16_BACKEND";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceleratorConfig {
    pub kind: BackendKind,
    /// Directory holding the accelerator's device plugins. `None` defers to the
    /// backend's own discovery.
    pub install_dir: Option<PathBuf>,
    pub device_id: usize,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Cpu,
            install_dir: None,
            device_id: 0,
        }
    }
}

impl AcceleratorConfig {
    pub fn cpu() -> Self {
        Self::default()
    }

    pub fn icicle() -> Self {
        Self {
            kind: BackendKind::Icicle,
            ..Self::default()
        }
    }

    /// Reads `GROTH16_BACKEND` (`cpu` | `icicle`), `ICICLE_BACKEND_INSTALL_DIR` and
    /// `GROTH16_DEVICE_ID`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ContextError> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(BACKEND_ENV) {
            config.kind = match value.to_ascii_lowercase().as_str() {
                "cpu" => BackendKind::Cpu,
                "icicle" => BackendKind::Icicle,
                _ => {
                    return Err(ContextError::InvalidEnv {
                        var: BACKEND_ENV,
                        value,
                    })
                }
            };
        }
        if let Ok(dir) = std::env::var(BACKEND_INSTALL_DIR_ENV) {
            config.install_dir = Some(PathBuf::from(dir));
        }
        if let Ok(value) = std::env::var(DEVICE_ID_ENV) {
            config.device_id = value.parse().map_err(|_| ContextError::InvalidEnv {
                var: DEVICE_ID_ENV,
                value,
            })?;
        }
        Ok(config)
    }
}

/// Process-wide handle on an initialized backend. Passed by reference into setup and
/// prove; the accelerator library behind it is loaded at most once per process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceleratorContext {
    kind: BackendKind,
    device_count: usize,
    install_dir: Option<PathBuf>,
}

impl AcceleratorContext {
    pub fn cpu() -> Self {
        Self {
            kind: BackendKind::Cpu,
            device_count: 1,
            install_dir: None,
        }
    }

    /// A context that claims `device_count` devices of `kind` without loading anything.
    #[cfg(test)]
    pub(crate) fn detached(kind: BackendKind, device_count: usize) -> Self {
        Self {
            kind,
            device_count,
            install_dir: None,
        }
    }

    #[tracing::instrument(skip_all, name = "AcceleratorContext::init")]
    pub fn init(config: &AcceleratorConfig) -> Result<Self, ContextError> {
        let context = match config.kind {
            BackendKind::Cpu => Self::cpu(),
            BackendKind::Icicle => Self::init_icicle(config)?,
        };
        tracing::info!(
            backend = %context.kind,
            devices = context.device_count,
            "accelerator context ready"
        );
        Ok(context)
    }

    /// Like [`Self::init`], but logs the failure and terminates the process. For
    /// binaries that cannot do anything useful without their configured backend.
    pub fn init_or_exit(config: &AcceleratorConfig) -> Self {
        match Self::init(config) {
            Ok(context) => context,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        }
    }

    #[cfg(feature = "icicle")]
    fn init_icicle(config: &AcceleratorConfig) -> Result<Self, ContextError> {
        let device_count = super::icicle::load_backend_once(config.install_dir.as_deref())?;
        Ok(Self {
            kind: BackendKind::Icicle,
            device_count,
            install_dir: config.install_dir.clone(),
        })
    }

    #[cfg(not(feature = "icicle"))]
    fn init_icicle(_config: &AcceleratorConfig) -> Result<Self, ContextError> {
        Err(ContextError::FeatureDisabled(BackendKind::Icicle))
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn install_dir(&self) -> Option<&std::path::Path> {
        self.install_dir.as_deref()
    }

    /// Rejects a backend/device selection this context cannot serve. A CPU request is
    /// always servable.
    pub fn check_selection(&self, kind: BackendKind, device_id: usize) -> Result<(), ProveError> {
        match kind {
            BackendKind::Cpu if device_id == 0 => Ok(()),
            BackendKind::Cpu => Err(ProveError::Configuration(format!(
                "cpu backend has a single device, got device id {device_id}"
            ))),
            BackendKind::Icicle if self.kind != BackendKind::Icicle => {
                Err(ProveError::Configuration(
                    "icicle backend requested but the context was initialized for cpu".to_string(),
                ))
            }
            BackendKind::Icicle if device_id >= self.device_count => {
                Err(ProveError::Configuration(format!(
                    "device id {device_id} out of range, {} device(s) available",
                    self.device_count
                )))
            }
            BackendKind::Icicle => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn cpu_context_accepts_only_device_zero() {
        let context = AcceleratorContext::init(&AcceleratorConfig::cpu()).unwrap();
        assert_eq!(context.kind(), BackendKind::Cpu);
        assert_eq!(context.device_count(), 1);
        assert!(context.check_selection(BackendKind::Cpu, 0).is_ok());
        assert!(matches!(
            context.check_selection(BackendKind::Cpu, 1),
            Err(ProveError::Configuration(_))
        ));
        assert!(matches!(
            context.check_selection(BackendKind::Icicle, 0),
            Err(ProveError::Configuration(_))
        ));
    }

    #[cfg(not(feature = "icicle"))]
    #[test]
    fn icicle_requires_feature() {
        assert_eq!(
            AcceleratorContext::init(&AcceleratorConfig::icicle()),
            Err(ContextError::FeatureDisabled(BackendKind::Icicle))
        );
    }

    #[test]
    #[serial]
    fn config_from_env() {
        std::env::set_var(BACKEND_ENV, "icicle");
        std::env::set_var(DEVICE_ID_ENV, "3");
        std::env::set_var(BACKEND_INSTALL_DIR_ENV, "/opt/icicle/backend");
        let config = AcceleratorConfig::from_env().unwrap();
        assert_eq!(config.kind, BackendKind::Icicle);
        assert_eq!(config.device_id, 3);
        assert_eq!(config.install_dir, Some(PathBuf::from("/opt/icicle/backend")));

        std::env::set_var(DEVICE_ID_ENV, "gpu0");
        assert!(matches!(
            AcceleratorConfig::from_env(),
            Err(ContextError::InvalidEnv { var: DEVICE_ID_ENV, .. })
        ));

        std::env::remove_var(BACKEND_ENV);
        std::env::remove_var(DEVICE_ID_ENV);
        std::env::remove_var(BACKEND_INSTALL_DIR_ENV);
        assert_eq!(AcceleratorConfig::from_env().unwrap(), AcceleratorConfig::default());
    }
}
