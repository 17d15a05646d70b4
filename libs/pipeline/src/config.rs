use serde::Deserialize;

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Pipeline Config
// ═══════════════════════════════════════════════════════════════

/// Параметры одного запуска миграции. Передаются в `Migration::new`,
/// глобальных констант нет.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Число параллельных writer'ов (N).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Ёмкость очереди reader → workers (K). Влияет только на память
    /// и пропускную способность, не на корректность.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Логировать прогресс каждые N прочитанных записей (0 = не логировать).
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            progress_every: default_progress_every(),
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    /// Validate: хотя бы один worker и ненулевая очередь.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    10
}
fn default_queue_capacity() -> usize {
    100
}
fn default_progress_every() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_toml() {
        let cfg: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.progress_every, 5000);
    }

    #[test]
    fn partial_toml_overrides() {
        let cfg: PipelineConfig = toml::from_str("workers = 4\nqueue_capacity = 16").unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.queue_capacity, 16);
        assert_eq!(cfg.progress_every, 5000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero() {
        let err = PipelineConfig::default().with_workers(0).validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
        let err = PipelineConfig::default().with_queue_capacity(0).validate().unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }
}
