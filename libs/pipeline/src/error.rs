use ferry_api::FerryError;

/// Ошибки, прерывающие запуск целиком. Поштучные сбои (decode, read,
/// write) сюда не попадают — они логируются и считаются в `RunReport`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(String),

    #[error("connect {side} ({name}): {source}")]
    Connect { side: &'static str, name: String, source: FerryError },

    #[error("setup ({stage}): {source}")]
    Setup { stage: &'static str, source: FerryError },
}
