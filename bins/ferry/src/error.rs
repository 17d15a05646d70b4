#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Endpoint(#[from] ferry_api::FerryError),

    #[error("{0}")]
    Pipeline(#[from] ferry_pipeline::PipelineError),
}
