use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),

    #[error("Source parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing source: {path}")]
    MissingSource { path: String },

    #[error("Source '{table}' is missing required column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
