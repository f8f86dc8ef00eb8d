use std::path::PathBuf;

use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] stockscope_core::ValidationError),

    #[error(transparent)]
    Analysis(#[from] stockscope_analysis::AnalysisError),

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("invalid config '{path}': {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Persistence(#[from] stockscope_core::PersistenceError),

    #[error(transparent)]
    Warehouse(#[from] stockscope_warehouse::WarehouseError),

    #[error(transparent)]
    CsvImport(#[from] stockscope_core::CsvImportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Analysis(_) | Self::Command(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Config { .. }
            | Self::Persistence(_)
            | Self::Warehouse(_)
            | Self::CsvImport(_)
            | Self::Io(_) => 10,
        }
    }
}
