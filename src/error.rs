//! Error types for the calculator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalcError {
    #[error("Unknown artefact: {0}")]
    UnknownArtefact(String),

    #[error("Not enough materials to craft {artefact}: {}", format_shortfall(.missing))]
    InsufficientMaterials {
        artefact: String,
        missing: Vec<(String, u64)>,
    },

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("No {file} found under {dir}")]
    DatasetNotFound { file: &'static str, dir: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn format_shortfall(missing: &[(String, u64)]) -> String {
    missing
        .iter()
        .map(|(name, qty)| format!("{} more {}", qty, name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CalcError>;
