//! Dataset import for the archaeology catalog
//!
//! Finds `materials.json` and `artefacts.json` under a data directory (for
//! example a checkout of the calculator's web front end) and loads them into
//! the database, keeping the order entries appear in the files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::db;
use crate::error::CalcError;
use crate::models::{ArtefactsFile, MaterialsFile};

pub const MATERIALS_FILE: &str = "materials.json";
pub const ARTEFACTS_FILE: &str = "artefacts.json";

/// Locations of the two dataset files
#[derive(Debug)]
pub struct DatasetFiles {
    pub materials: PathBuf,
    pub artefacts: PathBuf,
}

/// Walk `data_dir` for the dataset files. The shallowest match wins.
pub fn find_dataset_files(data_dir: &Path) -> Result<DatasetFiles> {
    let mut materials = None;
    let mut artefacts = None;

    for entry in WalkDir::new(data_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let slot = match entry.file_name().to_str() {
            Some(MATERIALS_FILE) => &mut materials,
            Some(ARTEFACTS_FILE) => &mut artefacts,
            _ => continue,
        };
        let depth = entry.depth();
        if slot.as_ref().is_none_or(|(best, _)| depth < *best) {
            *slot = Some((depth, entry.into_path()));
        }
    }

    let missing = |file: &'static str| CalcError::DatasetNotFound {
        file,
        dir: data_dir.display().to_string(),
    };
    Ok(DatasetFiles {
        materials: materials.map(|(_, p)| p).ok_or_else(|| missing(MATERIALS_FILE))?,
        artefacts: artefacts.map(|(_, p)| p).ok_or_else(|| missing(ARTEFACTS_FILE))?,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Import both datasets found under `data_dir` in one transaction.
///
/// With `clear`, the existing catalog is wiped inside the same transaction,
/// so a failed import leaves it untouched.
pub fn import_to_database(conn: &Connection, data_dir: &Path, clear: bool) -> Result<ImportStats> {
    let files = find_dataset_files(data_dir)?;
    tracing::info!(
        materials = %files.materials.display(),
        artefacts = %files.artefacts.display(),
        "importing datasets"
    );

    let materials: MaterialsFile = read_json(&files.materials)?;
    let artefacts: ArtefactsFile = read_json(&files.artefacts)?;

    let mut stats = ImportStats::default();
    let tx = conn.unchecked_transaction()?;
    if clear {
        tracing::info!("clearing existing catalog");
        db::clear_catalog(&tx)?;
    }

    for (position, material) in materials.materials.iter().enumerate() {
        db::upsert_material(&tx, material, position)?;
        stats.materials += 1;
        stats.locations += material.locations.len();
    }

    let known: HashSet<&str> = materials.materials.iter().map(|m| m.id.as_str()).collect();

    for (position, artefact) in artefacts.artefacts.iter().enumerate() {
        db::upsert_artefact(&tx, artefact, position)?;
        stats.artefacts += 1;
        stats.requirements += artefact.materials_required.len();

        for requirement in &artefact.materials_required {
            if !known.contains(requirement.material_id.as_str()) {
                tracing::warn!(
                    artefact = %artefact.id,
                    material = %requirement.material_id,
                    "artefact requires a material missing from the dataset"
                );
                stats.unknown_materials += 1;
            }
        }
    }

    tx.commit()?;
    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub materials: usize,
    pub locations: usize,
    pub artefacts: usize,
    pub requirements: usize,
    pub unknown_materials: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} materials ({} locations) and {} artefacts ({} requirements). Unknown material references: {}",
            self.materials, self.locations, self.artefacts, self.requirements, self.unknown_materials
        )
    }
}
