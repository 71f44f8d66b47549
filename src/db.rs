//! Database schema and operations

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::{Artefact, Material, MaterialLocation, MaterialRequirement};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Static catalog, imported from the JSON datasets
        CREATE TABLE IF NOT EXISTS materials (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            level INTEGER NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS material_locations (
            material_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            location TEXT NOT NULL,
            requirement TEXT NOT NULL, -- JSON array of strings
            PRIMARY KEY (material_id, position)
        );

        CREATE TABLE IF NOT EXISTS artefacts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            level INTEGER NOT NULL,
            xp REAL NOT NULL,
            chronote_value INTEGER NOT NULL,
            other_uses INTEGER NOT NULL,
            other_uses_notes TEXT NOT NULL,
            god TEXT NOT NULL,
            source TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artefact_materials (
            artefact_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            material_id TEXT NOT NULL,
            qty INTEGER NOT NULL,
            PRIMARY KEY (artefact_id, position)
        );

        CREATE TABLE IF NOT EXISTS artefact_collections (
            artefact_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            collection TEXT NOT NULL,
            PRIMARY KEY (artefact_id, position)
        );

        -- Session state blobs (selection, storage, preferences)
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_artefact_materials_material ON artefact_materials(material_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a material and its locations
pub fn upsert_material(conn: &Connection, material: &Material, position: usize) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO materials (id, name, level, position) VALUES (?1, ?2, ?3, ?4)",
        (&material.id, &material.name, material.level, position as i64),
    )?;

    conn.execute(
        "DELETE FROM material_locations WHERE material_id = ?1",
        [&material.id],
    )?;
    for (i, location) in material.locations.iter().enumerate() {
        conn.execute(
            "INSERT INTO material_locations (material_id, position, location, requirement)
             VALUES (?1, ?2, ?3, ?4)",
            (
                &material.id,
                i as i64,
                &location.location,
                serde_json::to_string(&location.requirement)?,
            ),
        )?;
    }
    Ok(())
}

/// Insert or replace an artefact with its requirements and collections
pub fn upsert_artefact(conn: &Connection, artefact: &Artefact, position: usize) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO artefacts
            (id, name, level, xp, chronote_value, other_uses, other_uses_notes, god, source, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        (
            &artefact.id,
            &artefact.name,
            artefact.level,
            artefact.xp,
            artefact.chronote_value,
            artefact.other_uses,
            &artefact.other_uses_notes,
            &artefact.god,
            &artefact.source,
            position as i64,
        ),
    )?;

    conn.execute(
        "DELETE FROM artefact_materials WHERE artefact_id = ?1",
        [&artefact.id],
    )?;
    for (i, requirement) in artefact.materials_required.iter().enumerate() {
        conn.execute(
            "INSERT INTO artefact_materials (artefact_id, position, material_id, qty)
             VALUES (?1, ?2, ?3, ?4)",
            (&artefact.id, i as i64, &requirement.material_id, requirement.qty),
        )?;
    }

    conn.execute(
        "DELETE FROM artefact_collections WHERE artefact_id = ?1",
        [&artefact.id],
    )?;
    for (i, collection) in artefact.collections.iter().enumerate() {
        conn.execute(
            "INSERT INTO artefact_collections (artefact_id, position, collection)
             VALUES (?1, ?2, ?3)",
            (&artefact.id, i as i64, collection),
        )?;
    }
    Ok(())
}

/// Clear the imported catalog (session state is kept)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM artefact_collections;
        DELETE FROM artefact_materials;
        DELETE FROM artefacts;
        DELETE FROM material_locations;
        DELETE FROM materials;
        "#,
    )?;
    Ok(())
}

/// Load the whole catalog into memory, in import order
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut locations = load_locations(conn)?;
    let mut requirements = load_requirements(conn)?;
    let mut collections = load_collections(conn)?;

    let mut stmt = conn.prepare("SELECT id, name, level FROM materials ORDER BY position, id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Material {
            id: row.get(0)?,
            name: row.get(1)?,
            level: row.get(2)?,
            locations: Vec::new(),
        })
    })?;

    let mut materials = Vec::new();
    for row in rows {
        let mut material = row?;
        material.locations = locations.remove(&material.id).unwrap_or_default();
        materials.push(material);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, level, xp, chronote_value, other_uses, other_uses_notes, god, source
         FROM artefacts ORDER BY position, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Artefact {
            id: row.get(0)?,
            name: row.get(1)?,
            level: row.get(2)?,
            xp: row.get(3)?,
            chronote_value: row.get(4)?,
            materials_required: Vec::new(),
            collections: Vec::new(),
            other_uses: row.get(5)?,
            other_uses_notes: row.get(6)?,
            god: row.get(7)?,
            source: row.get(8)?,
        })
    })?;

    let mut artefacts = Vec::new();
    for row in rows {
        let mut artefact = row?;
        artefact.materials_required = requirements.remove(&artefact.id).unwrap_or_default();
        artefact.collections = collections.remove(&artefact.id).unwrap_or_default();
        artefacts.push(artefact);
    }

    Ok(Catalog::new(materials, artefacts))
}

fn load_locations(conn: &Connection) -> Result<HashMap<String, Vec<MaterialLocation>>> {
    let mut stmt = conn.prepare(
        "SELECT material_id, location, requirement FROM material_locations
         ORDER BY material_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut results: HashMap<String, Vec<MaterialLocation>> = HashMap::new();
    for row in rows {
        let (material_id, location, requirement) = row?;
        results.entry(material_id).or_default().push(MaterialLocation {
            location,
            requirement: serde_json::from_str(&requirement)?,
        });
    }
    Ok(results)
}

fn load_requirements(conn: &Connection) -> Result<HashMap<String, Vec<MaterialRequirement>>> {
    let mut stmt = conn.prepare(
        "SELECT artefact_id, material_id, qty FROM artefact_materials
         ORDER BY artefact_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            MaterialRequirement {
                material_id: row.get(1)?,
                qty: row.get(2)?,
            },
        ))
    })?;

    let mut results: HashMap<String, Vec<MaterialRequirement>> = HashMap::new();
    for row in rows {
        let (artefact_id, requirement) = row?;
        results.entry(artefact_id).or_default().push(requirement);
    }
    Ok(results)
}

fn load_collections(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT artefact_id, collection FROM artefact_collections ORDER BY artefact_id, position",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut results: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (artefact_id, collection) = row?;
        results.entry(artefact_id).or_default().push(collection);
    }
    Ok(results)
}

/// Read a session state entry
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

/// Write a session state entry, replacing any previous value
pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        (key, value),
    )?;
    Ok(())
}

/// Erase a session state entry
pub fn remove_value(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::sample_catalog;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn store_catalog(conn: &Connection, catalog: &Catalog) {
        for (i, m) in catalog.materials().iter().enumerate() {
            upsert_material(conn, m, i).unwrap();
        }
        for (i, a) in catalog.artefacts().iter().enumerate() {
            upsert_artefact(conn, a, i).unwrap();
        }
    }

    #[test]
    fn test_catalog_survives_storage() {
        let conn = memory_db();
        let mut catalog = sample_catalog();
        let mut materials = catalog.materials().to_vec();
        materials[0].locations.push(MaterialLocation {
            location: "Kharid-et".to_string(),
            requirement: vec!["Level 5".to_string()],
        });
        let mut artefacts = catalog.artefacts().to_vec();
        artefacts[3].collections.push("Zarosian I".to_string());
        catalog = Catalog::new(materials, artefacts);

        store_catalog(&conn, &catalog);
        let loaded = load_catalog(&conn).unwrap();

        assert_eq!(loaded.materials(), catalog.materials());
        assert_eq!(loaded.artefacts(), catalog.artefacts());
    }

    #[test]
    fn test_upsert_replaces_requirements() {
        let conn = memory_db();
        let catalog = sample_catalog();
        store_catalog(&conn, &catalog);

        let mut dagger = catalog.artefact("venator_dagger").unwrap().clone();
        dagger.materials_required.truncate(1);
        upsert_artefact(&conn, &dagger, 0).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.artefact("venator_dagger").unwrap().materials_required.len(), 1);
        assert_eq!(loaded.artefacts()[0].id, "venator_dagger");
    }

    #[test]
    fn test_clear_catalog_keeps_session_state() {
        let conn = memory_db();
        store_catalog(&conn, &sample_catalog());
        set_value(&conn, "k", "v").unwrap();

        clear_catalog(&conn).unwrap();
        assert!(load_catalog(&conn).unwrap().is_empty());
        assert_eq!(get_value(&conn, "k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_kv_set_get_remove() {
        let conn = memory_db();
        assert_eq!(get_value(&conn, "k").unwrap(), None);

        set_value(&conn, "k", "one").unwrap();
        set_value(&conn, "k", "two").unwrap();
        assert_eq!(get_value(&conn, "k").unwrap().as_deref(), Some("two"));

        remove_value(&conn, "k").unwrap();
        remove_value(&conn, "k").unwrap();
        assert_eq!(get_value(&conn, "k").unwrap(), None);
    }
}
