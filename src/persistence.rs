//! Saving and restoring session state through a flat key-value store
//!
//! Loading never fails: a missing, unreadable or malformed entry comes back
//! as the default value. Saving is fire-and-forget; failures are logged.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db;
use crate::error::Result;
use crate::state::{
    DEFAULT_QUICK_STEP, Inventory, MAX_QUICK_STEP, Preferences, Selection, StoredSelection,
    clamp_number,
};

pub const SELECTED_KEY: &str = "archaeology_calculator_selected_artefacts";
pub const STORAGE_KEY: &str = "archaeology_calculator_material_storage";
pub const SHOW_BREAKDOWN_KEY: &str = "archaeology_calculator_material_show_breakdown";
pub const SHOW_ALL_KEY: &str = "archaeology_calculator_material_show_all";
pub const STEP_KEY: &str = "archaeology_calculator_material_step_value";
pub const STORAGE_OPEN_KEY: &str = "archaeology_calculator_material_storage_open";

/// Durable string storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Key-value entries kept in the calculator's SQLite database
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        db::get_value(self.conn, key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        db::set_value(self.conn, key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        db::remove_value(self.conn, key)
    }
}

/// Typed access to the persisted selection, storage and preferences
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load_selection(&self) -> Selection {
        self.load_json::<Vec<StoredSelection>>(SELECTED_KEY)
            .map(Selection::from)
            .unwrap_or_default()
    }

    pub fn save_selection(&mut self, selection: &Selection) {
        self.save_json(SELECTED_KEY, selection);
    }

    pub fn clear_selection(&mut self) {
        self.remove(SELECTED_KEY);
    }

    pub fn load_inventory(&self) -> Inventory {
        self.load_json::<BTreeMap<String, f64>>(STORAGE_KEY)
            .map(Inventory::from_counts)
            .unwrap_or_default()
    }

    pub fn save_inventory(&mut self, inventory: &Inventory) {
        self.save_json(STORAGE_KEY, inventory);
    }

    pub fn clear_inventory(&mut self) {
        self.remove(STORAGE_KEY);
    }

    pub fn load_preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        // an empty entry counts as unset
        let flag = |key: &str, default: bool| match self.read(key) {
            Some(raw) if !raw.is_empty() => raw == "true",
            _ => default,
        };

        // 0 and garbage both fall back to the default step
        let quick_step = self
            .read(STEP_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|step| !step.is_nan() && *step != 0.0)
            .map_or(DEFAULT_QUICK_STEP, |step| clamp_number(step, MAX_QUICK_STEP));

        Preferences {
            show_breakdown: flag(SHOW_BREAKDOWN_KEY, defaults.show_breakdown),
            show_all_materials: flag(SHOW_ALL_KEY, defaults.show_all_materials),
            quick_step,
            storage_open: flag(STORAGE_OPEN_KEY, defaults.storage_open),
        }
    }

    pub fn save_preferences(&mut self, prefs: &Preferences) {
        self.write(SHOW_BREAKDOWN_KEY, &prefs.show_breakdown.to_string());
        self.write(SHOW_ALL_KEY, &prefs.show_all_materials.to_string());
        self.write(STEP_KEY, &prefs.quick_step.to_string());
        self.write(STORAGE_OPEN_KEY, &prefs.storage_open.to_string());
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not read saved state, using default");
                None
            }
        }
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed saved state");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key, error = %e, "could not save state");
        }
    }

    fn save_json<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.write(key, &json),
            Err(e) => tracing::warn!(key, error = %e, "could not serialize state"),
        }
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "could not erase saved state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        entries: HashMap<String, String>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.entries.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            self.entries.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.entries.remove(key);
            Ok(())
        }
    }

    fn session_with(entries: &[(&str, &str)]) -> SessionStore<MemoryStore> {
        let mut store = MemoryStore::default();
        for (k, v) in entries {
            store.set(k, v).unwrap();
        }
        SessionStore::new(store)
    }

    #[test]
    fn test_missing_entries_give_defaults() {
        let session = session_with(&[]);
        assert!(session.load_selection().is_empty());
        assert!(session.load_inventory().is_empty());
        assert_eq!(session.load_preferences(), Preferences::default());
    }

    #[test]
    fn test_selection_round_trip() {
        let mut session = session_with(&[]);
        let selection = Selection::default().add("hookah_pipe").add("hookah_pipe").add("venator_dagger");

        session.save_selection(&selection);
        assert_eq!(
            session.store.entries[SELECTED_KEY],
            r#"[{"artefact_id":"hookah_pipe","qty":2},{"artefact_id":"venator_dagger","qty":1}]"#
        );
        assert_eq!(session.load_selection(), selection);
    }

    #[test]
    fn test_corrupt_entries_are_discarded() {
        let session = session_with(&[
            (SELECTED_KEY, "{not json"),
            (STORAGE_KEY, r#"["wrong", "shape"]"#),
        ]);
        assert!(session.load_selection().is_empty());
        assert!(session.load_inventory().is_empty());
    }

    #[test]
    fn test_loaded_values_are_clamped() {
        let session = session_with(&[
            (SELECTED_KEY, r#"[{"artefact_id":"a","qty":-3},{"artefact_id":"b","qty":2.5}]"#),
            (STORAGE_KEY, r#"{"goldrune": 250000, "samite_silk": 12.9, "imperial_steel": -4}"#),
        ]);

        let selection = session.load_selection();
        assert_eq!(selection.quantity("a"), Some(0));
        assert_eq!(selection.quantity("b"), Some(2));

        let inventory = session.load_inventory();
        assert_eq!(inventory.get("goldrune"), 100_000);
        assert_eq!(inventory.get("samite_silk"), 12);
        assert_eq!(inventory.get("imperial_steel"), 0);
    }

    #[test]
    fn test_clear_selection_twice() {
        let mut session = session_with(&[]);
        session.save_selection(&Selection::default().add("x"));

        session.clear_selection();
        assert!(session.load_selection().is_empty());
        session.clear_selection();
        assert!(session.load_selection().is_empty());
        assert!(!session.store.entries.contains_key(SELECTED_KEY));
    }

    #[test]
    fn test_inventory_round_trip_and_clear() {
        let mut session = session_with(&[]);
        let inventory = Inventory::default().set("goldrune", 40.0);

        session.save_inventory(&inventory);
        assert_eq!(session.load_inventory(), inventory);

        session.clear_inventory();
        assert!(session.load_inventory().is_empty());
    }

    #[test]
    fn test_preferences_round_trip() {
        let mut session = session_with(&[]);
        let prefs = Preferences {
            show_breakdown: false,
            show_all_materials: false,
            quick_step: 250,
            storage_open: false,
        };
        session.save_preferences(&prefs);
        assert_eq!(session.store.entries[SHOW_BREAKDOWN_KEY], "false");
        assert_eq!(session.load_preferences(), prefs);
    }

    #[test]
    fn test_preference_parsing_is_lenient() {
        let session = session_with(&[
            (SHOW_BREAKDOWN_KEY, "yes"),
            (SHOW_ALL_KEY, "true"),
            (STEP_KEY, "0"),
        ]);
        let prefs = session.load_preferences();
        assert!(!prefs.show_breakdown);
        assert!(prefs.show_all_materials);
        assert_eq!(prefs.quick_step, DEFAULT_QUICK_STEP);

        for (raw, expected) in [("abc", 100), ("-5", 0), ("20000", 9_999), (" 25 ", 25)] {
            let session = session_with(&[(STEP_KEY, raw)]);
            assert_eq!(session.load_preferences().quick_step, expected, "step {raw:?}");
        }
    }

    #[test]
    fn test_empty_flag_uses_default() {
        let session = session_with(&[(SHOW_BREAKDOWN_KEY, ""), (STORAGE_OPEN_KEY, "")]);
        let prefs = session.load_preferences();
        assert!(prefs.show_breakdown);
        assert!(prefs.storage_open);
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let mut session = SessionStore::new(SqliteStore::new(&conn));

        let selection = Selection::default().add("venator_dagger");
        session.save_selection(&selection);
        assert_eq!(session.load_selection(), selection);

        session.clear_selection();
        assert_eq!(db::get_value(&conn, SELECTED_KEY).unwrap(), None);
    }

    #[test]
    fn test_unavailable_store_fails_soft() {
        // no schema: every query fails
        let conn = Connection::open_in_memory().unwrap();
        let mut session = SessionStore::new(SqliteStore::new(&conn));

        session.save_selection(&Selection::default().add("x"));
        session.save_preferences(&Preferences::default());
        session.clear_inventory();

        assert!(session.load_selection().is_empty());
        assert!(session.load_inventory().is_empty());
        assert_eq!(session.load_preferences(), Preferences::default());
    }
}
