//! Session state: the artefact selection, material storage and view preferences
//!
//! Every mutation takes `&self` and returns the next value, leaving the
//! previous one untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calculator::artefact_totals;
use crate::catalog::Catalog;
use crate::error::{CalcError, Result};
use crate::models::SelectedArtefact;

/// Upper bound for any stored material count
pub const MAX_STORED_QUANTITY: u32 = 100_000;
pub const MAX_QUICK_STEP: u32 = 9_999;
pub const DEFAULT_QUICK_STEP: u32 = 100;

/// Floor `value` into `[0, max]`; NaN and infinities become 0.
pub fn clamp_number(value: f64, max: u32) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.floor().clamp(0.0, f64::from(max)) as u32
}

/// Selected artefacts in the order they were added. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    entries: Vec<SelectedArtefact>,
}

impl Selection {
    /// Build from raw entries, merging repeated ids into the first occurrence.
    pub fn from_entries(raw: Vec<SelectedArtefact>) -> Self {
        let mut entries: Vec<SelectedArtefact> = Vec::with_capacity(raw.len());
        for entry in raw {
            match entries.iter_mut().find(|e| e.artefact_id == entry.artefact_id) {
                Some(existing) => existing.qty = existing.qty.saturating_add(entry.qty),
                None => entries.push(entry),
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[SelectedArtefact] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn quantity(&self, artefact_id: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.artefact_id == artefact_id)
            .map(|e| e.qty)
    }

    /// One more of `artefact_id`, appending it with quantity 1 if new
    pub fn add(&self, artefact_id: &str) -> Self {
        let mut next = self.clone();
        match next.entries.iter_mut().find(|e| e.artefact_id == artefact_id) {
            Some(entry) => entry.qty = entry.qty.saturating_add(1),
            None => next.entries.push(SelectedArtefact {
                artefact_id: artefact_id.to_string(),
                qty: 1,
            }),
        }
        next
    }

    /// Set the quantity of an already selected artefact
    pub fn set_quantity(&self, artefact_id: &str, qty: f64) -> Self {
        let qty = clamp_number(qty, u32::MAX);
        let mut next = self.clone();
        if let Some(entry) = next.entries.iter_mut().find(|e| e.artefact_id == artefact_id) {
            entry.qty = qty;
        }
        next
    }

    /// One fewer of `artefact_id`; the entry goes away when it reaches zero
    pub fn decrement(&self, artefact_id: &str) -> Self {
        match self.quantity(artefact_id) {
            Some(qty) if qty > 1 => self.set_quantity(artefact_id, f64::from(qty - 1)),
            Some(_) => self.remove(artefact_id),
            None => self.clone(),
        }
    }

    pub fn remove(&self, artefact_id: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.artefact_id != artefact_id)
                .cloned()
                .collect(),
        }
    }
}

/// Material counts on hand. Missing ids count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    counts: BTreeMap<String, u32>,
}

impl Inventory {
    /// Build from raw counts, clamping each into range
    pub fn from_counts<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let counts = raw
            .into_iter()
            .map(|(id, count)| (id, clamp_number(count, MAX_STORED_QUANTITY)))
            .collect();
        Self { counts }
    }

    pub fn get(&self, material_id: &str) -> u32 {
        self.counts.get(material_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(id, &count)| (id.as_str(), count))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn set(&self, material_id: &str, value: f64) -> Self {
        let mut next = self.clone();
        next.counts
            .insert(material_id.to_string(), clamp_number(value, MAX_STORED_QUANTITY));
        next
    }

    pub fn apply_delta(&self, material_id: &str, delta: f64) -> Self {
        self.set(material_id, f64::from(self.get(material_id)) + delta)
    }

    /// Spend the materials for one `artefact_id`.
    ///
    /// Fails without changing anything when storage is short of any material.
    pub fn craft(&self, catalog: &Catalog, artefact_id: &str) -> Result<Self> {
        let artefact = catalog
            .artefact(artefact_id)
            .ok_or_else(|| CalcError::UnknownArtefact(artefact_id.to_string()))?;
        let needed = artefact_totals(artefact, 1);

        let mut missing: Vec<(String, u64)> = needed
            .iter()
            .filter_map(|(id, &qty)| {
                let have = u64::from(self.get(id));
                (have < qty).then(|| (catalog.material_name(id).to_string(), qty - have))
            })
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(CalcError::InsufficientMaterials {
                artefact: artefact.name.clone(),
                missing,
            });
        }

        let mut next = self.clone();
        for (id, qty) in needed {
            // qty <= current count, which is already within range
            let current = next.get(&id);
            next.counts.insert(id, current - qty as u32);
        }
        Ok(next)
    }
}

/// Storage and receipt view settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub show_breakdown: bool,
    pub show_all_materials: bool,
    pub quick_step: u32,
    pub storage_open: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_breakdown: true,
            show_all_materials: true,
            quick_step: DEFAULT_QUICK_STEP,
            storage_open: true,
        }
    }
}

impl Preferences {
    pub fn with_quick_step(self, step: f64) -> Self {
        Self {
            quick_step: clamp_number(step, MAX_QUICK_STEP),
            ..self
        }
    }
}

/// Persisted form of a selection entry, tolerant of fractional quantities
#[derive(Debug, Deserialize)]
pub(crate) struct StoredSelection {
    artefact_id: String,
    qty: f64,
}

impl From<Vec<StoredSelection>> for Selection {
    fn from(stored: Vec<StoredSelection>) -> Self {
        Selection::from_entries(
            stored
                .into_iter()
                .map(|s| SelectedArtefact {
                    artefact_id: s.artefact_id,
                    qty: clamp_number(s.qty, u32::MAX),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::sample_catalog;
    use proptest::prelude::*;

    #[test]
    fn test_add_inserts_then_increments() {
        let selection = Selection::default().add("hookah_pipe");
        assert_eq!(selection.quantity("hookah_pipe"), Some(1));

        let again = selection.add("hookah_pipe");
        assert_eq!(again.quantity("hookah_pipe"), Some(2));
        assert_eq!(again.len(), 1);
        // previous value untouched
        assert_eq!(selection.quantity("hookah_pipe"), Some(1));
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let selection = Selection::default().add("b").add("a").add("b");
        let ids: Vec<_> = selection.entries().iter().map(|e| e.artefact_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_set_quantity_clamps() {
        let selection = Selection::default().add("x");
        assert_eq!(selection.set_quantity("x", -5.0).quantity("x"), Some(0));
        assert_eq!(selection.set_quantity("x", f64::NAN).quantity("x"), Some(0));
        assert_eq!(selection.set_quantity("x", f64::INFINITY).quantity("x"), Some(0));
        assert_eq!(selection.set_quantity("x", 7.9).quantity("x"), Some(7));
    }

    #[test]
    fn test_set_quantity_ignores_unselected() {
        let selection = Selection::default().add("x");
        assert_eq!(selection.set_quantity("y", 4.0), selection);
    }

    #[test]
    fn test_remove() {
        let selection = Selection::default().add("x").add("y");
        let removed = selection.remove("x");
        assert_eq!(removed.quantity("x"), None);
        assert_eq!(removed.len(), 1);
        assert_eq!(selection.len(), 2);
        assert_eq!(removed.remove("x"), removed);
    }

    #[test]
    fn test_decrement_removes_at_zero() {
        let selection = Selection::default().add("x").add("x");
        let once = selection.decrement("x");
        assert_eq!(once.quantity("x"), Some(1));
        assert_eq!(once.decrement("x").quantity("x"), None);
        assert_eq!(once.decrement("missing"), once);
    }

    #[test]
    fn test_from_entries_merges_duplicates() {
        let selection = Selection::from_entries(vec![
            SelectedArtefact { artefact_id: "a".into(), qty: 2 },
            SelectedArtefact { artefact_id: "b".into(), qty: 1 },
            SelectedArtefact { artefact_id: "a".into(), qty: 3 },
        ]);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.quantity("a"), Some(5));
    }

    #[test]
    fn test_inventory_delta_is_capped() {
        let inventory = Inventory::default().apply_delta("goldrune", 1_000_000.0);
        assert_eq!(inventory.get("goldrune"), MAX_STORED_QUANTITY);

        let lowered = inventory.apply_delta("goldrune", -250_000.0);
        assert_eq!(lowered.get("goldrune"), 0);
    }

    #[test]
    fn test_inventory_delta_reads_current_or_zero() {
        let inventory = Inventory::default().apply_delta("goldrune", 10.0);
        assert_eq!(inventory.get("goldrune"), 10);
        assert_eq!(inventory.apply_delta("goldrune", 5.5).get("goldrune"), 15);
        assert_eq!(inventory.get("samite_silk"), 0);
    }

    #[test]
    fn test_inventory_set_rejects_nothing() {
        let inventory = Inventory::default();
        assert_eq!(inventory.set("a", f64::NAN).get("a"), 0);
        assert_eq!(inventory.set("a", -3.0).get("a"), 0);
        assert_eq!(inventory.set("a", 42.7).get("a"), 42);
    }

    #[test]
    fn test_craft_spends_materials() {
        let catalog = sample_catalog();
        let inventory = Inventory::default()
            .set("third_age_iron", 20.0)
            .set("zarosian_insignia", 12.0);

        let after = inventory.craft(&catalog, "venator_dagger").unwrap();
        assert_eq!(after.get("third_age_iron"), 4);
        assert_eq!(after.get("zarosian_insignia"), 0);
    }

    #[test]
    fn test_craft_reports_shortfall() {
        let catalog = sample_catalog();
        let inventory = Inventory::default().set("third_age_iron", 20.0);

        match inventory.craft(&catalog, "venator_dagger") {
            Err(CalcError::InsufficientMaterials { artefact, missing }) => {
                assert_eq!(artefact, "Venator dagger");
                assert_eq!(missing, vec![("Zarosian insignia".to_string(), 12)]);
            }
            other => panic!("expected a shortfall, got {other:?}"),
        }
        assert!(matches!(
            inventory.craft(&catalog, "nope"),
            Err(CalcError::UnknownArtefact(_))
        ));
    }

    #[test]
    fn test_quick_step_clamps() {
        let prefs = Preferences::default();
        assert_eq!(prefs.quick_step, DEFAULT_QUICK_STEP);
        assert_eq!(prefs.with_quick_step(25_000.0).quick_step, MAX_QUICK_STEP);
        assert_eq!(prefs.with_quick_step(-1.0).quick_step, 0);
        assert_eq!(prefs.with_quick_step(250.0).quick_step, 250);
    }

    proptest! {
        #[test]
        fn prop_clamp_stays_in_range(value in proptest::num::f64::ANY, max in 0u32..200_000) {
            let clamped = clamp_number(value, max);
            prop_assert!(clamped <= max);
            if value.is_finite() && value >= 0.0 && value <= f64::from(max) {
                prop_assert_eq!(clamped, value.floor() as u32);
            }
        }

        #[test]
        fn prop_inventory_never_exceeds_cap(deltas in proptest::collection::vec(-300_000.0f64..300_000.0, 1..20)) {
            let inventory = deltas
                .iter()
                .fold(Inventory::default(), |inv, delta| inv.apply_delta("m", *delta));
            prop_assert!(inventory.get("m") <= MAX_STORED_QUANTITY);
        }
    }
}
