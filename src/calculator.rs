//! Material requirement calculator logic

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::catalog::Catalog;
use crate::models::{Artefact, Material};
use crate::state::{Inventory, Selection};

/// Material id -> quantity
pub type MaterialTotals = HashMap<String, u64>;

/// Requirements for one selected artefact, scaled by the selected quantity
#[derive(Debug, Clone)]
pub struct ArtefactLine {
    pub artefact_id: String,
    pub name: String,
    pub level: u32,
    pub qty: u32,
    pub totals: MaterialTotals,
}

#[derive(Debug, Clone, Default)]
pub struct Totals {
    pub per_artefact: Vec<ArtefactLine>,
    pub grand_total: MaterialTotals,
}

/// Material totals for crafting `qty` of one artefact
pub fn artefact_totals(artefact: &Artefact, qty: u32) -> MaterialTotals {
    let mut totals = MaterialTotals::new();
    for requirement in &artefact.materials_required {
        *totals.entry(requirement.material_id.clone()).or_default() +=
            u64::from(requirement.qty) * u64::from(qty);
    }
    totals
}

/// Sum requirements per selected artefact and across the whole selection.
///
/// Entries naming an artefact the catalog doesn't know are skipped.
pub fn compute_totals(catalog: &Catalog, selection: &Selection) -> Totals {
    let mut result = Totals::default();

    for entry in selection.entries() {
        let Some(artefact) = catalog.artefact(&entry.artefact_id) else {
            tracing::debug!(artefact_id = %entry.artefact_id, "skipping unknown artefact in selection");
            continue;
        };

        let totals = artefact_totals(artefact, entry.qty);
        for (material_id, qty) in &totals {
            *result.grand_total.entry(material_id.clone()).or_default() += qty;
        }

        result.per_artefact.push(ArtefactLine {
            artefact_id: artefact.id.clone(),
            name: artefact.name.clone(),
            level: artefact.level,
            qty: entry.qty,
            totals,
        });
    }

    result
}

/// A required material set against what's in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NettedMaterial {
    pub material_id: String,
    pub required: u64,
    pub have: u64,
    pub remaining: u64,
}

impl NettedMaterial {
    pub fn new(material_id: &str, required: u64, have: u64) -> Self {
        Self {
            material_id: material_id.to_string(),
            required,
            have,
            remaining: required.saturating_sub(have),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.remaining == 0
    }
}

/// Net every material in `grand_total` against the inventory, ordered by id
pub fn net(grand_total: &MaterialTotals, inventory: &Inventory) -> Vec<NettedMaterial> {
    let mut netted: Vec<_> = grand_total
        .iter()
        .map(|(id, &required)| NettedMaterial::new(id, required, u64::from(inventory.get(id))))
        .collect();
    netted.sort_by(|a, b| a.material_id.cmp(&b.material_id));
    netted
}

/// Case-insensitive name ordering with a byte-order tiebreak
pub fn compare_display_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Totals as (material id, qty), ordered by display name
pub fn sorted_by_name<'a>(catalog: &Catalog, totals: &'a MaterialTotals) -> Vec<(&'a str, u64)> {
    let mut sorted: Vec<_> = totals.iter().map(|(id, &qty)| (id.as_str(), qty)).collect();
    sorted.sort_by(|(a, _), (b, _)| {
        compare_display_names(catalog.material_name(a), catalog.material_name(b)).then(a.cmp(b))
    });
    sorted
}

/// Material ids any selected artefact requires
pub fn relevant_material_ids<'a>(catalog: &'a Catalog, selection: &Selection) -> BTreeSet<&'a str> {
    selection
        .entries()
        .iter()
        .filter_map(|entry| catalog.artefact(&entry.artefact_id))
        .flat_map(|a| a.materials_required.iter().map(|r| r.material_id.as_str()))
        .collect()
}

/// Materials shown in the storage panel, by level then name
pub fn storage_materials<'a>(
    catalog: &'a Catalog,
    selection: &Selection,
    show_all: bool,
) -> Vec<&'a Material> {
    let relevant = relevant_material_ids(catalog, selection);
    let mut materials: Vec<_> = catalog
        .materials()
        .iter()
        .filter(|m| show_all || relevant.contains(m.id.as_str()))
        .collect();
    materials.sort_by(|a, b| {
        a.level
            .cmp(&b.level)
            .then_with(|| compare_display_names(&a.name, &b.name))
    });
    materials
}

/// One row of the receipt's TOTAL block
#[derive(Debug, Clone)]
pub struct ReceiptRow {
    pub name: String,
    pub material: NettedMaterial,
}

#[derive(Debug, Clone)]
pub struct BreakdownBlock {
    pub name: String,
    pub level: u32,
    pub qty: u32,
    pub materials: Vec<(String, u64)>,
}

/// Everything the "Materials Needed" view shows
#[derive(Debug)]
pub struct Receipt {
    pub selection_len: usize,
    pub rows: Vec<ReceiptRow>,
    pub breakdown: Option<Vec<BreakdownBlock>>,
}

/// Build the receipt for the current selection and storage
pub fn build_receipt(
    catalog: &Catalog,
    selection: &Selection,
    inventory: &Inventory,
    show_breakdown: bool,
) -> Receipt {
    let totals = compute_totals(catalog, selection);

    let mut rows: Vec<ReceiptRow> = net(&totals.grand_total, inventory)
        .into_iter()
        .map(|material| ReceiptRow {
            name: catalog.material_name(&material.material_id).to_string(),
            material,
        })
        .collect();
    rows.sort_by(|a, b| compare_display_names(&a.name, &b.name));

    let breakdown = show_breakdown.then(|| {
        totals
            .per_artefact
            .iter()
            .map(|line| {
                tracing::trace!(artefact_id = %line.artefact_id, qty = line.qty, "breakdown block");
                BreakdownBlock {
                    name: line.name.clone(),
                    level: line.level,
                    qty: line.qty,
                    materials: sorted_by_name(catalog, &line.totals)
                        .into_iter()
                        .map(|(id, qty)| (catalog.material_name(id).to_string(), qty))
                        .collect(),
                }
            })
            .collect()
    });

    Receipt {
        selection_len: selection.len(),
        rows,
        breakdown,
    }
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Materials Needed ===")?;
        writeln!(f, "TOTAL")?;

        if self.selection_len == 0 {
            writeln!(f, "  No artefacts selected yet.")?;
            return Ok(());
        }
        if self.rows.is_empty() {
            writeln!(f, "  No materials found for selected artefacts.")?;
        }
        for row in &self.rows {
            let m = &row.material;
            let (status, shown) = if m.is_satisfied() {
                ("ok", m.required)
            } else {
                ("need", m.remaining)
            };
            writeln!(
                f,
                "  {:<30} {:>4} {:>7}  ({} - {})",
                row.name, status, shown, m.required, m.have
            )?;
        }

        if let Some(blocks) = &self.breakdown {
            writeln!(f)?;
            writeln!(f, "Breakdown:")?;
            for block in blocks {
                writeln!(f, "  {} (Lvl. {}) x{}", block.name, block.level, block.qty)?;
                for (name, qty) in &block.materials {
                    writeln!(f, "    {:<28} {:>7}", name, qty)?;
                }
            }
        }

        Ok(())
    }
}
