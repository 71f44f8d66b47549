//! In-memory lookup tables over the static material and artefact datasets

use std::collections::HashMap;

use crate::models::{Artefact, Material};

/// The static catalog. Iteration order is dataset order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    materials: Vec<Material>,
    artefacts: Vec<Artefact>,
    material_index: HashMap<String, usize>,
    artefact_index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog. A repeated id replaces the earlier entry but keeps its position.
    pub fn new(materials: Vec<Material>, artefacts: Vec<Artefact>) -> Self {
        let mut catalog = Self::default();
        for material in materials {
            match catalog.material_index.get(&material.id) {
                Some(&i) => catalog.materials[i] = material,
                None => {
                    catalog
                        .material_index
                        .insert(material.id.clone(), catalog.materials.len());
                    catalog.materials.push(material);
                }
            }
        }
        for artefact in artefacts {
            match catalog.artefact_index.get(&artefact.id) {
                Some(&i) => catalog.artefacts[i] = artefact,
                None => {
                    catalog
                        .artefact_index
                        .insert(artefact.id.clone(), catalog.artefacts.len());
                    catalog.artefacts.push(artefact);
                }
            }
        }
        catalog
    }

    pub fn material(&self, id: &str) -> Option<&Material> {
        self.material_index.get(id).map(|&i| &self.materials[i])
    }

    pub fn artefact(&self, id: &str) -> Option<&Artefact> {
        self.artefact_index.get(id).map(|&i| &self.artefacts[i])
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn artefacts(&self) -> &[Artefact] {
        &self.artefacts
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty() && self.artefacts.is_empty()
    }

    /// Display name for a material, falling back to the raw id
    pub fn material_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.material(id).map_or(id, |m| m.name.as_str())
    }

    /// Requirements that point at materials missing from the catalog, as (artefact, material)
    pub fn dangling_requirements(&self) -> Vec<(&str, &str)> {
        self.artefacts
            .iter()
            .flat_map(|a| {
                a.materials_required
                    .iter()
                    .filter(|r| !self.material_index.contains_key(&r.material_id))
                    .map(move |r| (a.id.as_str(), r.material_id.as_str()))
            })
            .collect()
    }
}
