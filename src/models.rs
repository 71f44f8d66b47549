//! Data models for archaeology materials, artefacts and the user's session

use std::fmt;
use std::marker::PhantomData;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub locations: Vec<MaterialLocation>,
}

/// Where a material can be excavated, and what is needed to get there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLocation {
    pub location: String,
    #[serde(default)]
    pub requirement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: String,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artefact {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub xp: f64,
    #[serde(default)]
    pub chronote_value: u32,
    #[serde(default)]
    pub materials_required: Vec<MaterialRequirement>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub other_uses: u32,
    #[serde(default)]
    pub other_uses_notes: String,
    #[serde(default)]
    pub god: String,
    #[serde(default)]
    pub source: String,
}

/// One line of the user's selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedArtefact {
    pub artefact_id: String,
    pub qty: u32,
}

/// `materials.json`: `{"materials": {"<id>": Material, ...}}`
#[derive(Debug, Deserialize)]
pub struct MaterialsFile {
    #[serde(deserialize_with = "ordered_values")]
    pub materials: Vec<Material>,
}

/// `artefacts.json`: `{"artefacts": {"<id>": Artefact, ...}}`
#[derive(Debug, Deserialize)]
pub struct ArtefactsFile {
    #[serde(deserialize_with = "ordered_values")]
    pub artefacts: Vec<Artefact>,
}

/// Read an id-keyed JSON object as a list of its values, in file order.
fn ordered_values<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct ValuesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for ValuesVisitor<T> {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object keyed by id")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Vec<T>, A::Error> {
            let mut values = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((_, value)) = map.next_entry::<IgnoredAny, T>()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_map(ValuesVisitor(PhantomData))
}
