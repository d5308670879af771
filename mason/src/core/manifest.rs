//! Material census and shortfall arithmetic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Material;

/// Material -> required count. Never holds air or zero entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    counts: BTreeMap<Material, u32>,
}

impl Manifest {
    /// Build from raw `(material, count)` entries. Air, zero and negative
    /// entries are dropped one by one before duplicates are summed.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Material, i64)>,
    {
        let mut counts: BTreeMap<Material, u32> = BTreeMap::new();
        for (material, count) in entries {
            if material.is_air() || count <= 0 {
                continue;
            }
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            let sum = counts.entry(material).or_insert(0);
            *sum = sum.saturating_add(count);
        }
        Self { counts }
    }

    pub fn get(&self, material: &Material) -> u32 {
        self.counts.get(material).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|c| u64::from(*c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Material, u32)> {
        self.counts.iter().map(|(m, c)| (m, *c))
    }

    /// Entries whose requirement exceeds what `available` reports.
    pub fn shortfalls<F>(&self, mut available: F) -> Vec<Shortfall>
    where
        F: FnMut(&Material) -> u32,
    {
        self.counts
            .iter()
            .filter_map(|(material, required)| {
                let have = available(material);
                (have < *required).then(|| Shortfall {
                    material: material.clone(),
                    required: *required,
                    available: have,
                })
            })
            .collect()
    }
}

/// Census of a material list: one unit per entry, air excluded.
pub fn compute_manifest<'a, I>(materials: I) -> Manifest
where
    I: IntoIterator<Item = &'a Material>,
{
    Manifest::from_entries(materials.into_iter().map(|m| (m.clone(), 1)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub material: Material,
    pub required: u32,
    pub available: u32,
}

impl Shortfall {
    pub fn missing(&self) -> u32 {
        self.required.saturating_sub(self.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn census_excludes_air_and_sums_duplicates() {
        let materials: Vec<Material> = ["stone", "minecraft:air", "stone", "glass", "", "stone"]
            .into_iter()
            .map(Material::from)
            .collect();
        let manifest = compute_manifest(&materials);
        assert_eq!(manifest.get(&"stone".into()), 3);
        assert_eq!(manifest.get(&"glass".into()), 1);
        assert_eq!(manifest.get(&"minecraft:air".into()), 0);
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.total(), 4);
    }

    #[test]
    fn non_positive_entries_are_dropped_before_summing() {
        let manifest = Manifest::from_entries([
            (Material::from("a"), 5),
            (Material::from("b"), 0),
            (Material::from("c"), -3),
            (Material::from("a"), -3),
            (Material::from("a"), 2),
            (Material::from("minecraft:air"), 9),
        ]);
        assert_eq!(manifest.get(&"a".into()), 7);
        assert_eq!(manifest.get(&"c".into()), 0);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn shortfalls_report_only_missing_materials() {
        let manifest = Manifest::from_entries([
            (Material::from("stone"), 10),
            (Material::from("glass"), 2),
        ]);
        let shortfalls = manifest.shortfalls(|m| if m.as_str() == "stone" { 4 } else { 2 });
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].material.as_str(), "stone");
        assert_eq!(shortfalls[0].missing(), 6);
    }
}
