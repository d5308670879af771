//! Canonical sparse voxel schema.
//!
//! Every input format is normalised into [`Schema`]: an ordered map from cell
//! coordinate to [`SchemaCell`], plus an axis-aligned bounding box. Cells absent
//! from the map carry no required content. Explicit air cells are kept so the
//! planner can account for them as skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::manifest::{Manifest, compute_manifest};
use crate::core::types::{Material, Side, Vec3};

/// Per-cell placement metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellMeta {
    /// Side the agent should act through; `None` defers to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Whether a conflicting block in the target cell may be replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCell {
    pub material: Material,
    #[serde(default)]
    pub meta: CellMeta,
}

impl SchemaCell {
    pub fn new(material: impl Into<Material>) -> Self {
        Self {
            material: material.into(),
            meta: CellMeta::default(),
        }
    }

    pub fn with_meta(material: impl Into<Material>, meta: CellMeta) -> Self {
        Self {
            material: material.into(),
            meta,
        }
    }
}

/// Inclusive axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// Extent along each axis (`max - min + 1`).
    pub fn size(&self) -> Vec3 {
        self.max - self.min + Vec3::new(1, 1, 1)
    }

    pub fn volume(&self) -> u64 {
        let size = self.size();
        [size.x, size.y, size.z]
            .iter()
            .map(|v| u64::try_from(*v).unwrap_or(0))
            .product()
    }

    fn include(&mut self, p: Vec3) {
        self.min = Vec3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Vec3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema has no cells")]
    Empty,
    #[error("cell {0} declared more than once")]
    DuplicateCell(Vec3),
    #[error("cell {cell} lies outside declared bounds {min}..{max}")]
    OutOfBounds { cell: Vec3, min: Vec3, max: Vec3 },
    #[error("declared bounds are inverted ({min}..{max})")]
    InvertedBounds { min: Vec3, max: Vec3 },
    #[error("unknown legend symbol '{symbol}' at {cell}")]
    UnknownSymbol { symbol: char, cell: Vec3 },
    #[error("malformed schema: {0}")]
    Malformed(String),
}

/// Canonical parsed schema: cells, bounds and material census.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    cells: BTreeMap<Vec3, SchemaCell>,
    bounds: Bounds,
    manifest: Manifest,
}

impl Schema {
    /// Build from cells, deriving bounds from the occupied coordinates.
    pub fn from_cells<I>(cells: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (Vec3, SchemaCell)>,
    {
        let cells = collect_unique(cells)?;
        let mut iter = cells.keys();
        let first = *iter.next().ok_or(SchemaError::Empty)?;
        let mut bounds = Bounds::new(first, first);
        for p in iter {
            bounds.include(*p);
        }
        Ok(Self::assemble(cells, bounds))
    }

    /// Build from cells with explicitly declared bounds (may exceed the occupied region).
    pub fn with_bounds<I>(cells: I, bounds: Bounds) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (Vec3, SchemaCell)>,
    {
        if bounds.min.x > bounds.max.x || bounds.min.y > bounds.max.y || bounds.min.z > bounds.max.z
        {
            return Err(SchemaError::InvertedBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        let cells = collect_unique(cells)?;
        if cells.is_empty() {
            return Err(SchemaError::Empty);
        }
        if let Some(cell) = cells.keys().find(|p| !bounds.contains(**p)) {
            return Err(SchemaError::OutOfBounds {
                cell: *cell,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(Self::assemble(cells, bounds))
    }

    fn assemble(cells: BTreeMap<Vec3, SchemaCell>, bounds: Bounds) -> Self {
        let manifest = compute_manifest(cells.values().map(|cell| &cell.material));
        Self {
            cells,
            bounds,
            manifest,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn get(&self, p: Vec3) -> Option<&SchemaCell> {
        self.cells.get(&p)
    }

    /// All declared cells in coordinate order, air included.
    pub fn cells(&self) -> impl Iterator<Item = (Vec3, &SchemaCell)> {
        self.cells.iter().map(|(p, cell)| (*p, cell))
    }

    /// Number of cells that require content.
    pub fn solid_count(&self) -> usize {
        self.cells
            .values()
            .filter(|cell| !cell.material.is_air())
            .count()
    }
}

fn collect_unique<I>(cells: I) -> Result<BTreeMap<Vec3, SchemaCell>, SchemaError>
where
    I: IntoIterator<Item = (Vec3, SchemaCell)>,
{
    let mut map = BTreeMap::new();
    for (p, cell) in cells {
        if map.insert(p, cell).is_some() {
            return Err(SchemaError::DuplicateCell(p));
        }
    }
    Ok(map)
}
