//! Schema file loading.
//!
//! Three interchangeable formats normalise into [`Schema`]:
//! - JSON `legend` + `layers` (layers bottom-up, rows by `z`, characters by `x`)
//! - JSON `blocks`, a sparse voxel list
//! - a text grid with `legend:` and `layer:` sections
//!
//! JSON input is checked against the embedded v1 JSON Schema before it is
//! interpreted.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::schema::{Bounds, CellMeta, Schema, SchemaCell, SchemaError};
use crate::core::types::{Material, Side, Vec3};

const V1_SCHEMA: &str = include_str!("../../schemas/voxel_schema.v1.schema.json");

/// File extensions recognised when listing a schema directory.
pub const SCHEMA_EXTENSIONS: &[&str] = &["json", "txt", "grid"];

static LEGEND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S)\s*=\s*(\S+)((?:\s+\S+)*)\s*$").expect("legend regex")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LegendEntry {
    Name(String),
    Placement(PlacementDoc),
}

#[derive(Debug, Clone, Deserialize)]
struct PlacementDoc {
    material: String,
    #[serde(default)]
    side: Option<Side>,
    #[serde(default)]
    overwrite: Option<bool>,
}

impl PlacementDoc {
    fn into_cell(self) -> SchemaCell {
        SchemaCell::with_meta(
            self.material.as_str(),
            CellMeta {
                side: self.side,
                overwrite: self.overwrite,
            },
        )
    }
}

impl LegendEntry {
    fn to_cell(&self) -> SchemaCell {
        match self {
            LegendEntry::Name(name) => SchemaCell::new(name.as_str()),
            LegendEntry::Placement(doc) => doc.clone().into_cell(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BlockDoc {
    x: i32,
    y: i32,
    z: i32,
    #[serde(flatten)]
    placement: PlacementDoc,
}

#[derive(Debug, Clone, Deserialize)]
struct SchemaDoc {
    #[serde(default)]
    legend: BTreeMap<String, LegendEntry>,
    #[serde(default)]
    layers: Vec<Vec<String>>,
    #[serde(default)]
    blocks: Vec<BlockDoc>,
    #[serde(default)]
    bounds: Option<Bounds>,
}

/// Load and normalise a schema file, choosing the format by extension.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let schema = match ext.as_str() {
        "json" => parse_json_schema(&raw),
        "txt" | "grid" => parse_text_grid(&raw).map_err(anyhow::Error::from),
        other => Err(anyhow!("unsupported schema format '.{other}'")),
    }
    .with_context(|| format!("load schema {}", path.display()))?;
    debug!(
        path = %path.display(),
        cells = schema.cells().count(),
        materials = schema.manifest().len(),
        "schema loaded"
    );
    Ok(schema)
}

/// Sorted schema files directly under `dir`.
pub fn list_schemas(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir entry in {}", dir.display()))?
            .path();
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCHEMA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && known {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parse a JSON schema document (layers or sparse blocks).
pub fn parse_json_schema(raw: &str) -> Result<Schema> {
    let instance: Value = serde_json::from_str(raw).context("parse schema json")?;
    let format: Value = serde_json::from_str(V1_SCHEMA).context("parse v1 json schema")?;
    validate_json(&instance, &format)?;
    let doc: SchemaDoc = serde_json::from_value(instance).context("parse schema as v1 struct")?;

    let cells = if doc.blocks.is_empty() {
        let legend: BTreeMap<char, SchemaCell> = doc
            .legend
            .iter()
            .filter_map(|(symbol, entry)| Some((symbol.chars().next()?, entry.to_cell())))
            .collect();
        layer_cells(&doc.layers, &legend)?
    } else {
        doc.blocks
            .into_iter()
            .map(|block| (Vec3::new(block.x, block.y, block.z), block.placement.into_cell()))
            .collect()
    };

    let schema = match doc.bounds {
        Some(bounds) => Schema::with_bounds(cells, bounds)?,
        None => Schema::from_cells(cells)?,
    };
    Ok(schema)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_json(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Expand layer rows into cells. Spaces mean "no content"; any other symbol
/// must be in the legend.
fn layer_cells(
    layers: &[Vec<String>],
    legend: &BTreeMap<char, SchemaCell>,
) -> Result<Vec<(Vec3, SchemaCell)>, SchemaError> {
    let mut cells = Vec::new();
    for (y, rows) in layers.iter().enumerate() {
        for (z, row) in rows.iter().enumerate() {
            for (x, symbol) in row.chars().enumerate() {
                if symbol == ' ' {
                    continue;
                }
                let p = Vec3::new(coord(x)?, coord(y)?, coord(z)?);
                let cell = legend
                    .get(&symbol)
                    .cloned()
                    .ok_or(SchemaError::UnknownSymbol { symbol, cell: p })?;
                cells.push((p, cell));
            }
        }
    }
    Ok(cells)
}

fn coord(index: usize) -> Result<i32, SchemaError> {
    i32::try_from(index).map_err(|_| SchemaError::Malformed(format!("index {index} too large")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Legend,
    Layer,
}

/// Parse the text grid format.
///
/// ```text
/// # comment
/// legend:
/// S = minecraft:stone
/// L = minecraft:lantern side=up overwrite
/// layer:
/// SSS
/// S S
/// ```
pub fn parse_text_grid(raw: &str) -> Result<Schema, SchemaError> {
    let mut legend: BTreeMap<char, SchemaCell> = BTreeMap::new();
    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut section = Section::Preamble;

    for (lineno, line) in raw.lines().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with('#') {
            continue;
        }
        match trimmed.trim() {
            "legend:" => {
                section = Section::Legend;
                continue;
            }
            "layer:" => {
                section = Section::Layer;
                layers.push(Vec::new());
                continue;
            }
            _ => {}
        }
        match section {
            Section::Preamble => {
                if !trimmed.trim().is_empty() {
                    return Err(SchemaError::Malformed(format!(
                        "line {}: content before 'legend:' or 'layer:'",
                        lineno + 1
                    )));
                }
            }
            Section::Legend => {
                if trimmed.trim().is_empty() {
                    continue;
                }
                let (symbol, cell) = parse_legend_line(trimmed.trim()).ok_or_else(|| {
                    SchemaError::Malformed(format!("line {}: bad legend entry", lineno + 1))
                })?;
                legend.insert(symbol, cell);
            }
            Section::Layer => {
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(rows) = layers.last_mut() {
                    rows.push(trimmed.to_string());
                }
            }
        }
    }

    if layers.is_empty() {
        return Err(SchemaError::Empty);
    }
    Schema::from_cells(layer_cells(&layers, &legend)?)
}

fn parse_legend_line(line: &str) -> Option<(char, SchemaCell)> {
    let caps = LEGEND_LINE.captures(line)?;
    let symbol = caps.get(1)?.as_str().chars().next()?;
    let material = Material::from(caps.get(2)?.as_str());
    let mut meta = CellMeta::default();
    for option in caps.get(3).map_or("", |m| m.as_str()).split_whitespace() {
        match option.split_once('=') {
            Some(("side", value)) => meta.side = Some(Side::parse(value)?),
            Some(("overwrite", value)) => meta.overwrite = Some(value.parse().ok()?),
            None if option == "overwrite" => meta.overwrite = Some(true),
            _ => return None,
        }
    }
    Some((symbol, SchemaCell::with_meta(material, meta)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HUT_JSON: &str = r#"{
        "name": "hut",
        "legend": {
            "S": "minecraft:stone",
            ".": "minecraft:air",
            "L": { "material": "minecraft:lantern", "side": "up", "overwrite": true }
        },
        "layers": [
            ["SSS", "S.S", "SSS"],
            ["S S", " L "]
        ]
    }"#;

    #[test]
    fn json_layers_parse_into_cells() {
        let schema = parse_json_schema(HUT_JSON).expect("parse");
        assert_eq!(schema.manifest().get(&"minecraft:stone".into()), 10);
        assert_eq!(schema.manifest().get(&"minecraft:lantern".into()), 1);
        let lantern = schema.get(Vec3::new(1, 1, 1)).expect("lantern");
        assert_eq!(lantern.meta.side, Some(Side::Up));
        assert_eq!(lantern.meta.overwrite, Some(true));
        assert!(schema.get(Vec3::new(1, 1, 0)).is_none());
        assert_eq!(schema.solid_count(), 11);
    }

    #[test]
    fn json_blocks_with_bounds_parse() {
        let raw = r#"{
            "blocks": [
                { "x": 0, "y": 0, "z": 0, "material": "stone" },
                { "x": 1, "y": 0, "z": 1, "material": "glass", "side": "front" }
            ],
            "bounds": { "min": { "x": 0, "y": 0, "z": 0 }, "max": { "x": 5, "y": 5, "z": 5 } }
        }"#;
        let schema = parse_json_schema(raw).expect("parse");
        assert_eq!(schema.bounds().max, Vec3::new(5, 5, 5));
        assert_eq!(
            schema.get(Vec3::new(1, 0, 1)).and_then(|c| c.meta.side),
            Some(Side::Front)
        );
    }

    #[test]
    fn json_violating_format_is_rejected() {
        let raw = r#"{ "layers": [["SS"]] }"#;
        let err = parse_json_schema(raw).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn unknown_symbol_is_reported_with_position() {
        let raw = r#"{ "legend": { "S": "stone" }, "layers": [["SX"]] }"#;
        let err = parse_json_schema(raw).unwrap_err();
        let schema_err = err.downcast_ref::<SchemaError>().expect("schema error");
        assert_eq!(
            schema_err,
            &SchemaError::UnknownSymbol {
                symbol: 'X',
                cell: Vec3::new(1, 0, 0)
            }
        );
    }

    #[test]
    fn text_grid_parses_legend_options() {
        let raw = "# tower\nlegend:\nS = minecraft:stone\nL = minecraft:lantern side=up overwrite\n\nlayer:\nSS\nSS\nlayer:\nL\n";
        let schema = parse_text_grid(raw).expect("parse");
        assert_eq!(schema.manifest().get(&"minecraft:stone".into()), 4);
        let lantern = schema.get(Vec3::new(0, 1, 0)).expect("lantern");
        assert_eq!(lantern.meta.side, Some(Side::Up));
        assert_eq!(lantern.meta.overwrite, Some(true));
    }

    #[test]
    fn text_grid_rejects_bad_legend() {
        let raw = "legend:\nS = stone side=sideways\nlayer:\nS\n";
        assert!(matches!(
            parse_text_grid(raw),
            Err(SchemaError::Malformed(_))
        ));
    }

    #[test]
    fn list_schemas_is_sorted_and_filtered() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in ["b.json", "a.txt", "notes.md", "c.grid"] {
            fs::write(temp.path().join(name), "").expect("write");
        }
        let names: Vec<String> = list_schemas(temp.path())
            .expect("list")
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a.txt", "b.json", "c.grid"]);
    }

    #[test]
    fn load_schema_dispatches_on_extension() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("hut.json");
        fs::write(&path, HUT_JSON).expect("write");
        let schema = load_schema(&path).expect("load");
        assert_eq!(schema.solid_count(), 11);

        let bad = temp.path().join("hut.yaml");
        fs::write(&bad, "").expect("write");
        assert!(load_schema(&bad).is_err());
    }
}
