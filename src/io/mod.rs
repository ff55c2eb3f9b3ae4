use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use phylotree::tree::Tree as PhyloTree;
use serde::Deserialize;
use serde_json::Value;

use crate::tree::{Tree, TreeNode};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DatasetFormat {
    Json,
    Newick,
}

/// One coloring offered by the dataset (auspice `meta.colorings` entry).
#[derive(Debug, Clone, PartialEq)]
pub struct Coloring {
    pub key: String,
    pub title: String,
    pub continuous: bool,
}

/// A loaded dataset: the flattened tree plus display metadata.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub format: DatasetFormat,
    pub title: Option<String>,
    pub tree: Tree,
    pub colorings: Vec<Coloring>,
}

impl Dataset {
    /// Colorings usable as a grouping trait. Continuous scales and genotype
    /// pseudo-traits may color arcs but never define demes.
    pub fn grouping_keys(&self) -> Vec<String> {
        self.colorings
            .iter()
            .filter(|c| !c.continuous && !crate::tree::is_genotype(&c.key))
            .map(|c| c.key.clone())
            .collect()
    }

    pub fn coloring(&self, key: &str) -> Option<&Coloring> {
        self.colorings.iter().find(|c| c.key == key)
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file: {}", path.display()))?;

    let dataset = match detect_format(&raw) {
        DatasetFormat::Json => parse_json(&raw)?,
        DatasetFormat::Newick => parse_newick(&raw)?,
    };

    if dataset.tree.nodes.is_empty() {
        bail!("dataset did not contain any tree nodes");
    }
    Ok(dataset)
}

fn detect_format(raw: &str) -> DatasetFormat {
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('{') {
            return DatasetFormat::Json;
        }
        break;
    }
    DatasetFormat::Newick
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    #[serde(default)]
    meta: Option<RawMeta>,
    tree: RawNode,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    colorings: Vec<RawColoring>,
}

#[derive(Debug, Deserialize)]
struct RawColoring {
    key: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    node_attrs: HashMap<String, Value>,
    #[serde(default)]
    children: Vec<RawNode>,
}

fn parse_json(raw: &str) -> Result<Dataset> {
    let parsed: RawDataset = serde_json::from_str(raw).context("invalid dataset JSON")?;

    let mut nodes = Vec::new();
    flatten(&parsed.tree, None, &mut nodes);
    let root = if nodes.is_empty() { None } else { Some(0) };
    let meta = parsed.meta;
    let title = meta.as_ref().and_then(|m| m.title.clone());
    let tree = Tree::new(title.clone(), nodes, root);

    let colorings = match meta {
        Some(meta) if !meta.colorings.is_empty() => meta
            .colorings
            .into_iter()
            .map(|c| Coloring {
                title: c.title.unwrap_or_else(|| c.key.clone()),
                continuous: c.kind.as_deref() == Some("continuous"),
                key: c.key,
            })
            .collect(),
        _ => derive_colorings(&tree),
    };

    Ok(Dataset {
        format: DatasetFormat::Json,
        title,
        tree,
        colorings,
    })
}

/// Flatten the recursive JSON tree into pre-order `Tree::nodes`, so array
/// indices are stable and parents always precede their children.
fn flatten(raw: &RawNode, parent: Option<usize>, nodes: &mut Vec<TreeNode>) {
    let idx = nodes.len();
    let mut node = TreeNode::new(idx, raw.name.clone());
    node.parent = parent;
    for (key, value) in &raw.node_attrs {
        if let Some(text) = attr_to_string(value) {
            node.set_attribute(key.clone(), text);
        }
    }
    nodes.push(node);

    for child in &raw.children {
        let child_idx = nodes.len();
        nodes[idx].children.push(child_idx);
        flatten(child, Some(idx), nodes);
    }
}

/// Auspice wraps attribute values as `{"value": ...}`; accept both that
/// shape and bare scalars.
fn attr_to_string(value: &Value) -> Option<String> {
    let inner = match value {
        Value::Object(map) => map.get("value")?,
        other => other,
    };
    match inner {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_newick(raw: &str) -> Result<Dataset> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("tree file is empty");
    }
    let phylo =
        PhyloTree::from_newick(candidate).context("failed to parse Newick tree")?;
    let tree = Tree::from_phylo(None, &phylo);
    let colorings = derive_colorings(&tree);
    Ok(Dataset {
        format: DatasetFormat::Newick,
        title: None,
        tree,
        colorings,
    })
}

/// Datasets without coloring metadata still get usable controls: every
/// categorical leaf trait becomes a coloring.
fn derive_colorings(tree: &Tree) -> Vec<Coloring> {
    tree.trait_keys()
        .into_iter()
        .map(|key| Coloring {
            title: key.clone(),
            key,
            continuous: false,
        })
        .collect()
}
