use std::collections::HashMap;

use phylotree::tree::{Node as PhyloNode, Tree as PhyloTree};

/// Per-node draw visibility, parallel to `Tree::nodes`.
///
/// Leaves inside the active date window are `Visible`; internal nodes whose
/// subtree contains a visible leaf are `VisibleToMapOnly` (they are never
/// drawn as tips but their edges still participate in transmissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    NotVisible,
    VisibleToMapOnly,
    Visible,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self != Visibility::NotVisible
    }
}

/// The attribute carrying each node's numeric date (decimal year).
pub const NUM_DATE: &str = "num_date";

/// Genotype colorings are a pseudo-trait: they resolve through the same
/// attribute map but are never offered as a grouping trait.
pub fn is_genotype(key: &str) -> bool {
    key.starts_with("gt-")
}

/// Flattened phylogenetic tree with an explicit ordered node list.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub name: Option<String>,
    pub nodes: Vec<TreeNode>,
    pub root: Option<usize>,
}

/// Node within a flattened tree. `array_idx` equals the node's position in
/// `Tree::nodes` and indexes every parallel array (visibility, colors).
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub array_idx: usize,
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub attributes: HashMap<String, String>,
}

impl TreeNode {
    pub fn new(array_idx: usize, name: Option<String>) -> Self {
        Self {
            array_idx,
            name,
            parent: None,
            children: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve a categorical trait value. Empty strings count as missing.
    pub fn trait_value(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn num_date(&self) -> Option<f64> {
        self.attributes.get(NUM_DATE).and_then(|s| s.parse().ok())
    }

    pub fn set_attribute(&mut self, key: String, value: String) {
        self.attributes.insert(key, value);
    }
}

impl Tree {
    pub fn new(name: Option<String>, nodes: Vec<TreeNode>, root: Option<usize>) -> Self {
        Self { name, nodes, root }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Distinct categorical trait keys among leaves, sorted. Dates and
    /// genotype pseudo-traits are excluded.
    pub fn trait_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for node in self.leaves() {
            for key in node.attributes.keys() {
                if key == NUM_DATE || is_genotype(key) {
                    continue;
                }
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.clone());
                }
            }
        }
        keys.sort();
        keys
    }

    /// Min/max `num_date` across all nodes carrying one.
    pub fn date_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for node in &self.nodes {
            if let Some(date) = node.num_date() {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(date), hi.max(date)),
                    None => (date, date),
                });
            }
        }
        range
    }

    /// Compute the per-node visibility array for a numeric date window.
    /// Nodes without a date are treated as always in-window.
    pub fn visibility(&self, date_min: f64, date_max: f64) -> Vec<Visibility> {
        let mut visibility = vec![Visibility::NotVisible; self.nodes.len()];

        for node in self.leaves() {
            let in_window = match node.num_date() {
                Some(date) => date >= date_min && date <= date_max,
                None => true,
            };
            if in_window {
                visibility[node.array_idx] = Visibility::Visible;
            }
        }

        fn propagate(tree: &Tree, idx: usize, visibility: &mut [Visibility]) -> bool {
            let node = &tree.nodes[idx];
            if node.is_leaf() {
                return visibility[idx].is_visible();
            }
            let mut any = false;
            for &child in &node.children {
                any |= propagate(tree, child, visibility);
            }
            if any {
                visibility[idx] = Visibility::VisibleToMapOnly;
            }
            any
        }

        if let Some(root) = self.root {
            propagate(self, root, &mut visibility);
        }

        visibility
    }

    /// Build a flattened tree from a parsed Newick tree. Branch lengths are
    /// accumulated into a divergence-based `num_date` so the date window
    /// still works for trees without explicit dates.
    pub fn from_phylo(name: Option<String>, phylo: &PhyloTree) -> Self {
        let mut nodes = Vec::with_capacity(phylo.size());
        for idx in 0..phylo.size() {
            match phylo.get(&idx) {
                Ok(node) => nodes.push(Self::node_from_phylo(node)),
                Err(_) => nodes.push(TreeNode::new(idx, None)),
            }
        }

        let root = phylo.get_root().ok();
        let mut tree = Tree::new(name, nodes, root);

        if let Some(root) = tree.root {
            let mut divergence = vec![0.0f64; tree.nodes.len()];
            fn accumulate(
                tree: &Tree,
                phylo: &PhyloTree,
                idx: usize,
                depth: f64,
                divergence: &mut [f64],
            ) {
                divergence[idx] = depth;
                for &child in &tree.nodes[idx].children {
                    let length = phylo
                        .get(&child)
                        .ok()
                        .and_then(|n| n.parent_edge)
                        .unwrap_or(1.0);
                    accumulate(tree, phylo, child, depth + length, divergence);
                }
            }
            accumulate(&tree, phylo, root, 0.0, &mut divergence);
            for (idx, depth) in divergence.iter().enumerate() {
                tree.nodes[idx].set_attribute(NUM_DATE.to_string(), format!("{depth}"));
            }
        }

        tree
    }

    fn node_from_phylo(node: &PhyloNode) -> TreeNode {
        let mut tree_node = TreeNode::new(node.id, node.name.clone());
        tree_node.parent = node.parent;
        tree_node.children = node.children.clone();
        tree_node
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Tree shape: root (0) -> leaf (1), internal (2) -> leaf (3), leaf (4).
    /// `traits` supplies (key, value) for leaves 1, 3 and 4 in that order.
    pub(crate) fn small_tree(dates: &[f64], traits: &[(&str, &str)]) -> Tree {
        let mut nodes: Vec<TreeNode> = (0..5).map(|i| TreeNode::new(i, None)).collect();
        nodes[0].children = vec![1, 2];
        nodes[2].children = vec![3, 4];
        nodes[1].parent = Some(0);
        nodes[2].parent = Some(0);
        nodes[3].parent = Some(2);
        nodes[4].parent = Some(2);
        for (idx, node) in nodes.iter_mut().enumerate() {
            node.set_attribute(NUM_DATE.to_string(), format!("{}", dates[idx]));
        }
        for (i, &leaf) in [1usize, 3, 4].iter().enumerate() {
            let (key, value) = traits[i];
            if !value.is_empty() {
                nodes[leaf].set_attribute(key.to_string(), value.to_string());
            }
        }
        Tree::new(None, nodes, Some(0))
    }

    #[test]
    fn test_leaf_count_and_traits() {
        let tree = small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("country", "A"), ("country", "A"), ("country", "B")],
        );
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.trait_keys(), vec!["country".to_string()]);
        assert_eq!(tree.nodes[1].trait_value("country"), Some("A"));
        assert_eq!(tree.nodes[0].trait_value("country"), None);
    }

    #[test]
    fn test_visibility_window() {
        let tree = small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("country", "A"), ("country", "A"), ("country", "B")],
        );
        let visibility = tree.visibility(2001.5, 2002.5);
        assert_eq!(visibility[1], Visibility::NotVisible);
        assert_eq!(visibility[3], Visibility::Visible);
        assert_eq!(visibility[4], Visibility::NotVisible);
        // Internal nodes above a visible leaf are map-visible.
        assert_eq!(visibility[2], Visibility::VisibleToMapOnly);
        assert_eq!(visibility[0], Visibility::VisibleToMapOnly);
    }

    #[test]
    fn test_date_range() {
        let tree = small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("country", "A"), ("country", "A"), ("country", "B")],
        );
        assert_eq!(tree.date_range(), Some((2000.0, 2003.0)));
    }

    #[test]
    fn test_genotype_keys_excluded() {
        let mut tree = small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("country", "A"), ("country", "A"), ("country", "B")],
        );
        tree.nodes[1].set_attribute("gt-nuc_42".to_string(), "A".to_string());
        assert_eq!(tree.trait_keys(), vec!["country".to_string()]);
        assert!(is_genotype("gt-nuc_42"));
        assert!(!is_genotype("country"));
    }
}
