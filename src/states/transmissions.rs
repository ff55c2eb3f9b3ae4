use std::collections::HashMap;

use log::debug;

use super::{geometry, Deme, GraphInputs, Transmission};

/// Walk every parent→child edge and emit one transmission per edge whose
/// endpoints resolve to different grouping-trait values.
///
/// `extend` is the 1-based running count of transmissions already seen for
/// the same ordered (origin, destination) pair; A→B and B→A count
/// independently. The pass deliberately ignores visibility — hiding nodes
/// only clips curves at draw time, so toggling the date window never forces
/// this set to be rebuilt.
pub fn compute_transmissions(inputs: &GraphInputs, demes: &[Deme]) -> Vec<Transmission> {
    let mut transmissions = Vec::new();
    if !inputs.view.show_transmissions {
        return transmissions;
    }

    let deme_index: HashMap<&str, usize> = demes
        .iter()
        .enumerate()
        .map(|(idx, d)| (d.name.as_str(), idx))
        .collect();

    let mut pair_counts: HashMap<(String, String), u32> = HashMap::new();
    let grouping = inputs.view.grouping.as_str();

    for node in &inputs.tree.nodes {
        let Some(origin_value) = node.trait_value(grouping) else {
            continue;
        };
        for &child_idx in &node.children {
            let child = &inputs.tree.nodes[child_idx];
            let Some(destination_value) = child.trait_value(grouping) else {
                continue;
            };
            if origin_value == destination_value {
                continue;
            }

            let (Some(&origin_deme), Some(&destination_deme)) = (
                deme_index.get(origin_value),
                deme_index.get(destination_value),
            ) else {
                // Ancestral state with no corresponding tip deme.
                debug!("skipping transition {origin_value} -> {destination_value}: no deme");
                continue;
            };

            let extend = pair_counts
                .entry((origin_value.to_string(), destination_value.to_string()))
                .and_modify(|c| *c += 1)
                .or_insert(1);
            let extend = *extend;

            let origin_num_date = node.num_date().unwrap_or(0.0);
            let destination_num_date = child.num_date().unwrap_or(0.0);

            let bezier_curve = geometry::bezier(
                demes[origin_deme].position,
                demes[destination_deme].position,
                extend,
            );
            let bezier_dates = interpolate_dates(
                origin_num_date,
                destination_num_date,
                bezier_curve.len(),
            );

            transmissions.push(Transmission {
                origin_name: origin_value.to_string(),
                destination_name: destination_value.to_string(),
                origin_deme,
                destination_deme,
                destination_node: child_idx,
                extend,
                bezier_curve,
                bezier_dates,
                origin_num_date,
                destination_num_date,
                color: inputs
                    .node_colors
                    .get(node.array_idx)
                    .copied()
                    .unwrap_or(super::color::MISSING_COLOR),
            });
        }
    }

    transmissions
}

/// Recompute every curve from the live endpoint deme positions. Called once
/// per simulation tick; a straight recomputation is the dominant per-tick
/// cost but keeps the update trivially correct.
pub fn refresh_curves(transmissions: &mut [Transmission], demes: &[Deme]) {
    for transmission in transmissions {
        let (Some(origin), Some(destination)) = (
            demes.get(transmission.origin_deme),
            demes.get(transmission.destination_deme),
        ) else {
            continue;
        };
        transmission.bezier_curve =
            geometry::bezier(origin.position, destination.position, transmission.extend);
    }
}

/// One date per curve point, linearly interpolated index-proportionally.
fn interpolate_dates(origin: f64, destination: f64, len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![origin; len];
    }
    (0..len)
        .map(|i| {
            let t = i as f64 / (len - 1) as f64;
            origin + (destination - origin) * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::color::ColorScale;
    use crate::states::recompute::ViewState;
    use crate::states::{demes::compute_demes, LayoutParams};
    use crate::tree::{Tree, TreeNode, Visibility, NUM_DATE};

    /// Build a tree from (parent, trait, date) triples; index 0 is the root.
    fn tree_from(entries: &[(Option<usize>, &str, f64)]) -> Tree {
        let mut nodes: Vec<TreeNode> = entries
            .iter()
            .enumerate()
            .map(|(idx, &(parent, value, date))| {
                let mut node = TreeNode::new(idx, None);
                node.parent = parent;
                if !value.is_empty() {
                    node.set_attribute("country".to_string(), value.to_string());
                }
                node.set_attribute(NUM_DATE.to_string(), format!("{date}"));
                node
            })
            .collect();
        for idx in 0..entries.len() {
            if let Some(parent) = entries[idx].0 {
                nodes[parent].children.push(idx);
            }
        }
        Tree::new(None, nodes, Some(0))
    }

    fn setup(tree: &Tree) -> (Vec<Visibility>, ColorScale, Vec<eframe::egui::Color32>) {
        let visibility = vec![Visibility::Visible; tree.nodes.len()];
        let scale = ColorScale::new(tree, "country", false);
        let colors = scale.node_colors(tree);
        (visibility, scale, colors)
    }

    fn view() -> ViewState {
        ViewState {
            grouping: "country".to_string(),
            coloring: "country".to_string(),
            date_min: f64::NEG_INFINITY,
            date_max: f64::INFINITY,
            show_transmissions: true,
        }
    }

    fn build(tree: &Tree, view: &ViewState) -> (Vec<Deme>, Vec<Transmission>) {
        let (visibility, scale, colors) = setup(tree);
        let inputs = GraphInputs {
            tree,
            visibility: &visibility,
            node_colors: &colors,
            scale: &scale,
            view,
        };
        let demes = compute_demes(&inputs, LayoutParams::default(), 800.0, 600.0, None);
        let transmissions = compute_transmissions(&inputs, &demes);
        (demes, transmissions)
    }

    #[test]
    fn test_single_transition_detected() {
        // root A with children A->B and A->A: exactly one transmission.
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2001.0),
            (Some(0), "A", 2001.5),
        ]);
        let (_, transmissions) = build(&tree, &view());
        assert_eq!(transmissions.len(), 1);
        assert_eq!(transmissions[0].origin_name, "A");
        assert_eq!(transmissions[0].destination_name, "B");
        assert_eq!(transmissions[0].extend, 1);
        assert_eq!(transmissions[0].destination_node, 1);
    }

    #[test]
    fn test_extend_sequences_per_ordered_pair() {
        // Two A->B edges in traversal order, one B->A elsewhere.
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2001.0), // A->B, extend 1
            (Some(0), "A", 2000.5),
            (Some(2), "B", 2002.0), // A->B, extend 2
            (Some(1), "A", 2003.0), // B->A, its own extend 1
        ]);
        let (_, transmissions) = build(&tree, &view());
        assert_eq!(transmissions.len(), 3);

        let forward: Vec<u32> = transmissions
            .iter()
            .filter(|t| t.origin_name == "A")
            .map(|t| t.extend)
            .collect();
        assert_eq!(forward, vec![1, 2]);

        let reverse: Vec<u32> = transmissions
            .iter()
            .filter(|t| t.origin_name == "B")
            .map(|t| t.extend)
            .collect();
        assert_eq!(reverse, vec![1]);
    }

    #[test]
    fn test_dates_interpolated_across_curve() {
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2010.0),
            (Some(0), "A", 2000.0),
        ]);
        let (_, transmissions) = build(&tree, &view());
        assert_eq!(transmissions.len(), 1);
        let t = &transmissions[0];
        assert_eq!(t.bezier_dates.len(), t.bezier_curve.len());
        assert_eq!(t.bezier_dates[0], 2000.0);
        assert_eq!(*t.bezier_dates.last().unwrap(), 2010.0);
        // Monotone between the endpoint dates.
        for pair in t.bezier_dates.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_toggle_off_yields_empty() {
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2001.0),
            (Some(0), "A", 2000.0),
        ]);
        let mut v = view();
        v.show_transmissions = false;
        let (_, transmissions) = build(&tree, &v);
        assert!(transmissions.is_empty());
    }

    #[test]
    fn test_unresolved_endpoint_skipped() {
        let tree = tree_from(&[
            (None, "", 2000.0), // no trait on root
            (Some(0), "B", 2001.0),
            (Some(0), "A", 2001.0),
        ]);
        let (_, transmissions) = build(&tree, &view());
        assert!(transmissions.is_empty());
    }

    #[test]
    fn test_curves_anchor_on_demes_and_refresh() {
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2001.0),
            (Some(0), "A", 2000.0),
        ]);
        let (mut demes, mut transmissions) = build(&tree, &view());
        assert_eq!(transmissions.len(), 1);
        let t = &transmissions[0];
        assert!(t.bezier_curve[0].distance(demes[t.origin_deme].position) < 1e-3);

        // Move the origin deme and refresh: the curve follows.
        let origin = t.origin_deme;
        demes[origin].position = super::super::Point::new(5.0, 5.0);
        refresh_curves(&mut transmissions, &demes);
        let t = &transmissions[0];
        assert!(t.bezier_curve[0].distance(demes[origin].position) < 1e-3);
    }

    #[test]
    fn test_color_comes_from_origin_node() {
        let tree = tree_from(&[
            (None, "A", 2000.0),
            (Some(0), "B", 2001.0),
            (Some(0), "A", 2000.0),
        ]);
        let (_, _, colors) = setup(&tree);
        let (_, transmissions) = build(&tree, &view());
        assert_eq!(transmissions.len(), 1);
        assert_eq!(transmissions[0].color, colors[0]);
        assert_ne!(transmissions[0].color, colors[1]);
    }
}
