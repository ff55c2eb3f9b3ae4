use std::collections::HashMap;

use log::warn;

use super::color::{self, average_color};
use super::{geometry, Deme, GraphInputs, LayoutParams, Point};

/// Per-trait-value tip lists, in first-encountered (iteration) order. The
/// ordering is what makes positional coordinate reuse across rebuilds
/// meaningful.
struct StateBuckets {
    names: Vec<String>,
    all: Vec<Vec<usize>>,
    visible: Vec<Vec<usize>>,
}

fn bucket_tips(inputs: &GraphInputs) -> StateBuckets {
    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut all: Vec<Vec<usize>> = Vec::new();
    let mut visible: Vec<Vec<usize>> = Vec::new();

    for node in inputs.tree.leaves() {
        let Some(value) = node.trait_value(&inputs.view.grouping) else {
            continue; // missing trait: excluded, not an error
        };
        let slot = *index.entry(value.to_string()).or_insert_with(|| {
            names.push(value.to_string());
            all.push(Vec::new());
            visible.push(Vec::new());
            names.len() - 1
        });
        all[slot].push(node.array_idx);
        if inputs
            .visibility
            .get(node.array_idx)
            .is_some_and(|v| v.is_visible())
        {
            visible[slot].push(node.array_idx);
        }
    }

    StateBuckets {
        names,
        all,
        visible,
    }
}

/// `K / sqrt(max(sqrt(visible_tips * node_count), M))` — keeps the total
/// rendered area sublinear in tree size so huge trees remain legible.
pub fn deme_multiplier(inputs: &GraphInputs, params: LayoutParams) -> f32 {
    let visible_tips = inputs
        .tree
        .leaves()
        .filter(|n| {
            inputs
                .visibility
                .get(n.array_idx)
                .is_some_and(|v| v.is_visible())
        })
        .count();
    let node_count = inputs.tree.nodes.len();
    let divisor = ((visible_tips * node_count) as f32)
        .sqrt()
        .max(params.deme_count_minimum);
    params.deme_count_multiplier / divisor.sqrt()
}

/// Full rebuild of the deme set for the active grouping trait.
///
/// When `existing_coords` is supplied and its length matches the new deme
/// count, coordinates are reused positionally (stable bucket iteration order
/// makes this correspondence hold); a mismatch is recoverable — it logs and
/// falls back to fresh circular placement.
pub fn compute_demes(
    inputs: &GraphInputs,
    params: LayoutParams,
    width: f32,
    height: f32,
    existing_coords: Option<&[Point]>,
) -> Vec<Deme> {
    let buckets = bucket_tips(inputs);
    let n = buckets.names.len();
    let multiplier = deme_multiplier(inputs, params);

    let coords: Vec<Point> = match existing_coords {
        Some(existing) if existing.len() == n => existing.to_vec(),
        Some(existing) => {
            warn!(
                "existing coordinate count {} does not match {} deme(s); recomputing placement",
                existing.len(),
                n
            );
            geometry::circular_coordinates(width, height, n)
        }
        None => geometry::circular_coordinates(width, height, n),
    };

    let mut demes = Vec::with_capacity(n);
    for (idx, name) in buckets.names.iter().enumerate() {
        let visible = &buckets.visible[idx];
        let mut deme = Deme {
            name: name.clone(),
            count: visible.len(),
            total_count: buckets.all[idx].len(),
            position: coords[idx],
            arcs: Vec::new(),
        };
        deme.arcs = build_deme_arcs(inputs, visible, idx);
        let radius = (deme.count as f32).sqrt() * multiplier;
        for arc in &mut deme.arcs {
            arc.outer_radius = radius;
        }
        demes.push(deme);
    }
    demes
}

/// Visibility-only update: recount tips and re-derive arcs/radii in place,
/// leaving positions untouched so the running simulation stays continuous.
pub fn update_demes_in_place(demes: &mut [Deme], inputs: &GraphInputs, params: LayoutParams) {
    let buckets = bucket_tips(inputs);
    if buckets.names.len() != demes.len() {
        warn!(
            "cannot update {} deme(s) in place from {} trait value(s); skipping",
            demes.len(),
            buckets.names.len()
        );
        return;
    }

    let multiplier = deme_multiplier(inputs, params);
    for (idx, deme) in demes.iter_mut().enumerate() {
        let slot = buckets
            .names
            .iter()
            .position(|n| *n == deme.name)
            .unwrap_or(idx);
        let visible = &buckets.visible[slot];
        deme.count = visible.len();
        deme.total_count = buckets.all[slot].len();
        deme.arcs = build_deme_arcs(inputs, visible, idx);
        let radius = (deme.count as f32).sqrt() * multiplier;
        for arc in &mut deme.arcs {
            arc.outer_radius = radius;
        }
    }
}

/// Grouping == coloring trait, or a continuous scale: one blended
/// full-circle arc. Otherwise one pie slice per non-empty legend bucket.
fn build_deme_arcs(inputs: &GraphInputs, visible: &[usize], parent: usize) -> Vec<super::DemeArc> {
    if inputs.view.grouping == inputs.scale.key || inputs.scale.continuous {
        vec![color::full_circle_arc(
            average_color(visible, inputs.node_colors),
            parent,
        )]
    } else {
        color::build_arcs(visible, inputs.scale, inputs.tree, parent)
    }
}
