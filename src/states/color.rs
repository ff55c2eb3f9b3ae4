use eframe::egui::Color32;

use super::{DemeArc, DemeIdx};
use crate::tree::Tree;

/// Categorical palette, cycled when a legend has more values.
const PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x4c, 0x78, 0xa8),
    Color32::from_rgb(0xf5, 0x85, 0x18),
    Color32::from_rgb(0xe4, 0x57, 0x56),
    Color32::from_rgb(0x72, 0xb7, 0xb2),
    Color32::from_rgb(0x54, 0xa2, 0x4b),
    Color32::from_rgb(0xee, 0xca, 0x3b),
    Color32::from_rgb(0xb2, 0x79, 0xa2),
    Color32::from_rgb(0xff, 0x9d, 0xa6),
    Color32::from_rgb(0x9d, 0x75, 0x5d),
    Color32::from_rgb(0xba, 0xb0, 0xac),
];

/// Color for nodes whose coloring trait is missing, and for demes with no
/// visible tips.
pub const MISSING_COLOR: Color32 = Color32::from_rgb(0xad, 0xb1, 0xb3);

/// Assigns a display color to every node for the active coloring trait, and
/// carries the ordered legend buckets used for pie-chart arcs.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    pub key: String,
    pub continuous: bool,
    pub legend: Vec<String>,
}

impl ColorScale {
    /// Build a scale for `key`. Legend buckets are the sorted distinct leaf
    /// values, which keeps bucket ordering stable across rebuilds.
    pub fn new(tree: &Tree, key: &str, continuous: bool) -> Self {
        let mut legend = Vec::new();
        for node in tree.leaves() {
            if let Some(value) = node.trait_value(key) {
                if !legend.iter().any(|v| v == value) {
                    legend.push(value.to_string());
                }
            }
        }
        legend.sort();
        Self {
            key: key.to_string(),
            continuous,
            legend,
        }
    }

    /// Per-node color array parallel to `tree.nodes`.
    pub fn node_colors(&self, tree: &Tree) -> Vec<Color32> {
        if self.continuous {
            let (lo, hi) = self.numeric_range(tree);
            tree.nodes
                .iter()
                .map(|node| {
                    node.trait_value(&self.key)
                        .and_then(|v| v.parse::<f64>().ok())
                        .map(|v| continuous_color(v, lo, hi))
                        .unwrap_or(MISSING_COLOR)
                })
                .collect()
        } else {
            tree.nodes
                .iter()
                .map(|node| {
                    node.trait_value(&self.key)
                        .and_then(|v| self.legend.iter().position(|l| l == v))
                        .map(|i| PALETTE[i % PALETTE.len()])
                        .unwrap_or(MISSING_COLOR)
                })
                .collect()
        }
    }

    pub fn legend_color(&self, bucket: usize) -> Color32 {
        PALETTE[bucket % PALETTE.len()]
    }

    fn numeric_range(&self, tree: &Tree) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for node in tree.leaves() {
            if let Some(v) = node.trait_value(&self.key).and_then(|v| v.parse::<f64>().ok()) {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if lo.is_finite() && hi.is_finite() {
            (lo, hi)
        } else {
            (0.0, 1.0)
        }
    }
}

fn continuous_color(value: f64, lo: f64, hi: f64) -> Color32 {
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0) as f32
    } else {
        0.5
    };
    let cold = Color32::from_rgb(0x44, 0x6e, 0xd8);
    let hot = Color32::from_rgb(0xd8, 0x5a, 0x3a);
    lerp_color(cold, hot, t)
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let mix = |x: u8, y: u8| -> u8 { (x as f32 + (y as f32 - x as f32) * t).round() as u8 };
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

/// Channel-wise mean of the given nodes' assigned colors. Used for blended
/// full-circle demes (continuous scales, or grouping == coloring).
pub fn average_color(node_idxs: &[usize], node_colors: &[Color32]) -> Color32 {
    if node_idxs.is_empty() {
        return MISSING_COLOR;
    }
    let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
    for &idx in node_idxs {
        let c = node_colors.get(idx).copied().unwrap_or(MISSING_COLOR);
        r += c.r() as u32;
        g += c.g() as u32;
        b += c.b() as u32;
    }
    let n = node_idxs.len() as u32;
    Color32::from_rgb((r / n) as u8, (g / n) as u8, (b / n) as u8)
}

/// Build the pie-slice arcs for one deme: one arc per non-empty legend
/// bucket, angle spans proportional to bucket size. Bucket order is legend
/// order, so arc ordering is stable across rebuilds and color-only updates.
/// The final end angle is pinned to exactly 2π so a deme's arcs always
/// partition the full circle.
pub fn build_arcs(
    visible: &[usize],
    scale: &ColorScale,
    tree: &Tree,
    parent: DemeIdx,
) -> Vec<DemeArc> {
    let tau = std::f32::consts::TAU;

    let mut counts = vec![0usize; scale.legend.len()];
    for &idx in visible {
        if let Some(bucket) = tree.nodes[idx]
            .trait_value(&scale.key)
            .and_then(|v| scale.legend.iter().position(|l| l == v))
        {
            counts[bucket] += 1;
        }
    }

    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![full_circle_arc(MISSING_COLOR, parent)];
    }

    let mut arcs = Vec::new();
    let mut angle = 0.0f32;
    let non_empty = counts.iter().filter(|&&c| c > 0).count();
    for (bucket, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let span = tau * count as f32 / total as f32;
        let end = if arcs.len() + 1 == non_empty {
            tau
        } else {
            angle + span
        };
        arcs.push(DemeArc {
            inner_radius: 0.0,
            outer_radius: 0.0,
            start_angle: angle,
            end_angle: end,
            color: scale.legend_color(bucket),
            parent,
        });
        angle = end;
    }
    arcs
}

/// A plain circle modelled as a single arc spanning `[0, 2π)`.
pub fn full_circle_arc(color: Color32, parent: DemeIdx) -> DemeArc {
    DemeArc {
        inner_radius: 0.0,
        outer_radius: 0.0,
        start_angle: 0.0,
        end_angle: std::f32::consts::TAU,
        color,
        parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::small_tree;

    fn country_tree() -> Tree {
        small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("country", "A"), ("country", "A"), ("country", "B")],
        )
    }

    #[test]
    fn test_legend_is_sorted_distinct_values() {
        let tree = country_tree();
        let scale = ColorScale::new(&tree, "country", false);
        assert_eq!(scale.legend, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_node_colors_follow_legend() {
        let tree = country_tree();
        let scale = ColorScale::new(&tree, "country", false);
        let colors = scale.node_colors(&tree);
        assert_eq!(colors.len(), tree.nodes.len());
        assert_eq!(colors[1], colors[3]); // both country A
        assert_ne!(colors[1], colors[4]); // A vs B
        assert_eq!(colors[0], MISSING_COLOR); // internal node, no trait
    }

    #[test]
    fn test_average_color() {
        let colors = vec![
            Color32::from_rgb(0, 0, 0),
            Color32::from_rgb(100, 200, 50),
        ];
        assert_eq!(average_color(&[0, 1], &colors), Color32::from_rgb(50, 100, 25));
        assert_eq!(average_color(&[], &colors), MISSING_COLOR);
    }

    #[test]
    fn test_arcs_partition_full_circle() {
        let tree = country_tree();
        let scale = ColorScale::new(&tree, "country", false);
        let arcs = build_arcs(&[1, 3, 4], &scale, &tree, 0);
        assert_eq!(arcs.len(), 2);

        let span: f32 = arcs.iter().map(|a| a.end_angle - a.start_angle).sum();
        assert!((span - std::f32::consts::TAU).abs() < 1e-5);
        assert_eq!(arcs[0].start_angle, 0.0);
        assert_eq!(arcs.last().unwrap().end_angle, std::f32::consts::TAU);
        // A holds 2 of 3 tips.
        let a_span = arcs[0].end_angle - arcs[0].start_angle;
        assert!((a_span - std::f32::consts::TAU * 2.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_arcs_empty_visible_set() {
        let tree = country_tree();
        let scale = ColorScale::new(&tree, "country", false);
        let arcs = build_arcs(&[], &scale, &tree, 3);
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].color, MISSING_COLOR);
        assert_eq!(arcs[0].parent, 3);
        assert_eq!(arcs[0].end_angle, std::f32::consts::TAU);
    }

    #[test]
    fn test_continuous_scale_gradient() {
        let tree = small_tree(
            &[2000.0, 2001.0, 2000.5, 2002.0, 2003.0],
            &[("titer", "0.0"), ("titer", "5.0"), ("titer", "10.0")],
        );
        let scale = ColorScale::new(&tree, "titer", true);
        let colors = scale.node_colors(&tree);
        assert_ne!(colors[1], colors[4]);
        // Midpoint value sits between the extremes on the red channel.
        assert!(colors[1].r() < colors[3].r());
        assert!(colors[3].r() < colors[4].r());
    }
}
