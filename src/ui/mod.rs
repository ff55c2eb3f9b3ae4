use crate::app::AppConfig;
use crate::io::Dataset;
use crate::states::color::ColorScale;
use crate::states::recompute::{RecomputeKind, RecomputePlan, ViewState};
use crate::states::{GraphInputs, LayoutParams, StateGraph};

/// Print a summary of the dataset and run one full layout pass so headless
/// invocations still exercise the whole pipeline.
pub fn render_preview(dataset: &Dataset, config: &AppConfig) {
    println!(
        "Loaded {:?} dataset{} with {} node(s), {} tip(s).",
        dataset.format,
        dataset
            .title
            .as_deref()
            .map(|t| format!(" \"{}\"", t))
            .unwrap_or_default(),
        dataset.tree.nodes.len(),
        dataset.tree.leaf_count(),
    );

    let groupings = dataset.grouping_keys();
    let Some(grouping) = groupings.first() else {
        println!("No categorical trait available for grouping; nothing to lay out.");
        return;
    };
    println!(
        "Available groupings: {} (using \"{}\").",
        groupings.join(", "),
        grouping
    );

    let (date_min, date_max) = dataset.tree.date_range().unwrap_or((0.0, 0.0));
    let view = ViewState {
        grouping: grouping.clone(),
        coloring: grouping.clone(),
        date_min,
        date_max,
        show_transmissions: true,
    };

    let visibility = dataset.tree.visibility(date_min, date_max);
    let scale = ColorScale::new(&dataset.tree, &view.coloring, false);
    let node_colors = scale.node_colors(&dataset.tree);
    let inputs = GraphInputs {
        tree: &dataset.tree,
        visibility: &visibility,
        node_colors: &node_colors,
        scale: &scale,
        view: &view,
    };

    let mut graph = StateGraph::new(
        LayoutParams::default(),
        config.width as f32,
        config.height as f32,
    );
    graph.apply(
        RecomputePlan {
            kind: RecomputeKind::Everything,
            transmission_toggle: false,
        },
        &inputs,
    );

    println!(
        "Laid out {} deme(s) and {} transmission(s) at {}x{} px.",
        graph.demes.len(),
        graph.transmissions.len(),
        config.width,
        config.height
    );

    for deme in graph.demes.iter().take(10) {
        println!(
            "- {:<20} {:>5} tip(s) at ({:.0}, {:.0})",
            deme.name, deme.count, deme.position.x, deme.position.y
        );
    }
    if graph.demes.len() > 10 {
        println!("... ({} more deme(s) omitted)", graph.demes.len() - 10);
    }
}
