use std::path::PathBuf;

use eframe::egui::{self, Color32};
use log::{error, info};
use rfd::FileDialog;

use crate::app::AppConfig;
use crate::io::{self, Dataset};
use crate::states::color::ColorScale;
use crate::states::painter::StatesPainter;
use crate::states::recompute::{self, RecomputeKind, RecomputePlan, ViewState};
use crate::states::{GraphInputs, StateGraph};
use crate::tree::Visibility;

/// Per-dataset state: the dataset itself plus the derived arrays the layout
/// pipeline consumes. Rebuilt wholesale whenever a new file is opened.
struct LoadedDataset {
    dataset: Dataset,
    view: ViewState,
    /// The view snapshot the graph was last computed from. `None` forces a
    /// full rebuild on the next frame.
    applied: Option<ViewState>,
    date_bounds: (f64, f64),
    scale: ColorScale,
    node_colors: Vec<Color32>,
    visibility: Vec<Visibility>,
}

impl LoadedDataset {
    fn new(dataset: Dataset) -> Self {
        let default_key = dataset
            .grouping_keys()
            .into_iter()
            .next()
            .or_else(|| dataset.colorings.first().map(|c| c.key.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        let date_bounds = dataset.tree.date_range().unwrap_or((0.0, 0.0));
        let view = ViewState {
            grouping: default_key.clone(),
            coloring: default_key,
            date_min: date_bounds.0,
            date_max: date_bounds.1,
            show_transmissions: true,
        };
        Self {
            dataset,
            view,
            applied: None,
            date_bounds,
            // Placeholder until the first refresh_derived() call.
            scale: ColorScale::new(&crate::tree::Tree::default(), "", false),
            node_colors: Vec::new(),
            visibility: Vec::new(),
        }
    }

    /// Refresh the derived arrays from the current view selection.
    fn refresh_derived(&mut self) {
        let tree = &self.dataset.tree;
        let continuous = self
            .dataset
            .coloring(&self.view.coloring)
            .map(|c| c.continuous)
            .unwrap_or(false);
        self.scale = ColorScale::new(tree, &self.view.coloring, continuous);
        self.node_colors = self.scale.node_colors(tree);
        self.visibility = tree.visibility(self.view.date_min, self.view.date_max);
    }
}

pub struct DemeGraphGui {
    config: AppConfig,
    loaded: Option<LoadedDataset>,
    graph: StateGraph,
    painter: StatesPainter,
    canvas_size: Option<egui::Vec2>,
    status: String,
    last_error: Option<String>,
}

impl DemeGraphGui {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let graph = StateGraph::new(
            config.layout_params(),
            config.width as f32,
            config.height as f32,
        );
        let mut app = Self {
            config,
            loaded: None,
            graph,
            painter: StatesPainter::default(),
            canvas_size: None,
            status: String::from("Open a dataset to begin."),
            last_error: None,
        };

        if let Some(path) = app.config.dataset_path.clone() {
            if let Err(err) = app.load_from_path(path) {
                app.last_error = Some(err);
            }
        }
        app
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = FileDialog::new()
            .add_filter("Datasets", &["json", "tree", "tre", "newick", "nwk"])
            .pick_file()
        {
            if let Err(err) = self.load_from_path(path) {
                self.last_error = Some(err);
            }
        }
    }

    fn load_from_path(&mut self, path: PathBuf) -> Result<(), String> {
        match io::load_dataset(&path) {
            Ok(dataset) => {
                info!(
                    "loaded dataset from {} ({} node(s))",
                    path.display(),
                    dataset.tree.nodes.len()
                );
                self.status = format!(
                    "{} tip(s) from {}",
                    dataset.tree.leaf_count(),
                    path.display()
                );
                self.loaded = Some(LoadedDataset::new(dataset));
                self.last_error = None;
                self.config.dataset_path = Some(path);
                Ok(())
            }
            Err(err) => {
                error!("failed to load {}: {:#}", path.display(), err);
                Err(format!("{:#}", err))
            }
        }
    }

    /// Re-run the minimal slice of the pipeline when the view selection
    /// diverged from what the graph was computed with.
    fn sync_graph(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if loaded.applied.as_ref() == Some(&loaded.view) {
            return;
        }

        let plan = match &loaded.applied {
            Some(prev) => recompute::classify(prev, &loaded.view),
            None => RecomputePlan {
                kind: RecomputeKind::Everything,
                transmission_toggle: false,
            },
        };
        loaded.refresh_derived();
        loaded.applied = Some(loaded.view.clone());

        let inputs = GraphInputs {
            tree: &loaded.dataset.tree,
            visibility: &loaded.visibility,
            node_colors: &loaded.node_colors,
            scale: &loaded.scale,
            view: &loaded.view,
        };
        self.graph.apply(plan, &inputs);
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("controls_panel")
            .default_width(230.0)
            .show(ctx, |ui| {
                ui.heading("Controls");
                ui.separator();

                let Some(loaded) = self.loaded.as_mut() else {
                    ui.label("No dataset loaded.");
                    return;
                };

                let groupings = loaded.dataset.grouping_keys();
                egui::ComboBox::from_label("Group by")
                    .selected_text(loaded.view.grouping.clone())
                    .show_ui(ui, |ui| {
                        for key in &groupings {
                            ui.selectable_value(&mut loaded.view.grouping, key.clone(), key);
                        }
                    });

                egui::ComboBox::from_label("Color by")
                    .selected_text(loaded.view.coloring.clone())
                    .show_ui(ui, |ui| {
                        for coloring in &loaded.dataset.colorings {
                            ui.selectable_value(
                                &mut loaded.view.coloring,
                                coloring.key.clone(),
                                &coloring.title,
                            );
                        }
                    });

                ui.separator();
                let (lo, hi) = loaded.date_bounds;
                if hi > lo {
                    ui.label("Date window");
                    if ui
                        .add(egui::Slider::new(&mut loaded.view.date_min, lo..=hi).text("from"))
                        .changed()
                    {
                        loaded.view.date_max = loaded.view.date_max.max(loaded.view.date_min);
                    }
                    if ui
                        .add(egui::Slider::new(&mut loaded.view.date_max, lo..=hi).text("to"))
                        .changed()
                    {
                        loaded.view.date_min = loaded.view.date_min.min(loaded.view.date_max);
                    }
                }

                ui.separator();
                ui.checkbox(&mut loaded.view.show_transmissions, "Show transmissions");
            });
    }
}

impl eframe::App for DemeGraphGui {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        self.open_file_dialog();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        self.side_panel(ctx);

        egui::TopBottomPanel::bottom("demegraph_status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                if self.graph.simulation.state().is_moving() {
                    ui.separator();
                    ui.label("laying out...");
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(err) = &self.last_error {
                ui.colored_label(Color32::from_rgb(200, 0, 0), format!("Error: {err}"));
            }
            if self.loaded.is_none() {
                ui.label("Open an annotated tree (JSON) or Newick file.");
                return;
            }

            let available = ui.available_size();
            if self
                .canvas_size
                .is_none_or(|prev| (prev - available).length() > 1.0)
            {
                self.canvas_size = Some(available);
                self.graph.resize(available.x, available.y);
                if let Some(loaded) = self.loaded.as_mut() {
                    // Force a full relayout at the new canvas dimensions.
                    loaded.applied = None;
                }
            }

            self.sync_graph();

            let (response, painter) =
                ui.allocate_painter(available, egui::Sense::click_and_drag());
            let rect = response.rect;
            self.painter.interact(&response, rect, &mut self.graph);

            if let Some(loaded) = &self.loaded {
                self.painter.draw(
                    &painter,
                    rect,
                    &self.graph,
                    &loaded.visibility,
                    loaded.view.date_min,
                    loaded.view.date_max,
                );
            }

            if self.graph.tick() || self.painter.is_dragging() {
                ctx.request_repaint();
            }
        });
    }
}
