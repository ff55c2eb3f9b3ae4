use eframe::egui::Color32;
use log::info;

use crate::tree::{Tree, Visibility};

pub mod color;
pub mod demes;
pub mod geometry;
pub mod painter;
pub mod recompute;
pub mod simulation;
pub mod transmissions;

use color::ColorScale;
use recompute::{RecomputeKind, RecomputePlan, ViewState};
use simulation::ForceSimulation;

/// 2D point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Index of a deme within `StateGraph::demes`. Non-owning handle used by
/// arcs and transmissions to look up live positions.
pub type DemeIdx = usize;

/// One pie slice of a deme.
#[derive(Debug, Clone)]
pub struct DemeArc {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub start_angle: f32,
    pub end_angle: f32,
    pub color: Color32,
    pub parent: DemeIdx,
}

/// A visual aggregate of all tree leaves sharing one value of the active
/// grouping trait. A plain circle is modelled as a single arc spanning the
/// full circle.
#[derive(Debug, Clone)]
pub struct Deme {
    pub name: String,
    /// Visible leaves holding this trait value.
    pub count: usize,
    /// All leaves holding this trait value regardless of visibility.
    pub total_count: usize,
    pub position: Point,
    pub arcs: Vec<DemeArc>,
}

impl Deme {
    /// Radius used for collision / boundary forces.
    pub fn radius(&self) -> f32 {
        self.arcs
            .iter()
            .map(|a| a.outer_radius)
            .fold(0.0f32, f32::max)
    }
}

/// One directed state-transition event derived from one tree edge.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub origin_name: String,
    pub destination_name: String,
    pub origin_deme: DemeIdx,
    pub destination_deme: DemeIdx,
    /// Array index of the child node; transmissions are clipped at draw time
    /// when this node is not visible.
    pub destination_node: usize,
    /// 1-based occurrence count for the ordered (origin, destination) pair
    /// at construction time. Drives curve bow so parallel edges fan out.
    pub extend: u32,
    pub bezier_curve: Vec<Point>,
    pub bezier_dates: Vec<f64>,
    pub origin_num_date: f64,
    pub destination_num_date: f64,
    pub color: Color32,
}

/// Numeric tuning constants for deme sizing and the force simulation.
/// Defaults follow the original prototype; all are overridable from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    /// Visual scale K in `K / sqrt(max(sqrt(tips * nodes), M))`.
    pub deme_count_multiplier: f32,
    /// Minimum divisor M, preventing blow-up on tiny trees.
    pub deme_count_minimum: f32,
    /// Fraction of the canvas the demes should spread over.
    pub fill_fraction: f32,
    /// Extra separation added to deme radii during collision resolution,
    /// expressed as a fraction of the canvas width.
    pub collision_margin_frac: f32,
    pub collision_strength: f32,
    pub boundary_strength: f32,
    pub link_strength: f32,
    /// Link strength used once the edge count exceeds the threshold, to
    /// avoid oscillation on dense datasets.
    pub weak_link_strength: f32,
    pub link_count_threshold: usize,
    pub alpha_decay: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            deme_count_multiplier: 60.0,
            deme_count_minimum: 100.0,
            fill_fraction: 0.95,
            collision_margin_frac: 1.0 / 50.0,
            collision_strength: 0.2,
            boundary_strength: 0.2,
            link_strength: 0.1,
            weak_link_strength: 0.005,
            link_count_threshold: 500,
            alpha_decay: 0.05,
        }
    }
}

/// Everything the pipeline reads when (re)computing demes and transmissions.
/// All references are borrowed from the host for the duration of one update.
pub struct GraphInputs<'a> {
    pub tree: &'a Tree,
    pub visibility: &'a [Visibility],
    pub node_colors: &'a [Color32],
    pub scale: &'a ColorScale,
    pub view: &'a ViewState,
}

/// Owner of the deme/transmission collections and the force simulation.
///
/// Ownership doubles as the destruction-order guarantee: the simulation holds
/// no references into the collections between calls, so replacing demes and
/// transmissions wholesale can never race a tick.
pub struct StateGraph {
    pub demes: Vec<Deme>,
    pub transmissions: Vec<Transmission>,
    pub simulation: ForceSimulation,
    pub params: LayoutParams,
    width: f32,
    height: f32,
}

impl StateGraph {
    pub fn new(params: LayoutParams, width: f32, height: f32) -> Self {
        let mut simulation = ForceSimulation::new(params);
        simulation.initialize(width, height);
        Self {
            demes: Vec::new(),
            transmissions: Vec::new(),
            simulation,
            params,
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.simulation.initialize(width, height);
    }

    /// Drive the minimal subset of the pipeline for a classified update.
    pub fn apply(&mut self, plan: RecomputePlan, inputs: &GraphInputs) {
        match plan.kind {
            RecomputeKind::Everything => {
                self.simulation.stop();
                self.transmissions.clear();
                self.demes = demes::compute_demes(
                    inputs,
                    self.params,
                    self.width,
                    self.height,
                    None,
                );
                self.transmissions = transmissions::compute_transmissions(inputs, &self.demes);
                self.restart_simulation();
            }
            RecomputeKind::Colors => {
                // Re-derive arcs/colors while keeping positions; the
                // simulation keeps running undisturbed.
                let existing: Vec<Point> = self.demes.iter().map(|d| d.position).collect();
                self.demes = demes::compute_demes(
                    inputs,
                    self.params,
                    self.width,
                    self.height,
                    Some(&existing),
                );
                self.transmissions = transmissions::compute_transmissions(inputs, &self.demes);
                self.simulation.attach(&self.demes, link_specs(&self.transmissions));
            }
            RecomputeKind::Visibility => {
                demes::update_demes_in_place(&mut self.demes, inputs, self.params);
                if plan.transmission_toggle {
                    self.transmissions = transmissions::compute_transmissions(inputs, &self.demes);
                }
                self.simulation.attach(&self.demes, link_specs(&self.transmissions));
            }
        }
        transmissions::refresh_curves(&mut self.transmissions, &self.demes);
    }

    fn restart_simulation(&mut self) {
        info!(
            "restarting layout: {} deme(s), {} transmission(s)",
            self.demes.len(),
            self.transmissions.len()
        );
        self.simulation.attach(&self.demes, link_specs(&self.transmissions));
        self.simulation.restart();
        self.simulation.write_positions(&mut self.demes);
        transmissions::refresh_curves(&mut self.transmissions, &self.demes);
    }

    /// Advance the simulation one frame. Returns true when positions moved
    /// (the host should repaint and call again next frame).
    pub fn tick(&mut self) -> bool {
        if !self.simulation.tick() {
            return false;
        }
        self.simulation.write_positions(&mut self.demes);
        transmissions::refresh_curves(&mut self.transmissions, &self.demes);
        true
    }

    pub fn pin(&mut self, idx: DemeIdx, point: Point) {
        self.simulation.pin(idx, point);
    }

    pub fn release(&mut self, idx: DemeIdx) {
        self.simulation.release(idx);
    }

    pub fn reheat(&mut self) {
        self.simulation.reheat();
    }

    pub fn stop(&mut self) {
        self.simulation.stop();
    }
}

fn link_specs(transmissions: &[Transmission]) -> Vec<(DemeIdx, DemeIdx)> {
    transmissions
        .iter()
        .map(|t| (t.origin_deme, t.destination_deme))
        .collect()
}
