use eframe::egui::{self, epaint, Align2, Color32, FontId, Pos2, Rect, Stroke};

use super::{geometry, Deme, DemeArc, DemeIdx, Point, StateGraph};
use crate::tree::Visibility;

const DEME_FILL_ALPHA: u8 = 166; // 0.65
const TRANSMISSION_ALPHA: u8 = 153; // 0.6
const TRANSMISSION_WIDTH: f32 = 2.0;
const LABEL_FONT_SIZE: f32 = 12.0;
const LABEL_OFFSET: f32 = 10.0;
/// Straight-line segments used to tessellate a full-circle sector.
const SECTOR_SEGMENTS: f32 = 48.0;

/// Binds the computed deme/transmission geometry to egui primitives and
/// pointer-drag gestures. Pure drawing glue: all layout decisions live in
/// the pipeline.
#[derive(Default)]
pub struct StatesPainter {
    dragging: Option<DemeIdx>,
}

impl StatesPainter {
    /// Draw transmissions beneath demes, then labels on top.
    pub fn draw(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        graph: &StateGraph,
        visibility: &[Visibility],
        date_min: f64,
        date_max: f64,
    ) {
        for transmission in &graph.transmissions {
            let visible = visibility
                .get(transmission.destination_node)
                .is_some_and(|v| v.is_visible());
            let Some(segment) = geometry::clip_curve(
                date_min,
                date_max,
                &transmission.bezier_curve,
                &transmission.bezier_dates,
                visible,
            ) else {
                continue;
            };
            let points: Vec<Pos2> = segment.iter().map(|p| to_screen(rect, *p)).collect();
            let color = with_alpha(transmission.color, TRANSMISSION_ALPHA);
            painter.add(egui::Shape::line(
                points,
                Stroke::new(TRANSMISSION_WIDTH, color),
            ));
        }

        for deme in &graph.demes {
            let center = to_screen(rect, deme.position);
            for arc in &deme.arcs {
                if arc.outer_radius <= 0.0 {
                    continue;
                }
                painter.add(egui::Shape::mesh(sector_mesh(center, arc)));
            }
        }

        for deme in &graph.demes {
            let center = to_screen(rect, deme.position);
            let (anchor, align) = label_side(deme.position, rect.width());
            painter.text(
                Pos2::new(center.x + anchor, center.y),
                align,
                &deme.name,
                FontId::proportional(LABEL_FONT_SIZE),
                Color32::DARK_GRAY,
            );
        }
    }

    /// Translate pointer gestures over the canvas into pin/release calls.
    pub fn interact(&mut self, response: &egui::Response, rect: Rect, graph: &mut StateGraph) {
        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = from_screen(rect, pos);
                if let Some(idx) = hit_test(&graph.demes, local) {
                    self.dragging = Some(idx);
                    graph.reheat();
                    graph.pin(idx, local);
                }
            }
        } else if response.dragged() {
            if let (Some(idx), Some(pos)) = (self.dragging, response.interact_pointer_pos()) {
                graph.pin(idx, from_screen(rect, pos));
            }
        } else if response.drag_stopped() {
            if let Some(idx) = self.dragging.take() {
                graph.release(idx);
            }
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }
}

/// Deme under the pointer, if any; tested against each deme's outer radius.
pub fn hit_test(demes: &[Deme], point: Point) -> Option<DemeIdx> {
    demes
        .iter()
        .enumerate()
        .filter(|(_, d)| d.position.distance(point) <= d.radius().max(LABEL_OFFSET))
        .min_by(|(_, a), (_, b)| {
            let da = a.position.distance(point);
            let db = b.position.distance(point);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx)
}

/// Labels flip to the inner side once a deme crosses the canvas midline, so
/// text never runs off the edge.
fn label_side(position: Point, width: f32) -> (f32, Align2) {
    if position.x * 2.0 < width {
        (LABEL_OFFSET, Align2::LEFT_CENTER)
    } else {
        (-LABEL_OFFSET, Align2::RIGHT_CENTER)
    }
}

fn to_screen(rect: Rect, p: Point) -> Pos2 {
    Pos2::new(rect.min.x + p.x, rect.min.y + p.y)
}

fn from_screen(rect: Rect, pos: Pos2) -> Point {
    Point::new(pos.x - rect.min.x, pos.y - rect.min.y)
}

fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// Triangle-fan tessellation of one pie sector. Handles any span up to the
/// full circle, which a convex polygon shape cannot.
fn sector_mesh(center: Pos2, arc: &DemeArc) -> epaint::Mesh {
    let span = arc.end_angle - arc.start_angle;
    let segments = ((span / std::f32::consts::TAU) * SECTOR_SEGMENTS).ceil().max(2.0) as u32;
    let color = with_alpha(arc.color, DEME_FILL_ALPHA);

    let mut mesh = epaint::Mesh::default();
    mesh.colored_vertex(center, color);
    for i in 0..=segments {
        let angle = arc.start_angle + span * i as f32 / segments as f32;
        mesh.colored_vertex(
            Pos2::new(
                center.x + arc.outer_radius * angle.cos(),
                center.y + arc.outer_radius * angle.sin(),
            ),
            color,
        );
    }
    for i in 0..segments {
        mesh.add_triangle(0, i + 1, i + 2);
    }
    mesh
}
