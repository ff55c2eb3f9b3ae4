use super::{Deme, DemeIdx, LayoutParams, Point};

/// Number of synchronous ticks run at restart so the layout does not
/// animate its burn-in.
const BURN_IN_TICKS: usize = 100;
const ALPHA_MIN: f32 = 0.001;
const VELOCITY_DECAY: f32 = 0.6;
const DRAG_ALPHA_TARGET: f32 = 0.3;
/// Padding used when clamping bodies inside the canvas.
const BOUNDARY_PAD: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Uninitialized,
    Idle,
    Running,
    Settled,
    Stopped,
}

impl SimulationState {
    /// True while positions are still being updated each frame.
    pub fn is_moving(self) -> bool {
        self == SimulationState::Running
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Body {
    pos: Point,
    vel: Point,
    radius: f32,
    /// Pinned position while a drag gesture holds this body.
    fixed: Option<Point>,
}

/// Tick-driven force simulation over the deme set.
///
/// State machine: `Uninitialized → initialize → Idle → restart → Running →
/// (alpha decays) → Settled`, with `stop()` reachable from anywhere. The
/// simulation holds plain copies of positions, never references into the
/// deme collection; the owner copies positions back after each tick.
pub struct ForceSimulation {
    params: LayoutParams,
    width: f32,
    height: f32,
    alpha: f32,
    alpha_target: f32,
    bodies: Vec<Body>,
    links: Vec<(DemeIdx, DemeIdx)>,
    state: SimulationState,
}

impl ForceSimulation {
    pub fn new(params: LayoutParams) -> Self {
        Self {
            params,
            width: 0.0,
            height: 0.0,
            alpha: 0.0,
            alpha_target: 0.0,
            bodies: Vec::new(),
            links: Vec::new(),
            state: SimulationState::Uninitialized,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn initialize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        if self.state == SimulationState::Uninitialized {
            self.state = SimulationState::Idle;
        }
    }

    /// Bind the current deme set and transmission links. Velocities and pins
    /// are preserved when the deme count is unchanged, so in-place updates
    /// keep the simulation continuous.
    pub fn attach(&mut self, demes: &[Deme], links: Vec<(DemeIdx, DemeIdx)>) {
        let preserve = self.bodies.len() == demes.len();
        let old = std::mem::take(&mut self.bodies);
        self.bodies = demes
            .iter()
            .enumerate()
            .map(|(idx, deme)| Body {
                pos: deme.position,
                vel: if preserve { old[idx].vel } else { Point::default() },
                radius: deme.radius(),
                fixed: if preserve { old[idx].fixed } else { None },
            })
            .collect();
        self.links = links
            .into_iter()
            .filter(|&(a, b)| a < self.bodies.len() && b < self.bodies.len())
            .collect();
    }

    /// Reheat to full energy and run the burn-in synchronously.
    pub fn restart(&mut self) {
        if self.state == SimulationState::Uninitialized {
            return;
        }
        self.alpha = 1.0;
        self.alpha_target = 0.0;
        self.state = SimulationState::Running;
        for _ in 0..BURN_IN_TICKS {
            if !self.tick() {
                break;
            }
        }
        if self.state == SimulationState::Settled {
            // Burn-in may settle early; stay ready for reheats.
            self.state = SimulationState::Running;
            self.alpha = ALPHA_MIN;
        }
    }

    /// Raise the target energy so neighbours respond to a drag gesture.
    pub fn reheat(&mut self) {
        if matches!(
            self.state,
            SimulationState::Uninitialized | SimulationState::Stopped
        ) {
            return;
        }
        self.alpha_target = DRAG_ALPHA_TARGET;
        self.state = SimulationState::Running;
    }

    pub fn pin(&mut self, idx: DemeIdx, point: Point) {
        if let Some(body) = self.bodies.get_mut(idx) {
            body.fixed = Some(point);
            body.pos = point;
            body.vel = Point::default();
        }
    }

    pub fn release(&mut self, idx: DemeIdx) {
        if let Some(body) = self.bodies.get_mut(idx) {
            body.fixed = None;
        }
        self.alpha_target = 0.0;
    }

    /// Halt permanently (component teardown). Queued ticks become no-ops.
    pub fn stop(&mut self) {
        self.state = SimulationState::Stopped;
    }

    /// Advance one frame. Returns true when positions changed; ticking stops
    /// automatically once alpha decays below the floor.
    pub fn tick(&mut self) -> bool {
        if self.state != SimulationState::Running {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;
        if self.alpha < ALPHA_MIN && self.alpha_target < ALPHA_MIN {
            self.state = SimulationState::Settled;
            return false;
        }

        self.apply_link_force();
        self.apply_collision_force();
        self.apply_center_force();
        self.apply_boundary_force();
        self.integrate();
        true
    }

    /// Copy simulated positions back onto the demes.
    pub fn write_positions(&self, demes: &mut [Deme]) {
        for (body, deme) in self.bodies.iter().zip(demes.iter_mut()) {
            deme.position = body.pos;
        }
    }

    /// Attraction along transmission edges, weakened on dense edge sets to
    /// avoid oscillation.
    fn apply_link_force(&mut self) {
        let strength = if self.links.len() > self.params.link_count_threshold {
            self.params.weak_link_strength
        } else {
            self.params.link_strength
        };
        let margin = self.collision_margin();

        for &(a, b) in &self.links {
            let (pa, pb) = (self.bodies[a].pos, self.bodies[b].pos);
            let dx = pb.x - pa.x;
            let dy = pb.y - pa.y;
            let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
            let rest = self.bodies[a].radius + self.bodies[b].radius + margin;
            let stretch = dist - rest;
            let f = strength * stretch * self.alpha / dist;
            self.bodies[a].vel.x += dx * f;
            self.bodies[a].vel.y += dy * f;
            self.bodies[b].vel.x -= dx * f;
            self.bodies[b].vel.y -= dy * f;
        }
    }

    /// Pairwise separation sized by the demes' outer radii plus a margin.
    fn apply_collision_force(&mut self) {
        let margin = self.collision_margin();
        let strength = self.params.collision_strength;
        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (pi, pj) = (self.bodies[i].pos, self.bodies[j].pos);
                let mut dx = pj.x - pi.x;
                let mut dy = pj.y - pi.y;
                let mut dist = (dx * dx + dy * dy).sqrt();
                if dist < 1e-3 {
                    // Coincident bodies: separate along a fixed axis.
                    dx = 1.0;
                    dy = 0.0;
                    dist = 1.0;
                }
                let min_dist = self.bodies[i].radius + self.bodies[j].radius + margin;
                if dist >= min_dist {
                    continue;
                }
                let overlap = (min_dist - dist) / dist;
                let push = overlap * strength * 0.5;
                self.bodies[i].vel.x -= dx * push;
                self.bodies[i].vel.y -= dy * push;
                self.bodies[j].vel.x += dx * push;
                self.bodies[j].vel.y += dy * push;
            }
        }
    }

    /// Translate so the centroid sits at the canvas center.
    fn apply_center_force(&mut self) {
        let free: Vec<usize> = (0..self.bodies.len())
            .filter(|&i| self.bodies[i].fixed.is_none())
            .collect();
        if free.is_empty() {
            return;
        }
        let (mut cx, mut cy) = (0.0f32, 0.0f32);
        for &i in &free {
            cx += self.bodies[i].pos.x;
            cy += self.bodies[i].pos.y;
        }
        cx /= free.len() as f32;
        cy /= free.len() as f32;
        let dx = self.width / 2.0 - cx;
        let dy = self.height / 2.0 - cy;
        for &i in &free {
            self.bodies[i].pos.x += dx;
            self.bodies[i].pos.y += dy;
        }
    }

    /// Keep every body inside the canvas and nudge the set to spread over
    /// `fill_fraction` of it.
    fn apply_boundary_force(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        let strength = self.params.boundary_strength;
        let available_w = self.params.fill_fraction * self.width;
        let available_h = self.params.fill_fraction * self.height;
        let pad_frac = (1.0 - self.params.fill_fraction) / 2.0;

        let mut min_x = self.width;
        let mut max_x = 0.0f32;
        let mut min_y = self.height;
        let mut max_y = 0.0f32;
        for body in &mut self.bodies {
            let r = body.radius + BOUNDARY_PAD;
            body.pos.x = body.pos.x.clamp(r, (self.width - r).max(r));
            body.pos.y = body.pos.y.clamp(r, (self.height - r).max(r));
            min_x = min_x.min(body.pos.x);
            max_x = max_x.max(body.pos.x);
            min_y = min_y.min(body.pos.y);
            max_y = max_y.max(body.pos.y);
        }

        let span_x = max_x - min_x;
        let span_y = max_y - min_y;
        if span_x < 1e-3 || span_y < 1e-3 {
            return;
        }
        let scale_x = available_w / span_x;
        let scale_y = available_h / span_y;
        let offset_x = pad_frac * self.width - min_x;
        let offset_y = pad_frac * self.height - min_y;
        for body in &mut self.bodies {
            body.vel.x -= (body.pos.x - (body.pos.x + offset_x) * scale_x) * strength * self.alpha;
            body.vel.y -= (body.pos.y - (body.pos.y + offset_y) * scale_y) * strength * self.alpha;
        }
    }

    fn integrate(&mut self) {
        for body in &mut self.bodies {
            if let Some(pin) = body.fixed {
                body.pos = pin;
                body.vel = Point::default();
                continue;
            }
            body.vel.x *= VELOCITY_DECAY;
            body.vel.y *= VELOCITY_DECAY;
            body.pos.x += body.vel.x;
            body.pos.y += body.vel.y;
        }
    }

    fn collision_margin(&self) -> f32 {
        self.width * self.params.collision_margin_frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::color::full_circle_arc;
    use eframe::egui::Color32;

    fn deme(name: &str, x: f32, y: f32, radius: f32) -> Deme {
        let mut arc = full_circle_arc(Color32::WHITE, 0);
        arc.outer_radius = radius;
        Deme {
            name: name.to_string(),
            count: 1,
            total_count: 1,
            position: Point::new(x, y),
            arcs: vec![arc],
        }
    }

    fn running_sim(demes: &[Deme], links: Vec<(usize, usize)>) -> ForceSimulation {
        let mut sim = ForceSimulation::new(LayoutParams::default());
        sim.initialize(800.0, 600.0);
        sim.attach(demes, links);
        sim.restart();
        sim
    }

    #[test]
    fn test_empty_set_idles_without_faulting() {
        let mut sim = ForceSimulation::new(LayoutParams::default());
        sim.initialize(800.0, 600.0);
        sim.attach(&[], Vec::new());
        sim.restart();
        // Ticks run until alpha decays; nothing to move, nothing panics.
        let mut guard = 0;
        while sim.tick() {
            guard += 1;
            assert!(guard < 1000, "simulation failed to settle");
        }
        assert_eq!(sim.state(), SimulationState::Settled);
    }

    #[test]
    fn test_tick_requires_running_state() {
        let mut sim = ForceSimulation::new(LayoutParams::default());
        assert!(!sim.tick()); // Uninitialized
        sim.initialize(800.0, 600.0);
        assert!(!sim.tick()); // Idle
        sim.attach(&[deme("A", 100.0, 100.0, 10.0)], Vec::new());
        sim.restart();
        assert!(sim.tick());
        sim.stop();
        assert!(!sim.tick());
        assert_eq!(sim.state(), SimulationState::Stopped);
    }

    #[test]
    fn test_bodies_stay_inside_bounds() {
        let demes = vec![
            deme("A", 5.0, 5.0, 20.0),
            deme("B", 795.0, 595.0, 20.0),
            deme("C", 400.0, 300.0, 20.0),
        ];
        let mut sim = running_sim(&demes, vec![(0, 1), (1, 2)]);
        for _ in 0..50 {
            sim.tick();
        }
        let mut positioned = demes.clone();
        sim.write_positions(&mut positioned);
        for deme in &positioned {
            let r = deme.radius() + BOUNDARY_PAD;
            assert!(deme.position.x >= r - 1e-3 && deme.position.x <= 800.0 - r + 1e-3);
            assert!(deme.position.y >= r - 1e-3 && deme.position.y <= 600.0 - r + 1e-3);
        }
    }

    #[test]
    fn test_collision_separates_overlapping_demes() {
        let demes = vec![
            deme("A", 400.0, 300.0, 30.0),
            deme("B", 405.0, 300.0, 30.0),
        ];
        let mut sim = running_sim(&demes, Vec::new());
        for _ in 0..200 {
            sim.tick();
        }
        let mut positioned = demes.clone();
        sim.write_positions(&mut positioned);
        let dist = positioned[0].position.distance(positioned[1].position);
        assert!(dist > 40.0, "demes still overlapping: {dist}");
    }

    #[test]
    fn test_pin_fixes_position_release_frees_it() {
        let demes = vec![
            deme("A", 300.0, 300.0, 25.0),
            deme("B", 310.0, 300.0, 25.0),
            deme("C", 500.0, 300.0, 25.0),
        ];
        let mut sim = running_sim(&demes, vec![(0, 2)]);
        let pinned_at = Point::new(200.0, 200.0);
        sim.reheat();
        sim.pin(0, pinned_at);

        let mut positioned = demes.clone();
        let mut neighbour_before = Point::default();
        for step in 0..30 {
            sim.tick();
            sim.write_positions(&mut positioned);
            assert_eq!(positioned[0].position, pinned_at, "pin broke at step {step}");
            if step == 0 {
                neighbour_before = positioned[1].position;
            }
        }
        // Neighbours keep responding while the drag is active.
        assert!(positioned[1].position.distance(neighbour_before) > 1e-6);

        sim.release(0);
        for _ in 0..30 {
            sim.tick();
        }
        sim.write_positions(&mut positioned);
        // Freed body is back under force control (collision with B pushes
        // it off the pin point).
        assert!(positioned[0].position.distance(pinned_at) > 1e-3);
    }

    #[test]
    fn test_attach_preserves_motion_on_same_count() {
        let demes = vec![
            deme("A", 300.0, 300.0, 25.0),
            deme("B", 310.0, 300.0, 25.0),
        ];
        let mut sim = running_sim(&demes, Vec::new());
        sim.tick();
        sim.pin(1, Point::new(100.0, 100.0));
        sim.attach(&demes, Vec::new());
        // Pin survived the re-attach.
        let mut positioned = demes.clone();
        sim.reheat();
        sim.tick();
        sim.write_positions(&mut positioned);
        assert_eq!(positioned[1].position, Point::new(100.0, 100.0));
    }
}
