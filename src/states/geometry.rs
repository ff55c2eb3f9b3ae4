use super::Point;

/// Number of sample points per transmission curve. Every curve is recomputed
/// each tick, so this is deliberately modest.
pub const BEZIER_SAMPLES: usize = 15;

/// How far the control point bows away from the chord per unit of `extend`,
/// as a fraction of the chord length.
const EXTEND_BOW_FRACTION: f32 = 0.08;

/// Sample a quadratic bezier between `a` and `b`. The control point sits on
/// the perpendicular bisector of the chord, offset proportionally to
/// `extend`, so repeated curves between the same endpoints fan out instead
/// of overlapping. `extend == 0` reduces to the straight segment.
pub fn bezier(a: Point, b: Point, extend: u32) -> Vec<Point> {
    let mid = Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5);
    let chord = a.distance(b);

    let control = if extend == 0 || chord < f32::EPSILON {
        mid
    } else {
        // Unit perpendicular to the chord; alternate sides so curve 1 bows
        // one way, curve 2 the other, curve 3 further out, and so on.
        let px = -(b.y - a.y) / chord;
        let py = (b.x - a.x) / chord;
        let step = (extend as f32 + 1.0) / 2.0;
        let side = if extend % 2 == 0 { -1.0 } else { 1.0 };
        let offset = side * step.floor() * EXTEND_BOW_FRACTION * chord;
        Point::new(mid.x + px * offset, mid.y + py * offset)
    };

    let mut points = Vec::with_capacity(BEZIER_SAMPLES);
    for i in 0..BEZIER_SAMPLES {
        let t = i as f32 / (BEZIER_SAMPLES - 1) as f32;
        let u = 1.0 - t;
        points.push(Point::new(
            u * u * a.x + 2.0 * u * t * control.x + t * t * b.x,
            u * u * a.y + 2.0 * u * t * control.y + t * t * b.y,
        ));
    }
    points
}

/// Deterministic initial placement: `n` points on a circle spanning 40% of
/// the smaller canvas dimension, centred on the canvas.
pub fn circular_coordinates(width: f32, height: f32, n: usize) -> Vec<Point> {
    let x0 = width / 2.0;
    let y0 = height / 2.0;
    let step = std::f32::consts::TAU / (n as f32 + 1.0);
    let r = width.min(height) * 0.4;
    (0..n)
        .map(|i| {
            let angle = step * i as f32;
            Point::new(x0 + r * angle.cos(), y0 + r * angle.sin())
        })
        .collect()
}

/// Clip a transmission curve to the temporal window `[date_min, date_max]`.
/// Returns the contiguous run of curve points whose dates fall inside the
/// window, or `None` when the transmission is hidden or entirely outside.
pub fn clip_curve<'a>(
    date_min: f64,
    date_max: f64,
    curve: &'a [Point],
    dates: &[f64],
    visible: bool,
) -> Option<&'a [Point]> {
    if !visible || curve.is_empty() || curve.len() != dates.len() {
        return None;
    }

    let start = dates.iter().position(|&d| d >= date_min)?;
    let end = dates.iter().rposition(|&d| d <= date_max)?;
    if end < start || end - start < 1 {
        // Fewer than two points inside the window: nothing drawable.
        return None;
    }
    Some(&curve[start..=end])
}
