/// The host-selected view properties the pipeline depends on. Comparing two
/// snapshots decides how much of the pipeline must rerun.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Trait used to bucket leaves into demes (e.g. geographic resolution).
    pub grouping: String,
    /// Trait used to color arcs within a deme.
    pub coloring: String,
    pub date_min: f64,
    pub date_max: f64,
    pub show_transmissions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeKind {
    /// Grouping changed: deme identities themselves change, so demes,
    /// transmissions and the simulation are all rebuilt and restarted.
    Everything,
    /// Coloring changed: arcs and colors are re-derived with coordinates
    /// reused; the simulation keeps running with its current positions.
    Colors,
    /// Only visibility (date window) changed: counts and arc colors update
    /// in place, transmissions are merely re-clipped at draw time.
    Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputePlan {
    pub kind: RecomputeKind,
    /// Set when the show/hide-transmissions flag flipped; transmissions are
    /// rebuilt regardless of which branch above fired.
    pub transmission_toggle: bool,
}

/// Classify a property change into the minimal recompute plan. Exactly one
/// of the three kinds applies; the transmission toggle is independent.
pub fn classify(prev: &ViewState, next: &ViewState) -> RecomputePlan {
    let kind = if prev.grouping != next.grouping {
        RecomputeKind::Everything
    } else if prev.coloring != next.coloring {
        RecomputeKind::Colors
    } else {
        RecomputeKind::Visibility
    };
    RecomputePlan {
        kind,
        transmission_toggle: prev.show_transmissions != next.show_transmissions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        ViewState {
            grouping: "country".to_string(),
            coloring: "host".to_string(),
            date_min: 2000.0,
            date_max: 2020.0,
            show_transmissions: true,
        }
    }

    #[test]
    fn test_grouping_change_rebuilds_everything() {
        let prev = view();
        let mut next = view();
        next.grouping = "region".to_string();
        next.coloring = "country".to_string(); // also changed, still Everything
        let plan = classify(&prev, &next);
        assert_eq!(plan.kind, RecomputeKind::Everything);
        assert!(!plan.transmission_toggle);
    }

    #[test]
    fn test_coloring_change_is_colors_only() {
        let prev = view();
        let mut next = view();
        next.coloring = "clade".to_string();
        let plan = classify(&prev, &next);
        assert_eq!(plan.kind, RecomputeKind::Colors);
    }

    #[test]
    fn test_date_window_change_is_visibility_only() {
        let prev = view();
        let mut next = view();
        next.date_min = 2010.0;
        let plan = classify(&prev, &next);
        assert_eq!(plan.kind, RecomputeKind::Visibility);
    }

    #[test]
    fn test_toggle_is_orthogonal() {
        let prev = view();

        let mut next = view();
        next.show_transmissions = false;
        let plan = classify(&prev, &next);
        assert_eq!(plan.kind, RecomputeKind::Visibility);
        assert!(plan.transmission_toggle);

        let mut next = view();
        next.grouping = "region".to_string();
        next.show_transmissions = false;
        let plan = classify(&prev, &next);
        assert_eq!(plan.kind, RecomputeKind::Everything);
        assert!(plan.transmission_toggle);
    }

    #[test]
    fn test_identical_views_fall_through_to_visibility() {
        let prev = view();
        let plan = classify(&prev, &prev.clone());
        assert_eq!(plan.kind, RecomputeKind::Visibility);
        assert!(!plan.transmission_toggle);
    }
}
