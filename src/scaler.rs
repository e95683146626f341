/// Outcome of comparing the current metric value against the thresholds.
///
/// `AtMax` and `AtMin` are not errors. They mark ticks where the metric asks
/// for a change the bounds do not allow, so the caller can log them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add one instance
    Up,
    /// Remove one instance
    Down,
    /// Metric is between the thresholds
    Hold,
    /// Metric is above the up threshold, but the app is already at `max`
    AtMax,
    /// Metric is below the down threshold, but only one instance is left
    AtMin,
}

impl ScaleDecision {
    /// Evaluate one observation.
    ///
    /// Comparisons are strict: a value sitting exactly on a threshold never
    /// triggers a change. The step is always a single instance.
    pub fn evaluate(value: f64, up: f64, down: f64, current: i64, max: i64) -> ScaleDecision {
        if value > up {
            if current < max {
                ScaleDecision::Up
            } else {
                ScaleDecision::AtMax
            }
        } else if value < down {
            if current > 1 {
                ScaleDecision::Down
            } else {
                ScaleDecision::AtMin
            }
        } else {
            ScaleDecision::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_up_above_threshold() {
        assert_eq!(
            ScaleDecision::evaluate(85.0, 80.0, 20.0, 2, 5),
            ScaleDecision::Up
        );
    }

    #[test]
    fn saturates_at_max() {
        assert_eq!(
            ScaleDecision::evaluate(95.0, 80.0, 20.0, 5, 5),
            ScaleDecision::AtMax
        );
    }

    #[test]
    fn scales_down_below_threshold() {
        assert_eq!(
            ScaleDecision::evaluate(10.0, 80.0, 20.0, 3, 5),
            ScaleDecision::Down
        );
    }

    #[test]
    fn holds_the_floor() {
        assert_eq!(
            ScaleDecision::evaluate(10.0, 80.0, 20.0, 1, 5),
            ScaleDecision::AtMin
        );
    }

    #[test]
    fn holds_between_thresholds() {
        assert_eq!(
            ScaleDecision::evaluate(50.0, 80.0, 20.0, 3, 5),
            ScaleDecision::Hold
        );
    }

    #[test]
    fn value_on_a_threshold_holds() {
        assert_eq!(
            ScaleDecision::evaluate(80.0, 80.0, 20.0, 2, 5),
            ScaleDecision::Hold
        );
        assert_eq!(
            ScaleDecision::evaluate(20.0, 80.0, 20.0, 2, 5),
            ScaleDecision::Hold
        );
    }

    #[test]
    fn one_instance_above_max_still_saturates() {
        // a manually over-scaled app is left alone rather than grown further
        assert_eq!(
            ScaleDecision::evaluate(95.0, 80.0, 20.0, 6, 5),
            ScaleDecision::AtMax
        );
    }
}
