//! Scene activation: which scene owns a given timeline instant.
//!
//! Scenes occupy consecutive half-open intervals `[cum(i), cum(i) + d(i))`
//! over the cumulative durations. The final interval is closed at the total
//! so the exact end of the timeline still maps to the last scene.

/// Index of the scene active at `time_secs`.
///
/// Returns `None` when there is nothing to render: no scenes, a zero-length
/// timeline, or a time outside `[0, total]`.
pub fn active_index(time_secs: f64, durations: &[f64]) -> Option<usize> {
    if durations.is_empty() || !time_secs.is_finite() || time_secs < 0.0 {
        return None;
    }

    let total: f64 = durations.iter().sum();
    if total <= 0.0 || time_secs > total {
        return None;
    }

    let mut start = 0.0;
    for (index, duration) in durations.iter().enumerate() {
        let end = start + duration;
        if time_secs < end {
            return Some(index);
        }
        start = end;
    }

    Some(durations.len() - 1)
}

/// Start time of each scene.
pub fn scene_offsets(durations: &[f64]) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(durations.len());
    let mut start = 0.0;
    for duration in durations {
        offsets.push(start);
        start += duration;
    }
    offsets
}

/// A change of the active scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

/// Tracks the active scene and reports changes only when the index moves.
#[derive(Debug, Clone, Default)]
pub struct SceneActivator {
    durations: Vec<f64>,
    offsets: Vec<f64>,
    total_secs: f64,
    current: Option<usize>,
}

impl SceneActivator {
    pub fn new(durations: Vec<f64>) -> Self {
        let mut activator = Self::default();
        activator.set_durations(durations);
        activator
    }

    /// Replace the scene list. The active index is forgotten so the next
    /// update reports a fresh activation.
    pub fn set_durations(&mut self, durations: Vec<f64>) {
        self.offsets = scene_offsets(&durations);
        self.total_secs = durations.iter().sum();
        self.durations = durations;
        self.current = None;
    }

    /// Recompute the active scene for `time_secs`.
    ///
    /// Idempotent: calling repeatedly with times inside the same scene
    /// yields a change only on the first call.
    pub fn update(&mut self, time_secs: f64) -> Option<ActivationChange> {
        let next = active_index(time_secs, &self.durations);
        if next == self.current {
            return None;
        }

        let change = ActivationChange {
            previous: self.current,
            current: next,
        };
        self.current = next;
        Some(change)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    pub fn scene_count(&self) -> usize {
        self.durations.len()
    }

    /// Time elapsed since the given scene started.
    pub fn local_time(&self, index: usize, time_secs: f64) -> f64 {
        self.offsets
            .get(index)
            .map(|start| (time_secs - start).max(0.0))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_scene_boundaries() {
        let durations = [4.0, 6.0];
        assert_eq!(active_index(0.0, &durations), Some(0));
        assert_eq!(active_index(3.0, &durations), Some(0));
        assert_eq!(active_index(4.0, &durations), Some(1));
        assert_eq!(active_index(9.9, &durations), Some(1));
        assert_eq!(active_index(10.0, &durations), Some(1));
        assert_eq!(active_index(10.01, &durations), None);
    }

    #[test]
    fn test_nothing_to_render() {
        assert_eq!(active_index(0.0, &[]), None);
        assert_eq!(active_index(0.0, &[0.0, 0.0]), None);
        assert_eq!(active_index(-0.5, &[4.0]), None);
        assert_eq!(active_index(f64::NAN, &[4.0]), None);
    }

    #[test]
    fn test_update_reports_only_changes() {
        let mut activator = SceneActivator::new(vec![4.0, 6.0]);
        assert_eq!(
            activator.update(0.0),
            Some(ActivationChange {
                previous: None,
                current: Some(0)
            })
        );
        assert_eq!(activator.update(1.0), None);
        assert_eq!(activator.update(1.0), None);
        assert_eq!(
            activator.update(4.5),
            Some(ActivationChange {
                previous: Some(0),
                current: Some(1)
            })
        );
        assert!((activator.local_time(1, 4.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_set_durations_forgets_active_scene() {
        let mut activator = SceneActivator::new(vec![4.0]);
        activator.update(1.0);
        activator.set_durations(vec![2.0, 2.0]);
        assert_eq!(activator.current(), None);
        assert!((activator.total_secs() - 4.0).abs() < 1e-12);
        assert_eq!(activator.update(3.0).and_then(|c| c.current), Some(1));
    }

    proptest! {
        #[test]
        fn prop_active_interval_contains_time(
            durations in prop::collection::vec(0.1f64..20.0, 1..10),
            fraction in 0.0f64..1.0,
        ) {
            let total: f64 = durations.iter().sum();
            let t = fraction * total;
            prop_assume!(t < total);

            let index = active_index(t, &durations).unwrap();
            let offsets = scene_offsets(&durations);
            prop_assert!(offsets[index] <= t);
            prop_assert!(t < offsets[index] + durations[index]);
        }

        #[test]
        fn prop_end_of_timeline_is_last_scene(
            durations in prop::collection::vec(0.1f64..20.0, 1..10),
        ) {
            let total: f64 = durations.iter().sum();
            let epsilon = 1e-6;
            prop_assert_eq!(active_index(total - epsilon, &durations), Some(durations.len() - 1));
            prop_assert_eq!(active_index(total, &durations), Some(durations.len() - 1));
        }

        #[test]
        fn prop_repeated_update_is_idempotent(
            durations in prop::collection::vec(0.1f64..20.0, 1..10),
            fraction in 0.0f64..1.0,
            repeats in 1usize..5,
        ) {
            let total: f64 = durations.iter().sum();
            let t = fraction * total;
            let mut activator = SceneActivator::new(durations);
            let changes = (0..=repeats).filter_map(|_| activator.update(t)).count();
            prop_assert_eq!(changes, 1);
        }
    }
}
