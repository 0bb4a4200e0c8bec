//! Time-range algebra over half-open intervals on a timeline (C1).

use crate::error::{PipelineError, Result};

/// A half-open interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Builds a range, rejecting NaN/∞ inputs and collapsed intervals.
    ///
    /// Returns `None` for a collapsed range (`end <= start`) rather than an
    /// error — callers that build ranges from derived timestamps routinely
    /// produce these and are expected to drop them silently.
    pub fn new(start: f64, end: f64) -> Result<Option<Self>> {
        if !start.is_finite() || !end.is_finite() {
            return Err(PipelineError::InvalidInput(format!(
                "non-finite time range [{start}, {end})"
            )));
        }
        if end <= start {
            return Ok(None);
        }
        Ok(Some(Self { start, end }))
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn overlaps_or_touches(&self, other: &Self, touching_epsilon: f64) -> bool {
        self.start <= other.end + touching_epsilon && other.start <= self.end + touching_epsilon
    }
}

/// Sorts by start, then folds adjacent ranges whose gap is within
/// `touching_epsilon` into a single range using max-end.
pub fn merge(ranges: &[TimeRange], touching_epsilon: f64) -> Vec<TimeRange> {
    if ranges.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<TimeRange> = ranges.to_vec();
    sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).expect("finite by construction"));

    let mut out: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match out.last_mut() {
            Some(last) if last.overlaps_or_touches(&r, touching_epsilon) => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

/// Emits the complement of `excludes` inside `domain`, dropping empty
/// segments (keep-ranges).
pub fn subtract(domain: TimeRange, excludes: &[TimeRange], touching_epsilon: f64) -> Vec<TimeRange> {
    let merged = merge(excludes, touching_epsilon);
    let mut out = Vec::new();
    let mut cursor = domain.start;
    for ex in &merged {
        let clipped_start = ex.start.max(domain.start);
        let clipped_end = ex.end.min(domain.end);
        if clipped_end <= clipped_start {
            continue;
        }
        if clipped_start > cursor {
            out.push(TimeRange {
                start: cursor,
                end: clipped_start,
            });
        }
        cursor = cursor.max(clipped_end);
    }
    if cursor < domain.end {
        out.push(TimeRange {
            start: cursor,
            end: domain.end,
        });
    }
    out
}

/// Total length of a set of ranges.
pub fn sum(ranges: &[TimeRange]) -> f64 {
    ranges.iter().map(TimeRange::duration).sum()
}

/// Maps an absolute time on the pre-splice timeline to its post-splice
/// timeline position, by subtracting the cumulative length of `removed`
/// ranges wholly before `t`, and the partial length when `t` lies inside a
/// removed range (clamped to that range's start).
pub fn shift_for_removed(t: f64, removed: &[TimeRange], touching_epsilon: f64) -> f64 {
    let merged = merge(removed, touching_epsilon);
    let mut shift = 0.0;
    for r in &merged {
        if r.end <= t {
            shift += r.duration();
        } else if r.start < t {
            shift += t - r.start;
        }
    }
    t - shift
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(start: f64, end: f64) -> TimeRange {
        TimeRange::new(start, end).unwrap().unwrap()
    }

    #[test]
    fn new_rejects_nan_and_infinite() {
        assert!(TimeRange::new(f64::NAN, 1.0).is_err());
        assert!(TimeRange::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn new_drops_collapsed_ranges() {
        assert!(TimeRange::new(5.0, 5.0).unwrap().is_none());
        assert!(TimeRange::new(5.0, 4.0).unwrap().is_none());
    }

    #[test]
    fn merge_is_sorted_and_non_overlapping() {
        let ranges = vec![tr(10.0, 12.0), tr(0.0, 5.0), tr(5.005, 8.0)];
        let merged = merge(&ranges, 0.01);
        assert_eq!(merged, vec![tr(0.0, 8.0), tr(10.0, 12.0)]);
        assert!(sum(&merged) <= sum(&ranges));
    }

    #[test]
    fn merge_leaves_distant_ranges_separate() {
        let ranges = vec![tr(0.0, 1.0), tr(2.0, 3.0)];
        let merged = merge(&ranges, 0.01);
        assert_eq!(merged, ranges);
    }

    #[test]
    fn subtract_complements_domain() {
        let domain = tr(0.0, 10.0);
        let excludes = vec![tr(2.0, 3.0), tr(7.0, 9.0)];
        let keep = subtract(domain, &excludes, 0.01);
        assert_eq!(keep, vec![tr(0.0, 2.0), tr(3.0, 7.0), tr(9.0, 10.0)]);
        let expected_sum = sum(&[domain]) - sum(&merge(&excludes, 0.01));
        assert!((sum(&keep) - expected_sum).abs() < 1e-9);
    }

    #[test]
    fn subtract_drops_fully_excluded_domain() {
        let domain = tr(0.0, 5.0);
        let excludes = vec![tr(0.0, 5.0)];
        assert!(subtract(domain, &excludes, 0.01).is_empty());
    }

    #[test]
    fn shift_for_removed_before_target_is_unaffected() {
        let removed = vec![tr(20.0, 25.0)];
        assert_eq!(shift_for_removed(10.0, &removed, 0.01), 10.0);
    }

    #[test]
    fn shift_for_removed_subtracts_wholly_prior_ranges() {
        let removed = vec![tr(2.0, 4.0)];
        assert_eq!(shift_for_removed(10.0, &removed, 0.01), 8.0);
    }

    #[test]
    fn shift_for_removed_clamps_inside_a_removed_range() {
        let removed = vec![tr(2.0, 4.0)];
        // t=3 is inside the removed range: shift by (t - range.start) = 1.0
        assert_eq!(shift_for_removed(3.0, &removed, 0.01), 2.0);
    }
}
