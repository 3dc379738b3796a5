//! # Sweep Window Module
//!
//! Lays a time series out as an oscilloscope-style sweep: the x-axis always
//! spans one period, the current sweep (foreground) is drawn over the tail of
//! the previous one (background), and when the foreground reaches the right
//! edge it becomes the background of the next sweep.
//!
//! ## Coordinates
//! Every point maps to `x = (ts - phase) mod period`, where `phase` is fixed by
//! the start of the current sweep. Background and foreground share that frame,
//! so a background point at `x` is exactly one period older than a foreground
//! point at the same `x`.
//!
//! ## State
//! [`SweepContext`] remembers where the current sweep started. It is set from
//! the first batch and afterwards only moves forward in whole periods.

use crate::timeseries::{PlotPoint, PointSliceExt, TimedPoint};
use std::time::Duration;

/// Start of the current sweep, one per chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepContext {
    first_ts_of_foreground: Option<i64>,
}

impl SweepContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_ts_of_foreground(&self) -> Option<i64> {
        self.first_ts_of_foreground
    }

    /// Move the sweep start for a batch spanning `first_ts..=last_ts`.
    fn advance(&mut self, first_ts: i64, last_ts: i64, period: i64, has_wraparound: bool) -> i64 {
        let start = match self.first_ts_of_foreground {
            None if has_wraparound => last_ts,
            None => first_ts,
            Some(start) if start.saturating_add(period) < last_ts => {
                start + period * (last_ts - start).div_euclid(period)
            }
            Some(start) => start,
        };

        if self.first_ts_of_foreground != Some(start) {
            log::debug!("Sweep starts at {} (was {:?})", start, self.first_ts_of_foreground);
        }
        self.first_ts_of_foreground = Some(start);
        start
    }
}

/// The two traces of one sweep frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepLines {
    /// Tail of the previous sweep
    pub background: Vec<PlotPoint>,
    /// Current sweep so far
    pub foreground: Vec<PlotPoint>,
}

impl SweepLines {
    pub fn is_empty(&self) -> bool {
        self.background.is_empty() && self.foreground.is_empty()
    }

    /// Smallest row id still on screen, used as the next pull cursor.
    pub fn next_cursor(&self) -> Option<i64> {
        self.background
            .min_id()
            .or_else(|| self.foreground.min_id())
    }

    /// Where the foreground currently ends.
    pub fn sweep_position(&self) -> Option<i64> {
        self.foreground.last().map(|point| point.x)
    }

    /// Background points not yet overdrawn by the foreground.
    pub fn visible_background(&self) -> &[PlotPoint] {
        match self.sweep_position() {
            Some(position) => {
                let hidden = self
                    .background
                    .iter()
                    .take_while(|point| point.x <= position)
                    .count();
                &self.background[hidden..]
            }
            None => &self.background,
        }
    }

    /// Value range over both traces, for axis scaling.
    pub fn y_range(&self) -> Option<(f64, f64)> {
        let ranges = [self.background.min_max_y(), self.foreground.min_max_y()];
        ranges.into_iter().flatten().reduce(|(min_a, max_a), (min_b, max_b)| {
            (min_a.min(min_b), max_a.max(max_b))
        })
    }
}

/// Split `data` (ascending by `ts`) into background and foreground traces.
///
/// Empty data, or a zero period, leaves `context` untouched and yields no
/// lines.
pub fn get_lines(data: &[TimedPoint], period: Duration, context: &mut SweepContext) -> SweepLines {
    let period = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
    let (Some(first), Some(last)) = (data.first(), data.last()) else {
        return SweepLines::default();
    };
    if period == 0 {
        return SweepLines::default();
    }

    let has_wraparound = last.ts - first.ts > period;
    let start = context.advance(first.ts, last.ts, period, has_wraparound);

    let phase = if has_wraparound { start } else { first.ts }.rem_euclid(period);
    let place = |point: &TimedPoint| PlotPoint {
        id: point.id,
        x: (point.ts - phase).rem_euclid(period),
        y: point.y,
    };

    if !has_wraparound {
        return SweepLines {
            background: Vec::new(),
            foreground: data.iter().map(place).collect(),
        };
    }

    SweepLines {
        background: data
            .iter()
            .filter(|point| start - period <= point.ts && point.ts < start)
            .map(place)
            .collect(),
        foreground: data
            .iter()
            .filter(|point| start <= point.ts)
            .map(place)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD_MS: i64 = 60_000;
    const PERIOD: Duration = Duration::from_secs(60);
    const BASE_TS: i64 = 1_700_000_012_345;

    fn pt(id: i64, ts: i64, y: f64) -> TimedPoint {
        TimedPoint { id, ts, y }
    }

    fn xy(points: &[PlotPoint]) -> Vec<(i64, f64)> {
        points.iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn test_empty_data() {
        let mut context = SweepContext::new();
        let lines = get_lines(&[], PERIOD, &mut context);

        assert!(lines.is_empty());
        assert_eq!(context.first_ts_of_foreground(), None);
    }

    #[test]
    fn test_single_point() {
        let mut context = SweepContext::new();
        let lines = get_lines(&[pt(1, BASE_TS, 1.0)], PERIOD, &mut context);

        assert!(lines.background.is_empty());
        assert_eq!(xy(&lines.foreground), vec![(0, 1.0)]);
        assert_eq!(context.first_ts_of_foreground(), Some(BASE_TS));
    }

    #[test]
    fn test_first_batch_with_wraparound() {
        let data = [
            pt(1, BASE_TS - (PERIOD_MS + 10), 1.0),
            pt(2, BASE_TS - (PERIOD_MS - 10), 2.0),
            pt(3, BASE_TS, 3.0),
        ];
        let mut context = SweepContext::new();
        let lines = get_lines(&data, PERIOD, &mut context);

        assert_eq!(xy(&lines.background), vec![(10, 2.0)]);
        assert_eq!(xy(&lines.foreground), vec![(0, 3.0)]);
        assert_eq!(context.first_ts_of_foreground(), Some(BASE_TS));
    }

    #[test]
    fn test_known_sweep_start_is_kept() {
        let data = [
            pt(1, BASE_TS - (PERIOD_MS + 10), 1.0),
            pt(2, BASE_TS - (PERIOD_MS - 10), 2.0),
            pt(3, BASE_TS, 3.0),
            pt(4, BASE_TS + 10, 4.0),
        ];
        let mut context = SweepContext {
            first_ts_of_foreground: Some(BASE_TS),
        };
        let lines = get_lines(&data, PERIOD, &mut context);

        assert_eq!(xy(&lines.background), vec![(10, 2.0)]);
        assert_eq!(xy(&lines.foreground), vec![(0, 3.0), (10, 4.0)]);
        assert_eq!(context.first_ts_of_foreground(), Some(BASE_TS));
    }

    #[test]
    fn test_sweep_advances_by_whole_period() {
        let data = [
            pt(1, BASE_TS - (PERIOD_MS + 10), 1.0),
            pt(2, BASE_TS - (PERIOD_MS - 10), 2.0),
            pt(3, BASE_TS, 3.0),
            pt(4, BASE_TS + 10, 4.0),
            pt(5, BASE_TS + PERIOD_MS + 10, 5.0),
        ];
        let mut context = SweepContext {
            first_ts_of_foreground: Some(BASE_TS),
        };
        let lines = get_lines(&data, PERIOD, &mut context);

        assert_eq!(xy(&lines.background), vec![(0, 3.0), (10, 4.0)]);
        assert_eq!(xy(&lines.foreground), vec![(10, 5.0)]);
        assert_eq!(context.first_ts_of_foreground(), Some(BASE_TS + PERIOD_MS));
    }

    #[test]
    fn test_sweep_skips_idle_periods() {
        let data = [pt(1, BASE_TS + 5 * PERIOD_MS + 30, 1.0)];
        let mut context = SweepContext {
            first_ts_of_foreground: Some(BASE_TS),
        };
        get_lines(&data, PERIOD, &mut context);

        assert_eq!(context.first_ts_of_foreground(), Some(BASE_TS + 5 * PERIOD_MS));
    }

    #[test]
    fn test_every_point_in_window_lands_once() {
        let data: Vec<TimedPoint> = (0..300)
            .map(|i| pt(i, BASE_TS + i * 500, i as f64))
            .collect();
        let mut context = SweepContext::new();
        let lines = get_lines(&data, PERIOD, &mut context);
        let start = context.first_ts_of_foreground().unwrap();

        let mut ids: Vec<i64> = lines
            .background
            .iter()
            .chain(lines.foreground.iter())
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), lines.background.len() + lines.foreground.len());

        let expected = data.iter().filter(|p| p.ts >= start - PERIOD_MS).count();
        assert_eq!(ids.len(), expected);
        assert!(lines
            .background
            .iter()
            .chain(lines.foreground.iter())
            .all(|p| (0..PERIOD_MS).contains(&p.x)));
    }

    #[test]
    fn test_background_and_foreground_share_phase() {
        let data: Vec<TimedPoint> = (0..10)
            .map(|i| pt(i, BASE_TS + i * 15_000, i as f64))
            .collect();
        let mut context = SweepContext::new();
        let lines = get_lines(&data, PERIOD, &mut context);

        // A background point sits at the same x as the foreground point one period later
        for fg in &lines.foreground {
            let fg_ts = data[fg.id as usize].ts;
            if let Some(bg) = lines
                .background
                .iter()
                .find(|bg| data[bg.id as usize].ts == fg_ts - PERIOD_MS)
            {
                assert_eq!(bg.x, fg.x);
            }
        }
    }

    #[test]
    fn test_zero_period_yields_nothing() {
        let mut context = SweepContext::new();
        let lines = get_lines(&[pt(1, 10, 1.0)], Duration::ZERO, &mut context);

        assert!(lines.is_empty());
        assert_eq!(context.first_ts_of_foreground(), None);
    }

    #[test]
    fn test_next_cursor_prefers_background() {
        let lines = SweepLines {
            background: vec![PlotPoint { id: 8, x: 5, y: 0.0 }, PlotPoint { id: 6, x: 9, y: 0.0 }],
            foreground: vec![PlotPoint { id: 2, x: 0, y: 0.0 }],
        };
        assert_eq!(lines.next_cursor(), Some(6));

        let lines = SweepLines {
            background: Vec::new(),
            foreground: vec![PlotPoint { id: 4, x: 0, y: 0.0 }, PlotPoint { id: 5, x: 1, y: 0.0 }],
        };
        assert_eq!(lines.next_cursor(), Some(4));
        assert_eq!(SweepLines::default().next_cursor(), None);
    }

    #[test]
    fn test_visible_background_hides_overdrawn_part() {
        let lines = SweepLines {
            background: (0..6).map(|i| PlotPoint { id: i, x: i * 10, y: 0.0 }).collect(),
            foreground: vec![
                PlotPoint { id: 10, x: 0, y: 1.0 },
                PlotPoint { id: 11, x: 20, y: 1.0 },
            ],
        };

        assert_eq!(lines.sweep_position(), Some(20));
        let visible: Vec<i64> = lines.visible_background().iter().map(|p| p.x).collect();
        assert_eq!(visible, vec![30, 40, 50]);
    }

    #[test]
    fn test_y_range_spans_both_traces() {
        let lines = SweepLines {
            background: vec![PlotPoint { id: 1, x: 0, y: -3.0 }],
            foreground: vec![PlotPoint { id: 2, x: 0, y: 12.0 }, PlotPoint { id: 3, x: 1, y: 4.0 }],
        };
        assert_eq!(lines.y_range(), Some((-3.0, 12.0)));
        assert_eq!(SweepLines::default().y_range(), None);
    }
}
