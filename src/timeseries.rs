/// A stored measurement row as the chart pipeline sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    /// Monotonic row id
    pub id: i64,
    /// Local receipt time (ms since epoch)
    pub ts: i64,
    /// Device-relative time (ms, unknown epoch)
    pub millis: i64,
    pub y: f64,
}

/// A raw point with its reconstructed absolute timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPoint {
    pub ts: i64,
    pub raw: RawPoint,
}

/// Input to the sweep divider: absolute time, row id and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPoint {
    pub id: i64,
    pub ts: i64,
    pub y: f64,
}

impl From<CorrectedPoint> for TimedPoint {
    fn from(point: CorrectedPoint) -> Self {
        Self {
            id: point.raw.id,
            ts: point.ts,
            y: point.raw.y,
        }
    }
}

/// A point placed on the sweep, `x` in `[0, period)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub id: i64,
    pub x: i64,
    pub y: f64,
}

pub trait PointSliceExt {
    fn min_id(&self) -> Option<i64>;
    fn min_max_y(&self) -> Option<(f64, f64)>;
}

// Implement the trait for a slice of `PlotPoint`
impl PointSliceExt for [PlotPoint] {
    fn min_id(&self) -> Option<i64> {
        self.iter().map(|point| point.id).min()
    }

    fn min_max_y(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some((point.y, point.y)),
            Some((min, max)) => Some((min.min(point.y), max.max(point.y))),
        })
    }
}
