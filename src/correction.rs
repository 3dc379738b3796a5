//! # Timestamp Correction Module
//!
//! Rebuilds absolute timestamps from the device's millisecond counter. The
//! counter has an unknown epoch and restarts when the device resets, so it is
//! anchored to the local receipt time of the first point and re-anchored
//! whenever it goes backwards. Points before a re-anchor are left as they were.

use crate::timeseries::{CorrectedPoint, RawPoint};

/// Anchor state carried across correction calls, one per corrected channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionContext {
    offset: Option<i64>,
    prev_millis: Option<i64>,
}

impl CorrectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current device-to-local offset, if anchored.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn prev_millis(&self) -> Option<i64> {
        self.prev_millis
    }

    /// Correct one point, updating the anchor.
    pub fn correct_point(&mut self, point: RawPoint) -> CorrectedPoint {
        let regressed = self.prev_millis.is_some_and(|prev| point.millis < prev);

        let offset = match self.offset {
            Some(offset) if !regressed => offset,
            _ => {
                let offset = point.ts - point.millis;
                if regressed {
                    log::debug!(
                        "Device clock went back from {:?} to {}, re-anchoring at offset {}",
                        self.prev_millis,
                        point.millis,
                        offset
                    );
                }
                self.offset = Some(offset);
                offset
            }
        };

        self.prev_millis = Some(point.millis);

        CorrectedPoint {
            ts: point.millis + offset,
            raw: point,
        }
    }
}

/// Correct `points` in input order.
pub fn correct(points: &[RawPoint], context: &mut CorrectionContext) -> Vec<CorrectedPoint> {
    points
        .iter()
        .map(|&point| context.correct_point(point))
        .collect()
}
