//! # Protocol Decoder Module
//!
//! Turns the ventilator's ASCII stream into typed samples and parameter
//! readbacks. Chunks arrive with arbitrary boundaries; a frame cut by a chunk
//! boundary is carried in the link's [`FrameCache`] and completed by a later
//! call.
//!
//! ## Wire Format
//! ```text
//! t2121p10.3f3.2i10e123.3n55v350;   sample frame: tagged numeric fields
//! sp25;  sb18;  si20;  sm1;          parameter readbacks (integer)
//! ```
//!
//! | tag | meaning                 | type |
//! |-----|-------------------------|------|
//! | `t` | device time (ms)        | int  |
//! | `p` | pressure sample         | float|
//! | `f` | flow sample             | float|
//! | `i` | PIP                     | float|
//! | `e` | PEEP                    | float|
//! | `n` | cycle count             | float|
//! | `j` | trigger sensitivity     | float|
//! | `v` | tidal volume            | float|
//! | `m` | ventilation mode        | int  |
//!
//! ## Failure Handling
//! Decoding never fails. A malformed number drops only its field, an unknown
//! tag is skipped, a malformed parameter readback drops its frame. A frame
//! that never receives its delimiter stays in the cache and is never emitted.

use crate::fields::{self, Field};
use crate::frame::{self, FrameCache};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One point of the pressure or flow channel. Flow samples keep their value
/// in `p` as well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Device-relative milliseconds
    pub t: i64,
    pub p: f64,
}

/// Sparse parameter readbacks. `None` means "not reported", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterSet {
    pub pres_control: Option<i32>,
    pub bpm: Option<i32>,
    pub ie_ratio: Option<i32>,
    pub pip: Option<f64>,
    pub peep: Option<f64>,
    pub volume: Option<f64>,
    pub mode: Option<i32>,
    pub cycle_count: Option<f64>,
    pub sens: Option<f64>,
}

impl ParameterSet {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay the fields present in `update`, keeping the others.
    pub fn merge(&mut self, update: &ParameterSet) {
        fn overlay<T: Copy>(current: &mut Option<T>, update: Option<T>) {
            if update.is_some() {
                *current = update;
            }
        }

        overlay(&mut self.pres_control, update.pres_control);
        overlay(&mut self.bpm, update.bpm);
        overlay(&mut self.ie_ratio, update.ie_ratio);
        overlay(&mut self.pip, update.pip);
        overlay(&mut self.peep, update.peep);
        overlay(&mut self.volume, update.volume);
        overlay(&mut self.mode, update.mode);
        overlay(&mut self.cycle_count, update.cycle_count);
        overlay(&mut self.sens, update.sens);
    }

    /// I:E ratio as the `x` of `1:x`. The device reports it in tenths.
    pub fn ie_ratio_value(&self) -> Option<f64> {
        self.ie_ratio.map(|raw| f64::from(raw) / 10.0)
    }
}

/// Output of one decode call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub parameters: ParameterSet,
    pub pressure: Vec<Sample>,
    /// Empty when no flow field was seen in the call
    pub flow: Vec<Sample>,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty() && self.flow.is_empty() && self.parameters.is_empty()
    }
}

/// What to do with text after the last delimiter of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailingFragment {
    /// Always hold the fragment until its delimiter arrives.
    #[default]
    Hold,
    /// Decode an unterminated sample frame right away if it already yields a
    /// sample; hold everything else.
    ///
    /// A chunk that ends inside a number emits the truncated value, and the
    /// rest of that number is dropped with the next call as an untagged frame.
    EmitSampled,
}

#[derive(Debug, Clone, Copy)]
enum Readback {
    PresControl,
    Bpm,
    IeRatio,
    Mode,
}

impl Readback {
    fn from_prefix(frame: &str) -> Option<(Self, &str)> {
        let readback = match frame.get(..2)? {
            "sp" => Readback::PresControl,
            "sb" => Readback::Bpm,
            "si" => Readback::IeRatio,
            "sm" => Readback::Mode,
            _ => return None,
        };
        Some((readback, &frame[2..]))
    }

    fn apply(self, value: i32, params: &mut ParameterSet) {
        let slot = match self {
            Readback::PresControl => &mut params.pres_control,
            Readback::Bpm => &mut params.bpm,
            Readback::IeRatio => &mut params.ie_ratio,
            Readback::Mode => &mut params.mode,
        };
        *slot = Some(value);
    }
}

/// Typed content of one sample frame before it is merged into the output.
#[derive(Debug, Default)]
struct SampleFrame {
    t: Option<i64>,
    p: Option<f64>,
    f: Option<f64>,
    scalars: ParameterSet,
}

fn parse_field<T: FromStr>(field: &Field<'_>) -> Option<T> {
    match field.text.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::trace!("Dropping malformed field {}{:?}", field.tag, field.text);
            None
        }
    }
}

fn set_parsed<T: FromStr>(slot: &mut Option<T>, field: &Field<'_>) {
    if let Some(value) = parse_field(field) {
        *slot = Some(value);
    }
}

impl SampleFrame {
    fn parse(frame: &str) -> Self {
        let mut parsed = SampleFrame::default();

        for field in fields::tokenize(frame) {
            match field.tag {
                't' => set_parsed(&mut parsed.t, &field),
                'p' => set_parsed(&mut parsed.p, &field),
                'f' => set_parsed(&mut parsed.f, &field),
                'i' => set_parsed(&mut parsed.scalars.pip, &field),
                'e' => set_parsed(&mut parsed.scalars.peep, &field),
                'n' => set_parsed(&mut parsed.scalars.cycle_count, &field),
                'j' => set_parsed(&mut parsed.scalars.sens, &field),
                'v' => set_parsed(&mut parsed.scalars.volume, &field),
                'm' => set_parsed(&mut parsed.scalars.mode, &field),
                other => log::trace!("Ignoring unknown tag {:?}", other),
            }
        }

        parsed
    }

    fn has_sample(&self) -> bool {
        self.t.is_some() && (self.p.is_some() || self.f.is_some())
    }

    fn apply(self, out: &mut Decoded) {
        if let Some(t) = self.t {
            if let Some(p) = self.p {
                out.pressure.push(Sample { t, p });
            }
            if let Some(f) = self.f {
                out.flow.push(Sample { t, p: f });
            }
        }
        out.parameters.merge(&self.scalars);
    }
}

fn decode_frame(frame: &str, out: &mut Decoded) {
    let frame = frame.trim();
    if frame.is_empty() {
        return;
    }

    match Readback::from_prefix(frame) {
        Some((readback, rest)) => match rest.trim().parse::<i32>() {
            Ok(value) => readback.apply(value, &mut out.parameters),
            Err(_) => log::trace!("Dropping malformed readback {:?}", frame),
        },
        None => SampleFrame::parse(frame).apply(out),
    }
}

fn emit_if_sampled(frame: &str, out: &mut Decoded) -> bool {
    let parsed = SampleFrame::parse(frame);
    if !parsed.has_sample() {
        return false;
    }
    parsed.apply(out);
    true
}

/// Decode `chunk` using and updating `cache`, with the default
/// [`TrailingFragment`] policy.
pub fn decode(chunk: &str, cache: &mut FrameCache) -> Decoded {
    decode_with(chunk, cache, TrailingFragment::default())
}

/// Decode `chunk` using and updating `cache`.
///
/// Must not be called concurrently for the same cache.
pub fn decode_with(chunk: &str, cache: &mut FrameCache, policy: TrailingFragment) -> Decoded {
    let frames = frame::scan(chunk, cache);
    let mut out = Decoded::default();

    for frame in frames.complete() {
        decode_frame(frame, &mut out);
    }

    if let Some(fragment) = frames.trailing() {
        let trimmed = fragment.trim();
        let emitted = policy == TrailingFragment::EmitSampled
            && Readback::from_prefix(trimmed).is_none()
            && emit_if_sampled(trimmed, &mut out);

        if !emitted {
            log::debug!("Holding unterminated fragment {:?}", fragment);
            cache.hold(fragment);
        }
    }

    out
}

/// Stateful decoder for one link, owning its cache.
#[derive(Debug, Default)]
pub struct Decoder {
    cache: FrameCache,
    policy: TrailingFragment,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: TrailingFragment) -> Self {
        Self {
            cache: FrameCache::new(),
            policy,
        }
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn decode(&mut self, chunk: &str) -> Decoded {
        decode_with(chunk, &mut self.cache, self.policy)
    }
}
