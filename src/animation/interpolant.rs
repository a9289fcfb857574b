use smallvec::SmallVec;

use crate::animation::tracks::{InterpolationMode, KeyframeTrack};
use crate::animation::values::{ValueType, cubic_spline, lerp, quat_at, slerp, store_quat};

const MAX_SCAN_OFFSET: usize = 3;

/// Boundary behavior of the smooth interpolant outside the first/last segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ending {
    /// f'' = 0 at the boundary (natural spline).
    #[default]
    ZeroCurvature,
    /// f' = 0 at the boundary.
    ZeroSlope,
    /// Uses the keys at the other end of the clip, for seamless loops.
    WrapAround,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Endings {
    pub start: Ending,
    pub end: Ending,
}

/// Result of locating a time inside a key array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Outside the keyed range (or a single key): hold key `k`.
    Clamped(usize),
    /// `times[i] <= t < times[i + 1]`.
    Between(usize),
}

#[derive(Debug, Clone, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

impl KeyframeCursor {
    /// Locates `time` in `times`, using the previous segment as a hint.
    ///
    /// Monotonic playback hits the short linear scan; seeks, loop wraps and
    /// direction reversals fall back to a binary search.
    pub fn locate(&mut self, times: &[f32], time: f32) -> Segment {
        let len = times.len();
        if len <= 1 {
            return Segment::Clamped(0);
        }

        // NaN: hold whatever we evaluated last
        if time.is_nan() {
            return Segment::Clamped(self.last_index.min(len - 1));
        }

        if time < times[0] {
            self.last_index = 0;
            return Segment::Clamped(0);
        }
        if time >= times[len - 1] {
            self.last_index = len - 1;
            return Segment::Clamped(len - 1);
        }

        // times[0] <= time < times[len - 1]: some segment [i, i + 1] contains it
        let i = self.last_index.min(len - 2);

        let found = if time >= times[i] {
            // Forward playback: check [i, i+1), [i+1, i+2), ...
            let mut res = None;
            for offset in 0..=MAX_SCAN_OFFSET {
                let idx = i + offset;
                if idx > len - 2 {
                    break;
                }
                if time < times[idx + 1] {
                    res = Some(idx);
                    break;
                }
            }
            res
        } else {
            // Reverse playback: walk left until the left boundary holds
            let mut res = None;
            for offset in 1..=MAX_SCAN_OFFSET {
                if i < offset {
                    break;
                }
                let idx = i - offset;
                if time >= times[idx] {
                    res = Some(idx);
                    break;
                }
            }
            res
        };

        let index = found.unwrap_or_else(|| {
            // Large jump: binary search. partition_point returns the first key > time.
            let next_idx = times.partition_point(|&t| t <= time);
            next_idx.saturating_sub(1).min(len - 2)
        });

        self.last_index = index;
        Segment::Between(index)
    }
}

#[derive(Debug, Clone, Copy)]
struct SmoothWeights {
    segment: usize,
    endings: Endings,
    prev_key: usize,
    next_key: usize,
    weight_prev: f32,
    weight_next: f32,
}

/// Stateful evaluator of one track for one action.
///
/// Interpolants are not shared: each caches its last segment and owns its
/// result buffer. The track itself is passed in on every evaluation, so the
/// interpolant never borrows from the clip.
#[derive(Debug, Clone)]
pub struct Interpolant {
    cursor: KeyframeCursor,
    result: SmallVec<[f32; 4]>,
    pub endings: Endings,
    smooth: Option<SmoothWeights>,
}

impl Interpolant {
    #[must_use]
    pub fn new(track: &KeyframeTrack) -> Self {
        Self {
            cursor: KeyframeCursor::default(),
            result: SmallVec::from_elem(0.0, track.value_size()),
            endings: Endings::default(),
            smooth: None,
        }
    }

    /// The last evaluated value.
    #[inline]
    #[must_use]
    pub fn result(&self) -> &[f32] {
        &self.result
    }

    /// Index of the key whose value a discrete evaluation at `time` yields.
    pub fn key_index(&mut self, track: &KeyframeTrack, time: f32) -> usize {
        match self.cursor.locate(track.times(), time) {
            Segment::Clamped(k) | Segment::Between(k) => k,
        }
    }

    /// Evaluates a numeric track at `time`.
    ///
    /// Text tracks have no numeric payload; use [`Self::key_index`] for them.
    pub fn evaluate(&mut self, track: &KeyframeTrack, time: f32) -> &[f32] {
        let Some(values) = track.numeric_values() else {
            return &self.result;
        };
        let stride = track.value_size();
        if self.result.len() != stride {
            self.result.resize(stride, 0.0);
        }

        let times = track.times();
        let segment = self.cursor.locate(times, time);
        let mode = track.interpolation();

        match segment {
            Segment::Clamped(k) => {
                let offset = key_offset(mode, k, stride);
                self.result.copy_from_slice(&values[offset..offset + stride]);
            }
            Segment::Between(i) => {
                let t0 = times[i];
                let t1 = times[i + 1];
                let dt = t1 - t0;
                // Prevent division by zero on coincident keys
                let p = if dt > 1e-6 { ((time - t0) / dt).clamp(0.0, 1.0) } else { 0.0 };

                match mode {
                    InterpolationMode::Discrete => {
                        let offset = i * stride;
                        self.result.copy_from_slice(&values[offset..offset + stride]);
                    }
                    InterpolationMode::Linear => {
                        self.interpolate_linear(track.value_type(), values, i, p, stride);
                    }
                    InterpolationMode::Smooth => {
                        self.interpolate_smooth(times, values, i, time, stride);
                    }
                    InterpolationMode::CubicSpline => {
                        self.interpolate_cubic_spline(track.value_type(), values, i, p, dt, stride);
                    }
                }
            }
        }

        &self.result
    }

    fn interpolate_linear(&mut self, value_type: ValueType, values: &[f32], i: usize, p: f32, stride: usize) {
        let o0 = i * stride;
        let o1 = o0 + stride;

        if value_type == ValueType::Quaternion {
            // Shortest-arc slerp per packed quaternion
            for q in (0..stride).step_by(4) {
                let a = quat_at(values, o0 + q);
                let b = quat_at(values, o1 + q);
                store_quat(&mut self.result, q, slerp(a, b, p));
            }
        } else {
            for k in 0..stride {
                self.result[k] = lerp(values[o0 + k], values[o1 + k], p);
            }
        }
    }

    fn interpolate_smooth(&mut self, times: &[f32], values: &[f32], i: usize, time: f32, stride: usize) {
        let weights = match self.smooth {
            Some(w) if w.segment == i && w.endings == self.endings => w,
            _ => {
                let w = smooth_weights(times, i, self.endings);
                self.smooth = Some(w);
                w
            }
        };

        let t0 = times[i];
        let t1 = times[i + 1];
        let p = if t1 - t0 > 1e-6 { (time - t0) / (t1 - t0) } else { 0.0 };
        let pp = p * p;
        let ppp = pp * p;
        let wp = weights.weight_prev;
        let wn = weights.weight_next;

        let sp = -wp * ppp + 2.0 * wp * pp - wp * p;
        let s0 = (1.0 + wp) * ppp + (-1.5 - 2.0 * wp) * pp + (-0.5 + wp) * p + 1.0;
        let s1 = (-1.0 - wn) * ppp + (1.5 + wn) * pp + 0.5 * p;
        let sn = wn * ppp - wn * pp;

        let op = weights.prev_key * stride;
        let o0 = i * stride;
        let o1 = o0 + stride;
        let on = weights.next_key * stride;

        for k in 0..stride {
            self.result[k] =
                sp * values[op + k] + s0 * values[o0 + k] + s1 * values[o1 + k] + sn * values[on + k];
        }
    }

    fn interpolate_cubic_spline(
        &mut self,
        value_type: ValueType,
        values: &[f32],
        i: usize,
        p: f32,
        dt: f32,
        stride: usize,
    ) {
        // Layout per key: [in_tangent | value | out_tangent]
        let prev = i * stride * 3;
        let next = (i + 1) * stride * 3;

        for k in 0..stride {
            let v0 = values[prev + stride + k];
            let out_tangent0 = values[prev + 2 * stride + k];
            let in_tangent1 = values[next + k];
            let v1 = values[next + stride + k];
            self.result[k] = cubic_spline(v0, out_tangent0, in_tangent1, v1, p, dt);
        }

        if value_type == ValueType::Quaternion {
            for q in (0..stride).step_by(4) {
                let normalized = quat_at(&self.result, q).normalize();
                store_quat(&mut self.result, q, normalized);
            }
        }
    }
}

/// Offset of key `k`'s value inside the packed value array.
#[inline]
fn key_offset(mode: InterpolationMode, k: usize, stride: usize) -> usize {
    match mode {
        InterpolationMode::CubicSpline => k * stride * 3 + stride,
        _ => k * stride,
    }
}

fn smooth_weights(times: &[f32], i: usize, endings: Endings) -> SmoothWeights {
    let len = times.len();
    let t0 = times[i];
    let t1 = times[i + 1];

    let (prev_key, t_prev) = if i >= 1 {
        (i - 1, times[i - 1])
    } else {
        match endings.start {
            Ending::ZeroSlope => (i + 1, 2.0 * t0 - t1),
            Ending::WrapAround => (len - 2, t0 + times[len - 2] - times[len - 1]),
            Ending::ZeroCurvature => (i + 1, t1),
        }
    };

    let (next_key, t_next) = if i + 2 < len {
        (i + 2, times[i + 2])
    } else {
        match endings.end {
            Ending::ZeroSlope => (i, 2.0 * t1 - t0),
            Ending::WrapAround => (1, t1 + times[1] - times[0]),
            Ending::ZeroCurvature => (i, t0),
        }
    };

    let half_dt = (t1 - t0) * 0.5;
    let safe_div = |den: f32| if den.abs() > f32::EPSILON { half_dt / den } else { 0.0 };

    SmoothWeights {
        segment: i,
        endings,
        prev_key,
        next_key,
        weight_prev: safe_div(t0 - t_prev),
        weight_next: safe_div(t_next - t1),
    }
}
