use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::animation::interpolant::Interpolant;
use crate::animation::values::ValueType;
use crate::errors::{AnimationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Holds the left key's value (step).
    Discrete,
    #[default]
    Linear,
    /// Hermite interpolation through neighbouring keys.
    Smooth,
    /// glTF cubic spline with explicit in/out tangents per key.
    CubicSpline,
}

impl InterpolationMode {
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "discrete" | "step" => Self::Discrete,
            "linear" => Self::Linear,
            "smooth" => Self::Smooth,
            "cubicspline" => Self::CubicSpline,
            _ => return None,
        })
    }
}

/// Packed keyframe payload.
///
/// Every value type except strings is stored as flat `f32` data (booleans as
/// `0.0`/`1.0`).
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Numeric(Vec<f32>),
    Text(Vec<String>),
}

impl TrackValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One animated channel: a `(time, value)` keyframe series plus its
/// interpolation rule and the path of the property it drives.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    name: String,
    value_type: ValueType,
    times: Vec<f32>,
    values: TrackValues,
    value_size: usize,
    interpolation: InterpolationMode,
}

impl KeyframeTrack {
    /// Creates a numeric track, deriving the value size from the data.
    ///
    /// For `CubicSpline` tracks `values` holds `[in_tangent, value,
    /// out_tangent]` per key, so its length is `times.len() * value_size * 3`.
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        times: Vec<f32>,
        values: Vec<f32>,
        interpolation: InterpolationMode,
    ) -> Result<Self> {
        let name = name.into();
        if value_type == ValueType::String {
            return Err(AnimationError::UnknownValueType(format!(
                "track '{name}': string tracks must be created with KeyframeTrack::string"
            )));
        }
        if times.is_empty() {
            return Err(AnimationError::EmptyTrack { track: name });
        }

        let interpolation = Self::supported_interpolation(&name, value_type, interpolation);
        let factor = if interpolation == InterpolationMode::CubicSpline { 3 } else { 1 };
        let keys = times.len() * factor;
        let value_size = value_type
            .fixed_value_size()
            .unwrap_or(values.len() / keys);
        if value_size == 0 {
            return Err(AnimationError::InvalidValueSize { track: name, value_size });
        }
        if value_type == ValueType::Quaternion && value_size % 4 != 0 {
            return Err(AnimationError::InvalidValueSize { track: name, value_size });
        }

        let expected = keys * value_size;
        if values.len() != expected {
            return Err(AnimationError::ValueCountMismatch {
                track: name,
                expected,
                actual: values.len(),
            });
        }

        let track = Self {
            name,
            value_type,
            times,
            values: TrackValues::Numeric(values),
            value_size,
            interpolation,
        };
        track.validate()?;
        Ok(track)
    }

    pub fn number(name: impl Into<String>, times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        Self::new(name, ValueType::Number, times, values, InterpolationMode::Linear)
    }

    pub fn vector(name: impl Into<String>, times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        Self::new(name, ValueType::Vector, times, values, InterpolationMode::Linear)
    }

    pub fn quaternion(name: impl Into<String>, times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        Self::new(name, ValueType::Quaternion, times, values, InterpolationMode::Linear)
    }

    pub fn color(name: impl Into<String>, times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        Self::new(name, ValueType::Color, times, values, InterpolationMode::Linear)
    }

    pub fn boolean(name: impl Into<String>, times: Vec<f32>, values: &[bool]) -> Result<Self> {
        let values = values.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        Self::new(name, ValueType::Bool, times, values, InterpolationMode::Discrete)
    }

    pub fn string(name: impl Into<String>, times: Vec<f32>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        if times.is_empty() {
            return Err(AnimationError::EmptyTrack { track: name });
        }
        if values.len() != times.len() {
            return Err(AnimationError::ValueCountMismatch {
                track: name,
                expected: times.len(),
                actual: values.len(),
            });
        }
        let track = Self {
            name,
            value_type: ValueType::String,
            times,
            values: TrackValues::Text(values),
            value_size: 1,
            interpolation: InterpolationMode::Discrete,
        };
        track.validate()?;
        Ok(track)
    }

    /// Resolves the interpolation a value type actually supports.
    fn supported_interpolation(name: &str, value_type: ValueType, requested: InterpolationMode) -> InterpolationMode {
        if value_type.is_discrete() && requested != InterpolationMode::Discrete {
            log::warn!("Track '{name}': {value_type:?} tracks only support discrete interpolation");
            return InterpolationMode::Discrete;
        }
        if value_type == ValueType::Quaternion && requested == InterpolationMode::Smooth {
            log::warn!("Track '{name}': smooth interpolation is not supported for quaternions, using linear");
            return InterpolationMode::Linear;
        }
        requested
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[inline]
    #[must_use]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &TrackValues {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn numeric_values(&self) -> Option<&[f32]> {
        match &self.values {
            TrackValues::Numeric(v) => Some(v),
            TrackValues::Text(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn text_values(&self) -> Option<&[String]> {
        match &self.values {
            TrackValues::Text(v) => Some(v),
            TrackValues::Numeric(_) => None,
        }
    }

    /// Components per sampled value (3 for a position, 4 for a quaternion).
    #[inline]
    #[must_use]
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    #[inline]
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    /// Switches between discrete, linear and smooth interpolation.
    ///
    /// The packed layout of cubic-spline tracks differs from the others, so
    /// switching into or out of `CubicSpline` is refused.
    pub fn set_interpolation(&mut self, mode: InterpolationMode) {
        if (mode == InterpolationMode::CubicSpline) != (self.interpolation == InterpolationMode::CubicSpline) {
            log::warn!(
                "Track '{}': cannot switch interpolation {:?} -> {:?}, value layout differs",
                self.name,
                self.interpolation,
                mode
            );
            return;
        }
        self.interpolation = Self::supported_interpolation(&self.name, self.value_type, mode);
    }

    #[inline]
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn start_time(&self) -> f32 {
        self.times.first().copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Packed values per key (value size, tripled for cubic splines).
    #[inline]
    fn key_stride(&self) -> usize {
        if self.interpolation == InterpolationMode::CubicSpline {
            self.value_size * 3
        } else {
            self.value_size
        }
    }

    /// Stateless evaluation at `time`.
    ///
    /// Playback goes through a per-action [`Interpolant`] instead; this is for
    /// tooling and one-off queries.
    #[must_use]
    pub fn sample(&self, time: f32) -> SmallVec<[f32; 4]> {
        let mut interpolant = Interpolant::new(self);
        SmallVec::from_slice(interpolant.evaluate(self, time))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Structural validation: keys present, layout consistent, times finite
    /// and non-decreasing.
    pub fn validate(&self) -> Result<()> {
        if self.times.is_empty() {
            return Err(AnimationError::EmptyTrack { track: self.name.clone() });
        }
        if self.value_size == 0 {
            return Err(AnimationError::InvalidValueSize {
                track: self.name.clone(),
                value_size: self.value_size,
            });
        }

        let expected = self.times.len() * self.key_stride();
        if self.values.len() != expected {
            return Err(AnimationError::ValueCountMismatch {
                track: self.name.clone(),
                expected,
                actual: self.values.len(),
            });
        }

        let mut prev: Option<f32> = None;
        for (index, &time) in self.times.iter().enumerate() {
            if !time.is_finite() {
                return Err(AnimationError::NonFiniteTime { track: self.name.clone(), index });
            }
            if let Some(p) = prev
                && p > time
            {
                return Err(AnimationError::UnsortedTimes { track: self.name.clone(), index });
            }
            prev = Some(time);
        }
        Ok(())
    }

    /// Structural validation plus a scan for NaN / infinite values.
    pub fn validate_strict(&self) -> Result<()> {
        self.validate()?;
        if let Some(values) = self.numeric_values()
            && let Some(index) = values.iter().position(|v| !v.is_finite())
        {
            return Err(AnimationError::NonFiniteValue { track: self.name.clone(), index });
        }
        Ok(())
    }

    // ========================================================================
    // Load-time transforms
    // ========================================================================

    /// Moves all keys by `offset` seconds.
    pub fn shift(&mut self, offset: f32) -> &mut Self {
        if offset != 0.0 {
            for t in &mut self.times {
                *t += offset;
            }
        }
        self
    }

    /// Scales all key times by `factor`.
    pub fn scale(&mut self, factor: f32) -> &mut Self {
        if factor != 1.0 {
            for t in &mut self.times {
                *t *= factor;
            }
        }
        self
    }

    /// Removes keys outside `[start, end]`. At least one key is always kept.
    pub fn trim(&mut self, start: f32, end: f32) -> &mut Self {
        let n = self.times.len();
        let from = self.times.iter().position(|&t| t >= start).unwrap_or(n);
        let to = self.times.iter().rposition(|&t| t <= end).map_or(0, |i| i + 1);

        if from != 0 || to != n {
            // empty tracks are forbidden: keep the key nearest the range
            let (from, to) = if from >= to {
                let to = to.max(1).min(n);
                (to - 1, to)
            } else {
                (from, to)
            };

            let stride = self.key_stride();
            self.times = self.times[from..to].to_vec();
            self.values = match &self.values {
                TrackValues::Numeric(v) => TrackValues::Numeric(v[from * stride..to * stride].to_vec()),
                TrackValues::Text(v) => TrackValues::Text(v[from..to].to_vec()),
            };
        }
        self
    }

    /// Removes keys that duplicate a neighbour's time or are redundant
    /// because both neighbours hold the same value.
    ///
    /// Smooth tracks keep value-redundant keys (they shape the curve);
    /// cubic-spline tracks are left untouched.
    pub fn optimize(&mut self) -> &mut Self {
        if self.interpolation == InterpolationMode::CubicSpline || self.times.len() < 3 {
            return self;
        }

        let smooth = self.interpolation == InterpolationMode::Smooth;
        let stride = self.value_size;
        let last = self.times.len() - 1;
        let mut keep = Vec::with_capacity(self.times.len());
        keep.push(0);

        for i in 1..last {
            let time = self.times[i];
            let time_next = self.times[i + 1];

            let distinct_time = time != time_next && (i != 1 || time != self.times[0]);
            let needed = distinct_time
                && (smooth
                    || match &self.values {
                        TrackValues::Numeric(v) => {
                            let (o, op, on) = (i * stride, (i - 1) * stride, (i + 1) * stride);
                            (0..stride).any(|j| v[o + j] != v[op + j] || v[o + j] != v[on + j])
                        }
                        TrackValues::Text(v) => v[i] != v[i - 1] || v[i] != v[i + 1],
                    });

            if needed {
                keep.push(i);
            }
        }
        keep.push(last);

        if keep.len() != self.times.len() {
            self.times = keep.iter().map(|&i| self.times[i]).collect();
            self.values = match &self.values {
                TrackValues::Numeric(v) => TrackValues::Numeric(
                    keep.iter()
                        .flat_map(|&i| v[i * stride..(i + 1) * stride].iter().copied())
                        .collect(),
                ),
                TrackValues::Text(v) => TrackValues::Text(keep.iter().map(|&i| v[i].clone()).collect()),
            };
        }
        self
    }

    /// Samples this track at the given times, producing a new track with one
    /// key per sample time.
    ///
    /// Discrete tracks stay discrete; everything else becomes linear.
    pub fn resampled(&self, sample_times: &[f32]) -> Result<Self> {
        let mut interpolant = Interpolant::new(self);

        match &self.values {
            TrackValues::Text(strings) => {
                let values = sample_times
                    .iter()
                    .map(|&t| strings[interpolant.key_index(self, t)].clone())
                    .collect();
                Self::string(self.name.clone(), sample_times.to_vec(), values)
            }
            TrackValues::Numeric(_) => {
                let mut values = Vec::with_capacity(sample_times.len() * self.value_size);
                for &t in sample_times {
                    values.extend_from_slice(interpolant.evaluate(self, t));
                }
                let mode = if self.interpolation == InterpolationMode::Discrete {
                    InterpolationMode::Discrete
                } else {
                    InterpolationMode::Linear
                };
                Self::new(self.name.clone(), self.value_type, sample_times.to_vec(), values, mode)
            }
        }
    }

    /// Resamples at a uniform `fps` between the first and the last key.
    pub fn resample(&self, fps: f32) -> Result<Self> {
        if fps <= 0.0 || !fps.is_finite() {
            return Err(AnimationError::InvalidArgument(format!("fps must be positive, got {fps}")));
        }

        let (start, end) = (self.start_time(), self.end_time());
        let frame_count = ((end - start) * fps).ceil() as usize;
        let mut times: Vec<f32> = (0..frame_count).map(|i| start + i as f32 / fps).collect();
        if times.last().is_none_or(|&t| t < end) {
            times.push(end);
        }
        self.resampled(&times)
    }

    /// Mutable access to the packed value of key `k` (the middle entry for
    /// cubic splines). `None` for text tracks.
    pub(crate) fn key_value_mut(&mut self, k: usize) -> Option<&mut [f32]> {
        let stride = self.key_stride();
        let size = self.value_size;
        let offset = if self.interpolation == InterpolationMode::CubicSpline { k * stride + size } else { k * stride };
        match &mut self.values {
            TrackValues::Numeric(v) => v.get_mut(offset..offset + size),
            TrackValues::Text(_) => None,
        }
    }
}
