use std::sync::Arc;

use glam::Quat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animation::tracks::KeyframeTrack;
use crate::animation::values::{ArrayValue, ValueType};
use crate::errors::{AnimationError, Result};

/// How an action's contributions combine with other writers of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Weighted average with the other normal contributions.
    #[default]
    Normal,
    /// Summed on top of the normally blended pose.
    Additive,
}

/// An immutable, named, timed collection of keyframe tracks.
///
/// Clips are shared between actions behind an `Arc`; every transform utility
/// returns a new clip. Evaluation happens per track through the interpolants
/// owned by each action.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    name: String,
    uuid: Uuid,
    duration: f32,
    tracks: Vec<KeyframeTrack>,
    blend_mode: BlendMode,
}

impl AnimationClip {
    /// Creates a clip whose duration is the latest key time over all tracks.
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Result<Self> {
        Self::with_duration(name, None, tracks)
    }

    /// Creates a clip with an explicit duration (`None` derives it).
    pub fn with_duration(name: impl Into<String>, duration: Option<f32>, tracks: Vec<KeyframeTrack>) -> Result<Self> {
        let mut clip = Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            duration: 0.0,
            tracks,
            blend_mode: BlendMode::Normal,
        };
        clip.validate()?;

        match duration {
            Some(d) if d.is_finite() && d >= 0.0 => clip.duration = d,
            _ => {
                clip.reset_duration();
            }
        }
        Ok(clip)
    }

    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    #[must_use]
    pub(crate) fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn tracks(&self) -> &[KeyframeTrack] {
        &self.tracks
    }

    #[inline]
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Recomputes the duration as the latest key time over all tracks.
    pub fn reset_duration(&mut self) -> &mut Self {
        self.duration = self
            .tracks
            .iter()
            .map(KeyframeTrack::end_time)
            .fold(0.0_f32, f32::max);
        self
    }

    /// Rejects clips without tracks and tracks with inconsistent layout or
    /// unordered times.
    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(AnimationError::EmptyClip { clip: self.name.clone() });
        }
        self.tracks.iter().try_for_each(KeyframeTrack::validate)
    }

    /// [`Self::validate`] plus rejection of NaN / infinite keyframe values.
    pub fn validate_strict(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(AnimationError::EmptyClip { clip: self.name.clone() });
        }
        self.tracks.iter().try_for_each(KeyframeTrack::validate_strict)
    }

    /// Finds a clip by name.
    #[must_use]
    pub fn find_by_name<'a>(clips: &'a [Arc<AnimationClip>], name: &str) -> Option<&'a Arc<AnimationClip>> {
        clips.iter().find(|clip| clip.name == name)
    }

    // ========================================================================
    // Structural transforms
    // ========================================================================

    /// Drops redundant keys from every track. Meant to run once at load time.
    pub fn optimize(&mut self) -> &mut Self {
        for track in &mut self.tracks {
            track.optimize();
        }
        self
    }

    /// Returns a new clip holding only the keys in `[start, end]`, shifted so
    /// that `start` becomes time zero.
    pub fn trim(&self, start: f32, end: f32) -> Result<Self> {
        if !(start.is_finite() && end.is_finite()) || end < start {
            return Err(AnimationError::InvalidArgument(format!(
                "trim range [{start}, {end}] of clip '{}' is empty",
                self.name
            )));
        }

        let tracks = self
            .tracks
            .iter()
            .map(|track| {
                let mut track = track.clone();
                track.trim(start, end).shift(-start);
                track
            })
            .collect();

        Ok(Self::with_duration(self.name.clone(), Some(end - start), tracks)?.with_blend_mode(self.blend_mode))
    }

    /// Cuts the frame range `[start_frame, end_frame)` (at `fps`) into a new
    /// clip named `name`. Tracks without keys in the range are dropped; the
    /// result starts at time zero.
    pub fn subclip(&self, name: impl Into<String>, start_frame: u32, end_frame: u32, fps: f32) -> Result<Self> {
        if fps <= 0.0 {
            return Err(AnimationError::InvalidArgument(format!("fps must be positive, got {fps}")));
        }
        let name = name.into();

        let mut tracks: Vec<KeyframeTrack> = self
            .tracks
            .iter()
            .filter_map(|track| {
                let mut frames = track.times().iter().map(|t| t * fps);
                let first = frames.clone().position(|f| f >= start_frame as f32)?;
                let last = frames.rposition(|f| f < end_frame as f32)?;
                if last < first {
                    return None;
                }
                let (from, to) = (track.times()[first], track.times()[last]);
                let mut track = track.clone();
                track.trim(from, to);
                Some(track)
            })
            .collect();

        if tracks.is_empty() {
            return Err(AnimationError::EmptyClip { clip: name });
        }

        let min_start = tracks
            .iter()
            .map(KeyframeTrack::start_time)
            .fold(f32::INFINITY, f32::min);
        for track in &mut tracks {
            track.shift(-min_start);
        }

        Ok(Self::new(name, tracks)?.with_blend_mode(self.blend_mode))
    }

    /// Resamples every track at a uniform `fps` over the clip's duration.
    pub fn resample(&self, fps: f32) -> Result<Self> {
        if fps <= 0.0 {
            return Err(AnimationError::InvalidArgument(format!("fps must be positive, got {fps}")));
        }

        let frame_count = (self.duration * fps).ceil() as usize;
        let mut times: Vec<f32> = (0..frame_count).map(|i| i as f32 / fps).collect();
        if times.last().is_none_or(|&t| t < self.duration) {
            times.push(self.duration);
        }

        let tracks = self
            .tracks
            .iter()
            .map(|track| track.resampled(&times))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::with_duration(self.name.clone(), Some(self.duration), tracks)?.with_blend_mode(self.blend_mode))
    }

    /// Converts this clip into deltas against its own pose at
    /// `reference_time`, to be played with [`BlendMode::Additive`].
    #[must_use]
    pub fn to_additive(&self, reference_time: f32) -> Self {
        self.to_additive_against(self, reference_time)
    }

    /// Converts this clip into deltas against `reference`'s pose at
    /// `reference_time`.
    ///
    /// Numeric tracks subtract the reference value; quaternion tracks are
    /// pre-multiplied by the inverse reference rotation. Bool and string
    /// tracks, and tracks the reference clip lacks, are left unchanged.
    #[must_use]
    pub fn to_additive_against(&self, reference: &AnimationClip, reference_time: f32) -> Self {
        let mut clip = self.clone();
        clip.uuid = Uuid::new_v4();
        clip.blend_mode = BlendMode::Additive;

        for reference_track in &reference.tracks {
            let value_type = reference_track.value_type();
            if value_type.is_discrete() {
                continue;
            }

            let Some(target) = clip
                .tracks
                .iter_mut()
                .find(|t| t.name() == reference_track.name() && t.value_type() == value_type)
            else {
                continue;
            };
            if target.value_size() != reference_track.value_size() {
                log::warn!(
                    "Additive conversion: track '{}' value size differs from the reference, skipped",
                    target.name()
                );
                continue;
            }

            let reference_value = reference_track.sample(reference_time);

            for k in 0..target.key_count() {
                let Some(value) = target.key_value_mut(k) else {
                    break;
                };
                if value_type == ValueType::Quaternion {
                    for q in (0..value.len()).step_by(4) {
                        let mut inverse = Quat::IDENTITY;
                        inverse.from_array_slice(&reference_value[q..q + 4]);
                        let inverse = inverse.normalize().conjugate();

                        let mut current = Quat::IDENTITY;
                        current.from_array_slice(&value[q..q + 4]);
                        (inverse * current).to_array_into(&mut value[q..q + 4]);
                    }
                } else {
                    for (v, r) in value.iter_mut().zip(reference_value.iter()) {
                        *v -= r;
                    }
                }
            }
        }

        clip
    }
}
