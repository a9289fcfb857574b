//! Clip interchange format
//!
//! JSON description of a clip, as produced by exporters and consumed by
//! loaders:
//!
//! ```json
//! {
//!   "name": "wave",
//!   "duration": 1.0,
//!   "tracks": [
//!     { "name": "Arm.quaternion", "valueType": "quaternion",
//!       "times": [0, 1], "values": [[0, 0, 0, 1], [0, 0.7071, 0, 0.7071]] },
//!     { "name": "Face.morphTargetInfluences[smile]", "valueType": "number",
//!       "times": [0, 0.5, 1], "values": [0, 1, 0], "interpolation": "smooth" }
//!   ]
//! }
//! ```
//!
//! `values` may be flat, nested per key, booleans (bool tracks) or strings
//! (string tracks). Serializing always writes flat values together with the
//! explicit duration and uuid, so a round trip reproduces the clip exactly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animation::clip::{AnimationClip, BlendMode};
use crate::animation::tracks::{InterpolationMode, KeyframeTrack, TrackValues};
use crate::animation::values::ValueType;
use crate::errors::{AnimationError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipDesc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub blend_mode: BlendMode,
    pub tracks: Vec<TrackDesc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDesc {
    pub name: String,
    pub times: Vec<f32>,
    pub values: ValuesDesc,
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValuesDesc {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
    Bools(Vec<bool>),
    Strings(Vec<String>),
}

impl TrackDesc {
    fn into_track(self) -> Result<KeyframeTrack> {
        let value_type =
            ValueType::from_tag(&self.value_type).ok_or(AnimationError::UnknownValueType(self.value_type))?;

        let interpolation = match self.interpolation.as_deref() {
            Some(tag) => {
                InterpolationMode::from_tag(tag).ok_or_else(|| AnimationError::UnknownInterpolation(tag.to_string()))?
            }
            None if value_type.is_discrete() => InterpolationMode::Discrete,
            None => InterpolationMode::Linear,
        };

        match (value_type, self.values) {
            (ValueType::String, ValuesDesc::Strings(values)) => KeyframeTrack::string(self.name, self.times, values),
            (ValueType::String, _) => Err(AnimationError::InvalidArgument(format!(
                "track '{}': string tracks need string values",
                self.name
            ))),
            (ValueType::Bool, ValuesDesc::Bools(values)) => KeyframeTrack::boolean(self.name, self.times, &values),
            (_, ValuesDesc::Bools(_) | ValuesDesc::Strings(_)) => Err(AnimationError::InvalidArgument(format!(
                "track '{}': {value_type:?} tracks need numeric values",
                self.name
            ))),
            (_, ValuesDesc::Flat(values)) => {
                KeyframeTrack::new(self.name, value_type, self.times, values, interpolation)
            }
            (_, ValuesDesc::Nested(values)) => {
                let flat = values.into_iter().flatten().collect();
                KeyframeTrack::new(self.name, value_type, self.times, flat, interpolation)
            }
        }
    }

    fn from_track(track: &KeyframeTrack) -> Self {
        let values = match track.values() {
            TrackValues::Text(values) => ValuesDesc::Strings(values.clone()),
            TrackValues::Numeric(values) if track.value_type() == ValueType::Bool => {
                ValuesDesc::Bools(values.iter().map(|&v| v >= 0.5).collect())
            }
            TrackValues::Numeric(values) => ValuesDesc::Flat(values.clone()),
        };

        let interpolation = match track.interpolation() {
            InterpolationMode::Discrete => "discrete",
            InterpolationMode::Linear => "linear",
            InterpolationMode::Smooth => "smooth",
            InterpolationMode::CubicSpline => "cubicspline",
        };

        let value_type = match track.value_type() {
            ValueType::Bool => "bool",
            ValueType::Number => "number",
            ValueType::Vector => "vector",
            ValueType::Quaternion => "quaternion",
            ValueType::Color => "color",
            ValueType::String => "string",
        };

        Self {
            name: track.name().to_string(),
            times: track.times().to_vec(),
            values,
            value_type: value_type.to_string(),
            interpolation: Some(interpolation.to_string()),
        }
    }
}

impl ClipDesc {
    /// Builds and validates the clip described by `self`.
    pub fn into_clip(self) -> Result<AnimationClip> {
        let tracks = self
            .tracks
            .into_iter()
            .map(TrackDesc::into_track)
            .collect::<Result<Vec<_>>>()?;

        let mut clip = AnimationClip::with_duration(self.name, self.duration, tracks)?.with_blend_mode(self.blend_mode);
        if let Some(uuid) = self.uuid {
            clip = clip.with_uuid(uuid);
        }
        Ok(clip)
    }

    #[must_use]
    pub fn from_clip(clip: &AnimationClip) -> Self {
        Self {
            name: clip.name().to_string(),
            duration: Some(clip.duration()),
            uuid: Some(clip.uuid()),
            blend_mode: clip.blend_mode(),
            tracks: clip.tracks().iter().map(TrackDesc::from_track).collect(),
        }
    }
}

impl AnimationClip {
    /// Parses a clip from its JSON description.
    pub fn from_json(json: &str) -> Result<Self> {
        let desc: ClipDesc = serde_json::from_str(json)?;
        desc.into_clip()
    }

    /// Serializes the clip to its JSON description.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&ClipDesc::from_clip(self))?)
    }
}
