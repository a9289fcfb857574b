//! Animation System
//!
//! Keyframe clips, evaluated per action and blended per property:
//!
//! - [`KeyframeTrack`]: one `(time, value)` series plus its interpolation
//! - [`AnimationClip`]: a named, timed set of tracks shared behind an `Arc`
//! - [`AnimationAction`]: one clip playing on one root (time, loop, weight, fades)
//! - [`PropertyMixer`]: weighted blending in front of one bound property
//! - [`AnimationMixer`]: owns actions and bindings, drives them every frame
//!
//! # Frame flow
//!
//! ```text
//! AnimationMixer::update(dt)
//!   ├─ every active action: advance time → evaluate interpolants → accumulate
//!   └─ every active property mixer: apply (exactly once)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let clip = Arc::new(AnimationClip::from_json(json)?);
//! let mut mixer = AnimationMixer::new(root);
//! let walk = mixer.clip_action(&scene, &clip, None, None)?;
//! mixer.play(walk, &scene);
//!
//! // every frame
//! mixer.update(dt, &mut scene);
//! for event in mixer.drain_events() { /* ... */ }
//! ```

mod format;
pub mod values;

pub mod action;
pub mod binder;
pub mod binding;
pub mod clip;
pub mod events;
pub mod interpolant;
pub mod mixer;
pub mod property_mixer;
pub mod ramp;
pub mod tracks;

pub use action::{ActionHandle, ActionState, AnimationAction, BindingKey, LoopMode};
pub use binder::Binder;
pub use binding::{Accessor, Field, PathIndex, PropertyBinding, TrackPath, Versioning};
pub use clip::{AnimationClip, BlendMode};
pub use events::MixerEvent;
pub use format::{ClipDesc, TrackDesc, ValuesDesc};
pub use interpolant::{Ending, Endings, Interpolant, KeyframeCursor, Segment};
pub use mixer::{AnimationMixer, MixerStats, PoolStats};
pub use property_mixer::{PropertyMixer, Sample};
pub use ramp::Ramp;
pub use tracks::{InterpolationMode, KeyframeTrack, TrackValues};
pub use values::{ArrayValue, ValueType};
