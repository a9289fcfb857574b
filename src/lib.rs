#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod errors;
pub mod resources;
pub mod scene;
pub mod utils;

pub use animation::{
    ActionHandle, ActionState, AnimationAction, AnimationClip, AnimationMixer, Binder, BlendMode, InterpolationMode,
    KeyframeTrack, LoopMode, MixerEvent, ValueType,
};
pub use errors::{AnimationError, Result};
pub use resources::{ChangeTracker, Material};
pub use scene::{Node, NodeHandle, Property, Scene, Transform};
pub use utils::interner;
