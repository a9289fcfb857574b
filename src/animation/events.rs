use crate::animation::action::ActionHandle;

/// Notifications emitted by [`AnimationMixer::update`](crate::animation::AnimationMixer::update).
///
/// Events are queued in emission order and handed to the host through
/// [`AnimationMixer::drain_events`](crate::animation::AnimationMixer::drain_events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerEvent {
    /// An action reached the end of its last repetition.
    /// `direction` is `1` when playing forward, `-1` when playing backward.
    Finished { action: ActionHandle, direction: i8 },
    /// A repeating action wrapped around. `loop_delta` counts whole wraps
    /// (negative when playing backward).
    Loop { action: ActionHandle, loop_delta: i32 },
}

impl MixerEvent {
    #[must_use]
    pub fn action(&self) -> ActionHandle {
        match *self {
            Self::Finished { action, .. } | Self::Loop { action, .. } => action,
        }
    }
}
