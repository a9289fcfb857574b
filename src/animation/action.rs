use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::animation::clip::{AnimationClip, BlendMode};
use crate::animation::events::MixerEvent;
use crate::animation::interpolant::{Ending, Endings, Interpolant};
use crate::animation::property_mixer::{PropertyMixer, Sample};
use crate::animation::ramp::Ramp;
use crate::animation::tracks::TrackValues;
use crate::scene::NodeHandle;

new_key_type! {
    pub struct ActionHandle;
    pub struct BindingKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Play once and finish.
    Once,
    /// Wrap around at the end.
    #[default]
    Repeat,
    /// Alternate forward and backward rounds.
    PingPong,
}

/// Observable playback state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Not played (or stopped).
    Inactive,
    /// Played, waiting for its start time.
    Scheduled,
    Running,
    /// Played but not advancing (paused, disabled or zero time scale).
    Paused,
    /// Reached the end of its last repetition.
    Finished,
}

/// One clip being played on one root.
///
/// Created by [`AnimationMixer::clip_action`](crate::animation::AnimationMixer::clip_action)
/// and addressed through its [`ActionHandle`]. Playback parameters are plain
/// public fields; scheduling helpers (fades, warps, delayed start) are
/// methods.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    pub(crate) handle: ActionHandle,
    clip: Arc<AnimationClip>,
    root: NodeHandle,
    blend_mode: BlendMode,

    /// Local playback time in seconds.
    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub loop_mode: LoopMode,
    /// Number of rounds for `Repeat` / `PingPong`. `None` repeats forever.
    pub repetitions: Option<u32>,
    pub paused: bool,
    pub enabled: bool,
    /// Hold the last frame after finishing instead of disabling the action.
    pub clamp_when_finished: bool,
    pub zero_slope_at_start: bool,
    pub zero_slope_at_end: bool,

    effective_weight: f32,
    effective_time_scale: f32,
    start_time: Option<f32>,
    loop_count: i64,
    finished: bool,
    fade: Option<Ramp>,
    warp: Option<Ramp>,
    endings: Endings,

    pub(crate) interpolants: Vec<Interpolant>,
    /// One binding per clip track, in track order.
    pub(crate) bindings: Vec<BindingKey>,
    pub(crate) active: bool,
    /// Position in the mixer's action order (active actions first).
    pub(crate) cache_index: usize,
}

impl AnimationAction {
    pub(crate) fn new(handle: ActionHandle, clip: Arc<AnimationClip>, root: NodeHandle, blend_mode: BlendMode) -> Self {
        let interpolants = clip.tracks().iter().map(Interpolant::new).collect();
        Self {
            handle,
            clip,
            root,
            blend_mode,

            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::Repeat,
            repetitions: None,
            paused: false,
            enabled: true,
            clamp_when_finished: false,
            zero_slope_at_start: true,
            zero_slope_at_end: true,

            effective_weight: 1.0,
            effective_time_scale: 1.0,
            start_time: None,
            loop_count: -1,
            finished: false,
            fade: None,
            warp: None,
            endings: Endings::default(),

            interpolants,
            bindings: Vec::new(),
            active: false,
            cache_index: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn handle(&self) -> ActionHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Weight after fading, as used in the last update.
    #[inline]
    #[must_use]
    pub fn effective_weight(&self) -> f32 {
        self.effective_weight
    }

    /// Time scale after warping, as used in the last update.
    #[inline]
    #[must_use]
    pub fn effective_time_scale(&self) -> f32 {
        self.effective_time_scale
    }

    /// Completed rounds of a repeating action (`-1` before the first update).
    #[inline]
    #[must_use]
    pub fn loop_count(&self) -> i64 {
        self.loop_count
    }

    /// Whether the action is in the mixer's active set.
    #[inline]
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.active
    }

    /// Whether the action is active and advancing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.enabled && !self.paused && self.time_scale != 0.0 && self.start_time.is_none() && self.active
    }

    #[must_use]
    pub fn state(&self) -> ActionState {
        if self.finished {
            ActionState::Finished
        } else if !self.active {
            ActionState::Inactive
        } else if self.start_time.is_some() {
            ActionState::Scheduled
        } else if self.is_running() {
            ActionState::Running
        } else {
            ActionState::Paused
        }
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Rewinds to the start and clears fades, warps and the finished state.
    pub fn reset(&mut self) -> &mut Self {
        self.paused = false;
        self.enabled = true;
        self.time = 0.0;
        self.loop_count = -1;
        self.start_time = None;
        self.finished = false;
        self.stop_fading().stop_warping()
    }

    /// Delays the start until the mixer clock reaches `mixer_time`.
    pub fn start_at(&mut self, mixer_time: f32) -> &mut Self {
        self.start_time = Some(mixer_time);
        self
    }

    pub fn set_loop(&mut self, mode: LoopMode, repetitions: Option<u32>) -> &mut Self {
        self.loop_mode = mode;
        self.repetitions = repetitions;
        self
    }

    /// Sets the weight and cancels any fade.
    pub fn set_effective_weight(&mut self, weight: f32) -> &mut Self {
        self.weight = weight;
        self.effective_weight = if self.enabled { weight } else { 0.0 };
        self.stop_fading()
    }

    /// Sets the time scale and cancels any warp.
    pub fn set_effective_time_scale(&mut self, time_scale: f32) -> &mut Self {
        self.time_scale = time_scale;
        self.effective_time_scale = if self.paused { 0.0 } else { time_scale };
        self.stop_warping()
    }

    /// Scales time so that one round lasts `duration` seconds.
    pub fn set_duration(&mut self, duration: f32) -> &mut Self {
        if duration > 0.0 {
            self.time_scale = self.clip.duration() / duration;
        }
        self.stop_warping()
    }

    /// Copies time and time scale from `other`.
    pub fn sync_with(&mut self, other: &AnimationAction) -> &mut Self {
        self.time = other.time;
        self.time_scale = other.time_scale;
        self.stop_warping()
    }

    // ========================================================================
    // Fading & warping
    // ========================================================================

    /// Ramps the weight factor from 0 to 1 over `duration` seconds.
    pub fn fade_in(&mut self, duration: f32) -> &mut Self {
        self.schedule_fading(duration, 0.0, 1.0)
    }

    /// Ramps the weight factor from 1 to 0; the action disables itself at the end.
    pub fn fade_out(&mut self, duration: f32) -> &mut Self {
        self.schedule_fading(duration, 1.0, 0.0)
    }

    /// Fades `other` out while fading `self` in. With `warp`, the time scales
    /// also ramp so both clips run at matching speed during the transition.
    pub fn cross_fade_from(&mut self, other: &mut AnimationAction, duration: f32, warp: bool) -> &mut Self {
        other.fade_out(duration);
        self.fade_in(duration);

        if warp {
            let fade_in_duration = self.clip.duration();
            let fade_out_duration = other.clip.duration();
            if fade_in_duration > 0.0 && fade_out_duration > 0.0 {
                let start_end_ratio = fade_out_duration / fade_in_duration;
                let end_start_ratio = fade_in_duration / fade_out_duration;
                other.warp(1.0, start_end_ratio, duration);
                self.warp(end_start_ratio, 1.0, duration);
            }
        }
        self
    }

    /// Fades `self` out while fading `other` in.
    pub fn cross_fade_to(&mut self, other: &mut AnimationAction, duration: f32, warp: bool) -> &mut Self {
        other.cross_fade_from(self, duration, warp);
        self
    }

    pub fn stop_fading(&mut self) -> &mut Self {
        self.fade = None;
        self
    }

    /// Ramps the effective time scale from `start` to `end` over `duration`.
    pub fn warp(&mut self, start: f32, end: f32, duration: f32) -> &mut Self {
        // the ramp scales `time_scale`, so store factors relative to it
        let time_scale = self.time_scale;
        let (from, to) = if time_scale == 0.0 { (0.0, 0.0) } else { (start / time_scale, end / time_scale) };
        self.warp = Some(Ramp::new(duration, from, to));
        self
    }

    /// Decelerates to a stop over `duration`, then pauses.
    pub fn halt(&mut self, duration: f32) -> &mut Self {
        let current = self.effective_time_scale;
        self.warp(current, 0.0, duration)
    }

    pub fn stop_warping(&mut self) -> &mut Self {
        self.warp = None;
        self
    }

    fn schedule_fading(&mut self, duration: f32, from: f32, to: f32) -> &mut Self {
        self.fade = Some(Ramp::new(duration, from, to));
        self
    }

    // ========================================================================
    // Per-frame update (driven by the mixer)
    // ========================================================================

    /// Advances the action and accumulates its pose.
    ///
    /// `time` is the mixer clock after advancing, `delta` the scaled mixer
    /// step. Bindings are looked up in `property_mixers`; events are queued in
    /// `events`.
    pub(crate) fn update(
        &mut self,
        time: f32,
        delta: f32,
        accu_index: usize,
        property_mixers: &mut SlotMap<BindingKey, PropertyMixer>,
        events: &mut Vec<MixerEvent>,
    ) {
        if !self.enabled {
            self.update_weight(delta);
            return;
        }

        let mut delta_time = delta;
        if let Some(start_time) = self.start_time {
            let direction = delta.signum();
            let time_running = (time - start_time) * direction;
            if time_running < 0.0 || delta == 0.0 {
                delta_time = 0.0;
            } else {
                self.start_time = None;
                delta_time = direction * time_running;
            }
        }

        delta_time *= self.update_time_scale(delta);
        let clip_time = self.update_time(delta_time, events);
        let weight = self.update_weight(delta);

        if weight > 0.0 {
            self.evaluate(clip_time, weight, accu_index, property_mixers);
        }
    }

    fn evaluate(
        &mut self,
        clip_time: f32,
        weight: f32,
        accu_index: usize,
        property_mixers: &mut SlotMap<BindingKey, PropertyMixer>,
    ) {
        let tracks = self.clip.tracks();
        for ((interpolant, track), &key) in self.interpolants.iter_mut().zip(tracks).zip(&self.bindings) {
            let Some(mixer) = property_mixers.get_mut(key) else {
                continue;
            };

            let sample = match track.values() {
                TrackValues::Text(values) => Sample::Text(&values[interpolant.key_index(track, clip_time)]),
                TrackValues::Numeric(_) => Sample::Numeric(interpolant.evaluate(track, clip_time)),
            };

            match self.blend_mode {
                BlendMode::Normal => mixer.accumulate(accu_index, sample, weight),
                BlendMode::Additive => mixer.accumulate_additive(sample, weight),
            }
        }
    }

    fn update_weight(&mut self, delta: f32) -> f32 {
        let mut weight = 0.0;

        if self.enabled {
            weight = self.weight;
            if let Some(fade) = self.fade.as_mut() {
                fade.advance(delta);
                let factor = fade.value();
                weight *= factor;

                if fade.is_finished() {
                    self.stop_fading();
                    if factor == 0.0 {
                        self.enabled = false;
                    }
                }
            }
        }

        self.effective_weight = weight;
        weight
    }

    fn update_time_scale(&mut self, delta: f32) -> f32 {
        let mut time_scale = 0.0;

        if !self.paused {
            time_scale = self.time_scale;
            if let Some(warp) = self.warp.as_mut() {
                warp.advance(delta);
                time_scale *= warp.value();

                if warp.is_finished() {
                    self.stop_warping();
                    if time_scale == 0.0 {
                        self.paused = true;
                    } else {
                        self.time_scale = time_scale;
                    }
                }
            }
        }

        self.effective_time_scale = time_scale;
        time_scale
    }

    /// Advances local time by `delta_time` under the loop policy and returns
    /// the time to sample the clip at.
    fn update_time(&mut self, delta_time: f32, events: &mut Vec<MixerEvent>) -> f32 {
        let duration = self.clip.duration();
        if duration <= 0.0 {
            // already at the end: hold the first frame, finish on the first step
            self.time = 0.0;
            let finite = self.loop_mode == LoopMode::Once || self.repetitions.is_some();
            if delta_time != 0.0 && finite && !self.finished {
                self.finish(delta_time, events);
            }
            return 0.0;
        }

        let ping_pong = self.loop_mode == LoopMode::PingPong;
        let mut time = self.time + delta_time;
        let mut loop_count = self.loop_count;

        if delta_time == 0.0 {
            if loop_count == -1 {
                return time;
            }
            return self.clip_time(time, duration);
        }

        if self.loop_mode == LoopMode::Once {
            if loop_count == -1 {
                self.loop_count = 0;
                self.set_endings(true, true, false);
            }

            if time >= duration {
                time = duration;
            } else if time < 0.0 {
                time = 0.0;
            } else {
                self.time = time;
                return time;
            }

            self.time = time;
            self.finish(delta_time, events);
            return time;
        }

        // Repeat / PingPong
        let repetitions = self.repetitions.map_or(i64::MAX, i64::from);

        if loop_count == -1 {
            if delta_time >= 0.0 {
                loop_count = 0;
                self.set_endings(true, repetitions == 0, ping_pong);
            } else {
                // backwards from the end of the first round
                self.set_endings(repetitions == 0, true, ping_pong);
            }
            self.loop_count = loop_count;
        }

        if time >= duration || time < 0.0 {
            let loop_delta = (time / duration).floor();
            time -= duration * loop_delta;
            loop_count += loop_delta.abs() as i64;

            let pending = repetitions.saturating_sub(loop_count);
            if pending <= 0 {
                time = if delta_time > 0.0 { duration } else { 0.0 };
                self.time = time;
                self.loop_count = loop_count;
                self.finish(delta_time, events);
            } else {
                if pending == 1 {
                    let at_start = delta_time < 0.0;
                    self.set_endings(at_start, !at_start, ping_pong);
                } else {
                    self.set_endings(false, false, ping_pong);
                }

                self.loop_count = loop_count;
                self.time = time;
                events.push(MixerEvent::Loop {
                    action: self.handle,
                    loop_delta: loop_delta as i32,
                });
            }
        } else {
            self.time = time;
        }

        self.clip_time(time, duration)
    }

    /// Maps local time to the time the clip is sampled at. Odd ping-pong
    /// rounds play backwards.
    fn clip_time(&self, time: f32, duration: f32) -> f32 {
        // the wrap that finishes the action is counted but never played
        let round = if self.finished { self.loop_count - 1 } else { self.loop_count };
        if self.loop_mode == LoopMode::PingPong && round & 1 == 1 {
            duration - time
        } else {
            time
        }
    }

    fn finish(&mut self, delta_time: f32, events: &mut Vec<MixerEvent>) {
        if self.clamp_when_finished {
            self.paused = true;
        } else {
            self.enabled = false;
        }
        self.finished = true;
        events.push(MixerEvent::Finished {
            action: self.handle,
            direction: if delta_time < 0.0 { -1 } else { 1 },
        });
    }

    fn set_endings(&mut self, at_start: bool, at_end: bool, ping_pong: bool) {
        let endings = if ping_pong {
            Endings {
                start: Ending::ZeroSlope,
                end: Ending::ZeroSlope,
            }
        } else {
            let boundary = |zero_slope: bool| if zero_slope { Ending::ZeroSlope } else { Ending::ZeroCurvature };
            Endings {
                start: if at_start { boundary(self.zero_slope_at_start) } else { Ending::WrapAround },
                end: if at_end { boundary(self.zero_slope_at_end) } else { Ending::WrapAround },
            }
        };

        if endings != self.endings {
            self.endings = endings;
            for interpolant in &mut self.interpolants {
                interpolant.endings = endings;
            }
        }
    }
}
