/// A linear ramp from `from` to `to` over `duration` seconds of mixer time.
///
/// Drives weight fades and time-scale warps. The ramp measures elapsed time
/// itself, so an action can schedule one before it is played.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    elapsed: f32,
    duration: f32,
    from: f32,
    to: f32,
}

impl Ramp {
    #[must_use]
    pub fn new(duration: f32, from: f32, to: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration: duration.max(0.0),
            from,
            to,
        }
    }

    /// Moves the ramp by `delta` seconds (negative when the mixer runs backwards).
    pub fn advance(&mut self, delta: f32) {
        self.elapsed = (self.elapsed + delta).max(0.0);
    }

    /// Current value, clamped to the ramp's end points.
    #[must_use]
    pub fn value(&self) -> f32 {
        if self.elapsed >= self.duration {
            return self.to;
        }
        let p = self.elapsed / self.duration;
        self.from + (self.to - self.from) * p
    }

    /// `true` once the ramp has run past its end.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.elapsed > self.duration || self.duration == 0.0
    }
}
