use glam::Quat;
use smallvec::SmallVec;

use crate::animation::binding::PropertyBinding;
use crate::animation::values::{ValueType, quat_at, slerp, store_quat};
use crate::scene::Scene;

// Numeric buffer layout, in units of `value_size`:
// [ accu0 | accu1 | orig | add | work ]
const ORIG: usize = 2;
const ADD: usize = 3;
const WORK: usize = 4;
const REGIONS: usize = 5;

/// One sampled value handed to a mixer.
#[derive(Debug, Clone, Copy)]
pub enum Sample<'a> {
    Numeric(&'a [f32]),
    Text(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixKind {
    Lerp,
    Slerp,
    Select,
}

impl MixKind {
    fn for_type(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Quaternion => Self::Slerp,
            ValueType::Bool | ValueType::String => Self::Select,
            ValueType::Number | ValueType::Vector | ValueType::Color => Self::Lerp,
        }
    }
}

#[derive(Debug, Clone)]
enum Slots {
    Numeric(Vec<f32>),
    Text {
        accu: [String; 2],
        original: String,
        additive: String,
    },
}

/// Weighted blender in front of one bound property.
///
/// Every action writing the property contributes through
/// [`accumulate`](Self::accumulate) or
/// [`accumulate_additive`](Self::accumulate_additive); the mixer then calls
/// [`apply`](Self::apply) once per frame. Accumulation alternates between two
/// slots so `apply` can skip the write (and its versioning side effect) when
/// the blended value equals the previous frame's.
#[derive(Debug, Clone)]
pub struct PropertyMixer {
    pub(crate) binding: PropertyBinding,
    value_size: usize,
    mix: MixKind,
    slots: Slots,

    cumulative_weight: f32,
    cumulative_weight_additive: f32,

    /// Active actions writing through this mixer.
    pub(crate) use_count: u32,
    /// Cached actions (active or not) holding this mixer.
    pub(crate) reference_count: u32,
    /// Position in the mixer's binding order (active bindings first).
    pub(crate) cache_index: usize,
}

impl PropertyMixer {
    #[must_use]
    pub fn new(binding: PropertyBinding, value_type: ValueType, value_size: usize) -> Self {
        let slots = if value_type == ValueType::String {
            Slots::Text {
                accu: [String::new(), String::new()],
                original: String::new(),
                additive: String::new(),
            }
        } else {
            Slots::Numeric(vec![0.0; value_size * REGIONS])
        };

        Self {
            binding,
            value_size,
            mix: MixKind::for_type(value_type),
            slots,
            cumulative_weight: 0.0,
            cumulative_weight_additive: 0.0,
            use_count: 0,
            reference_count: 0,
            cache_index: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    #[inline]
    #[must_use]
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    #[inline]
    #[must_use]
    pub fn cumulative_weight(&self) -> f32 {
        self.cumulative_weight
    }

    #[inline]
    #[must_use]
    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    #[inline]
    #[must_use]
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    /// The accumulated numeric value in slot `accu_index` (empty for text).
    #[must_use]
    pub fn accumulated(&self, accu_index: usize) -> &[f32] {
        match &self.slots {
            Slots::Numeric(buffer) => region(buffer, accu_index & 1, self.value_size),
            Slots::Text { .. } => &[],
        }
    }

    /// Blends `sample` into slot `accu_index` with `weight`.
    ///
    /// Only the lowest bit of `accu_index` selects the slot. The first
    /// contribution of a frame is copied; every later one is mixed
    /// in with `weight / total_weight`, which makes the result independent of
    /// the call order. Non-finite samples are skipped.
    pub fn accumulate(&mut self, accu_index: usize, sample: Sample<'_>, weight: f32) {
        let n = self.value_size;
        match (&mut self.slots, sample) {
            (Slots::Numeric(buffer), Sample::Numeric(incoming)) => {
                if incoming.len() != n || incoming.iter().any(|v| !v.is_finite()) {
                    return;
                }
                let dst = region_mut(buffer, accu_index & 1, n);
                if self.cumulative_weight == 0.0 {
                    dst.copy_from_slice(incoming);
                    self.cumulative_weight = weight;
                } else {
                    self.cumulative_weight += weight;
                    mix_into(self.mix, dst, incoming, weight / self.cumulative_weight);
                }
            }
            (Slots::Text { accu, .. }, Sample::Text(incoming)) => {
                let dst = &mut accu[accu_index & 1];
                if self.cumulative_weight == 0.0 {
                    incoming.clone_into(dst);
                    self.cumulative_weight = weight;
                } else {
                    self.cumulative_weight += weight;
                    if weight / self.cumulative_weight >= 0.5 {
                        incoming.clone_into(dst);
                    }
                }
            }
            _ => {}
        }
    }

    /// Adds `sample * weight` to the additive slot (quaternions: rotates by
    /// `sample` scaled along the arc by `weight`).
    pub fn accumulate_additive(&mut self, sample: Sample<'_>, weight: f32) {
        let n = self.value_size;
        if self.cumulative_weight_additive == 0.0 {
            self.set_additive_identity();
        }

        match (&mut self.slots, sample) {
            (Slots::Numeric(buffer), Sample::Numeric(incoming)) => {
                if incoming.len() != n || incoming.iter().any(|v| !v.is_finite()) {
                    return;
                }
                let (head, work) = buffer.split_at_mut(WORK * n);
                let add = &mut head[ADD * n..];
                mix_additive(self.mix, add, incoming, weight, &mut work[..n]);
            }
            (Slots::Text { additive, .. }, Sample::Text(incoming)) => {
                if weight >= 0.5 {
                    incoming.clone_into(additive);
                }
            }
            _ => return,
        }
        self.cumulative_weight_additive += weight;
    }

    /// Finishes the frame: fills the missing weight with the original value,
    /// adds the additive slot, writes the result when it changed (always with
    /// `force`) and resets both weights.
    pub fn apply(&mut self, accu_index: usize, force: bool, scene: &mut Scene) {
        let n = self.value_size;
        let weight = self.cumulative_weight;
        let weight_additive = self.cumulative_weight_additive;
        self.cumulative_weight = 0.0;
        self.cumulative_weight_additive = 0.0;

        let current = accu_index & 1;
        let previous = current ^ 1;

        match &mut self.slots {
            Slots::Numeric(buffer) => {
                if weight < 1.0 {
                    let original: SmallVec<[f32; 4]> = SmallVec::from_slice(region(buffer, ORIG, n));
                    mix_into(self.mix, region_mut(buffer, current, n), &original, 1.0 - weight);
                }
                if weight_additive > 0.0 {
                    let additive: SmallVec<[f32; 4]> = SmallVec::from_slice(region(buffer, ADD, n));
                    let (head, work) = buffer.split_at_mut(WORK * n);
                    let dst = &mut head[current * n..(current + 1) * n];
                    mix_additive(self.mix, dst, &additive, 1.0, &mut work[..n]);
                }

                let value = region(buffer, current, n);
                if (force || value != region(buffer, previous, n)) && value.iter().all(|v| v.is_finite()) {
                    self.binding.set_value(scene, value);
                }
            }
            Slots::Text { accu, original, additive } => {
                if weight < 1.0 && 1.0 - weight >= 0.5 {
                    accu[current].clone_from(original);
                }
                if weight_additive >= 0.5 {
                    accu[current].clone_from(additive);
                }
                if force || accu[current] != accu[previous] {
                    self.binding.set_text(scene, &accu[current]);
                }
            }
        }
    }

    /// Captures the target's current value as the pre-animation state and
    /// seeds both accumulation slots with it.
    pub fn save_original_state(&mut self, scene: &Scene) {
        let n = self.value_size;
        match &mut self.slots {
            Slots::Numeric(buffer) => {
                let (accus, rest) = buffer.split_at_mut(ORIG * n);
                let original = &mut rest[..n];
                self.binding.get_value(scene, original);
                accus[..n].copy_from_slice(original);
                accus[n..].copy_from_slice(original);
            }
            Slots::Text { accu, original, .. } => {
                *original = self.binding.get_text(scene).unwrap_or_default();
                accu[0].clone_from(original);
                accu[1].clone_from(original);
            }
        }

        self.set_additive_identity();
        self.cumulative_weight = 0.0;
        self.cumulative_weight_additive = 0.0;
    }

    /// Writes the captured pre-animation state back to the target.
    pub fn restore_original_state(&mut self, scene: &mut Scene) {
        if !self.binding.is_resolved() {
            return;
        }
        match &self.slots {
            Slots::Numeric(buffer) => self.binding.set_value(scene, region(buffer, ORIG, self.value_size)),
            Slots::Text { original, .. } => self.binding.set_text(scene, original),
        }
    }

    fn set_additive_identity(&mut self) {
        let n = self.value_size;
        match &mut self.slots {
            Slots::Numeric(buffer) => match self.mix {
                MixKind::Lerp => region_mut(buffer, ADD, n).fill(0.0),
                MixKind::Slerp => {
                    let add = region_mut(buffer, ADD, n);
                    for q in (0..n).step_by(4) {
                        store_quat(add, q, Quat::IDENTITY);
                    }
                }
                MixKind::Select => buffer.copy_within(ORIG * n..(ORIG + 1) * n, ADD * n),
            },
            Slots::Text { original, additive, .. } => additive.clone_from(original),
        }
    }
}

#[inline]
fn region(buffer: &[f32], index: usize, n: usize) -> &[f32] {
    &buffer[index * n..(index + 1) * n]
}

#[inline]
fn region_mut(buffer: &mut [f32], index: usize, n: usize) -> &mut [f32] {
    &mut buffer[index * n..(index + 1) * n]
}

/// `dst = mix(dst, src, t)`.
fn mix_into(kind: MixKind, dst: &mut [f32], src: &[f32], t: f32) {
    if t >= 1.0 {
        dst.copy_from_slice(src);
        return;
    }
    match kind {
        MixKind::Select => {
            if t >= 0.5 {
                dst.copy_from_slice(src);
            }
        }
        MixKind::Lerp => {
            let s = 1.0 - t;
            for (d, &v) in dst.iter_mut().zip(src) {
                *d = *d * s + v * t;
            }
        }
        MixKind::Slerp => {
            for q in (0..dst.len()).step_by(4) {
                let blended = slerp(quat_at(dst, q), quat_at(src, q), t);
                store_quat(dst, q, blended);
            }
        }
    }
}

/// `dst = dst + src * t` in the additive sense of the value type.
fn mix_additive(kind: MixKind, dst: &mut [f32], src: &[f32], t: f32, work: &mut [f32]) {
    match kind {
        MixKind::Select => {
            if t >= 0.5 {
                dst.copy_from_slice(src);
            }
        }
        MixKind::Lerp => {
            for (d, &v) in dst.iter_mut().zip(src) {
                *d += v * t;
            }
        }
        MixKind::Slerp => {
            for q in (0..dst.len()).step_by(4) {
                let base = quat_at(dst, q);
                store_quat(work, q, base * quat_at(src, q));
                let rotated = slerp(base, quat_at(work, q), t);
                store_quat(dst, q, rotated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_mixer() -> PropertyMixer {
        PropertyMixer::new(PropertyBinding::unresolved("x.value"), ValueType::Number, 1)
    }

    #[test]
    fn test_first_contribution_is_copied() {
        let mut mixer = scalar_mixer();
        mixer.accumulate(0, Sample::Numeric(&[3.0]), 0.25);
        assert_eq!(mixer.accumulated(0), &[3.0]);
        assert_eq!(mixer.cumulative_weight(), 0.25);
    }

    #[test]
    fn test_weighted_average() {
        let mut mixer = scalar_mixer();
        mixer.accumulate(1, Sample::Numeric(&[0.5]), 1.0);
        mixer.accumulate(1, Sample::Numeric(&[1.0]), 1.0);
        assert!((mixer.accumulated(1)[0] - 0.75).abs() < 1e-6);
        assert_eq!(mixer.cumulative_weight(), 2.0);
    }

    #[test]
    fn test_non_finite_sample_is_skipped() {
        let mut mixer = scalar_mixer();
        mixer.accumulate(0, Sample::Numeric(&[2.0]), 1.0);
        mixer.accumulate(0, Sample::Numeric(&[f32::NAN]), 1.0);
        assert_eq!(mixer.accumulated(0), &[2.0]);
        assert_eq!(mixer.cumulative_weight(), 1.0);
    }

    #[test]
    fn test_accu_index_wraps_to_two_slots() {
        let mut mixer = scalar_mixer();
        mixer.accumulate(2, Sample::Numeric(&[7.0]), 1.0);
        assert_eq!(mixer.accumulated(0), &[7.0]);
        assert_eq!(mixer.accumulated(3), mixer.accumulated(1));

        let Slots::Numeric(buffer) = &mixer.slots else {
            panic!("numeric mixer expected");
        };
        assert_eq!(region(buffer, ORIG, 1), &[0.0]);
    }

    #[test]
    fn test_select_prefers_heavier_contribution() {
        let mut mixer = PropertyMixer::new(PropertyBinding::unresolved("x.visible"), ValueType::Bool, 1);
        mixer.accumulate(0, Sample::Numeric(&[1.0]), 0.2);
        mixer.accumulate(0, Sample::Numeric(&[0.0]), 0.6);
        assert_eq!(mixer.accumulated(0), &[0.0]);
    }

    #[test]
    fn test_quaternion_blend_stays_normalized() {
        let mut mixer = PropertyMixer::new(PropertyBinding::unresolved("x.quaternion"), ValueType::Quaternion, 4);
        let a = Quat::IDENTITY.to_array();
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2).to_array();
        mixer.accumulate(0, Sample::Numeric(&a), 1.0);
        mixer.accumulate(0, Sample::Numeric(&b), 1.0);

        let q = quat_at(mixer.accumulated(0), 0);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!((q.length() - 1.0).abs() < 1e-5);
        assert!(q.dot(expected).abs() > 0.9999);
    }

    #[test]
    fn test_additive_quaternion_composes() {
        let mut mixer = PropertyMixer::new(PropertyBinding::unresolved("x.quaternion"), ValueType::Quaternion, 4);
        let delta = Quat::from_rotation_z(0.5).to_array();
        mixer.accumulate_additive(Sample::Numeric(&delta), 1.0);
        mixer.accumulate_additive(Sample::Numeric(&delta), 1.0);

        let Slots::Numeric(buffer) = &mixer.slots else {
            panic!("numeric mixer expected");
        };
        let q = quat_at(region(buffer, ADD, 4), 0);
        assert!(q.dot(Quat::from_rotation_z(1.0)).abs() > 0.9999);
    }
}
