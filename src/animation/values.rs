use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Value type tag of a keyframe track.
///
/// The tag decides the default interpolation, how concurrent writers are
/// blended (lerp, slerp or select) and the additive identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Number,
    Vector,
    Quaternion,
    Color,
    String,
}

impl ValueType {
    /// Parses the tag used by the clip interchange format.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "bool" => Self::Bool,
            "number" => Self::Number,
            "vector" => Self::Vector,
            "quaternion" => Self::Quaternion,
            "color" => Self::Color,
            "string" => Self::String,
            _ => return None,
        })
    }

    /// Value size fixed by the type, if any (vectors and numbers arrays vary).
    #[must_use]
    pub fn fixed_value_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::String => Some(1),
            Self::Quaternion => Some(4),
            Self::Color => Some(3),
            Self::Number | Self::Vector => None,
        }
    }

    /// Discrete-only types are blended by selection rather than averaging.
    #[inline]
    #[must_use]
    pub fn is_discrete(self) -> bool {
        matches!(self, Self::Bool | Self::String)
    }
}

/// A value type that can be packed to and unpacked from flat `f32` storage.
///
/// Bindings to such targets delegate to these methods instead of touching
/// the internals of the type.
pub trait ArrayValue {
    const SIZE: usize;

    fn to_array_into(&self, out: &mut [f32]);

    fn from_array_slice(&mut self, src: &[f32]);
}

impl ArrayValue for f32 {
    const SIZE: usize = 1;

    fn to_array_into(&self, out: &mut [f32]) {
        out[0] = *self;
    }

    fn from_array_slice(&mut self, src: &[f32]) {
        *self = src[0];
    }
}

impl ArrayValue for Vec2 {
    const SIZE: usize = 2;

    fn to_array_into(&self, out: &mut [f32]) {
        out[..2].copy_from_slice(&self.to_array());
    }

    fn from_array_slice(&mut self, src: &[f32]) {
        *self = Vec2::new(src[0], src[1]);
    }
}

impl ArrayValue for Vec3 {
    const SIZE: usize = 3;

    fn to_array_into(&self, out: &mut [f32]) {
        out[..3].copy_from_slice(&self.to_array());
    }

    fn from_array_slice(&mut self, src: &[f32]) {
        *self = Vec3::new(src[0], src[1], src[2]);
    }
}

impl ArrayValue for Vec4 {
    const SIZE: usize = 4;

    fn to_array_into(&self, out: &mut [f32]) {
        out[..4].copy_from_slice(&self.to_array());
    }

    fn from_array_slice(&mut self, src: &[f32]) {
        *self = Vec4::new(src[0], src[1], src[2], src[3]);
    }
}

impl ArrayValue for Quat {
    const SIZE: usize = 4;

    fn to_array_into(&self, out: &mut [f32]) {
        out[..4].copy_from_slice(&self.to_array());
    }

    fn from_array_slice(&mut self, src: &[f32]) {
        *self = Quat::from_xyzw(src[0], src[1], src[2], src[3]);
    }
}

// ============================================================================
// Flat buffer helpers
// ============================================================================

#[inline]
pub(crate) fn quat_at(buffer: &[f32], offset: usize) -> Quat {
    Quat::from_xyzw(
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    )
}

#[inline]
pub(crate) fn store_quat(buffer: &mut [f32], offset: usize, q: Quat) {
    buffer[offset..offset + 4].copy_from_slice(&q.to_array());
}

/// Shortest-arc spherical interpolation between packed quaternions.
///
/// Falls back to a normalized lerp when the inputs are nearly parallel, and
/// tolerates non-normalized inputs (the original pose of a target may not be
/// exactly unit length).
#[must_use]
pub(crate) fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }

    let mut dot = a.dot(b);
    let b = if dot < 0.0 {
        dot = -dot;
        -b
    } else {
        b
    };

    if dot > 0.9995 {
        return a.lerp(b, t).normalize();
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;
    Quat::from_vec4(Vec4::from(a) * wa + Vec4::from(b) * wb)
}

#[inline]
#[must_use]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Hermite basis evaluation shared by the glTF cubic-spline interpolant.
#[inline]
#[must_use]
pub(crate) fn cubic_spline(v0: f32, out_tangent0: f32, in_tangent1: f32, v1: f32, t: f32, dt: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;

    let m0 = out_tangent0 * dt;
    let m1 = in_tangent1 * dt;

    s0 * v0 + s1 * m0 + s2 * v1 + s3 * m1
}
