use glam::{Quat, Vec2, Vec3, Vec4};

use crate::animation::values::{ArrayValue, ValueType};

/// A dynamically typed animatable property.
///
/// Custom node properties and material parameters are stored as `Property`
/// values. The variant decides how an animation binding accesses it:
///
/// | Variant                         | Binding shape                         |
/// |---------------------------------|---------------------------------------|
/// | `Scalar`, `Bool`, `Text`        | direct scalar                         |
/// | `Array` (no index in the path)  | fixed-size component array            |
/// | `Array` (`[i]` in the path)     | single indexed element                |
/// | `Vec2`/`Vec3`/`Vec4`/`Quat`/`Color` | delegated to `to_array`/`from_array` |
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Scalar(f32),
    Bool(bool),
    Text(String),
    Array(Vec<f32>),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    /// Linear RGB color.
    Color(Vec3),
}

impl Property {
    /// Number of packed `f32` components this property occupies.
    #[must_use]
    pub fn value_size(&self) -> usize {
        match self {
            Self::Scalar(_) | Self::Bool(_) | Self::Text(_) => 1,
            Self::Array(values) => values.len(),
            Self::Vec2(_) => Vec2::SIZE,
            Self::Vec3(_) | Self::Color(_) => Vec3::SIZE,
            Self::Vec4(_) => Vec4::SIZE,
            Self::Quat(_) => Quat::SIZE,
        }
    }

    /// Whether a track of `value_type` can drive this property.
    #[must_use]
    pub fn accepts(&self, value_type: ValueType) -> bool {
        match self {
            Self::Scalar(_) => value_type == ValueType::Number,
            Self::Bool(_) => value_type == ValueType::Bool,
            Self::Text(_) => value_type == ValueType::String,
            Self::Quat(_) => value_type == ValueType::Quaternion,
            Self::Color(_) => matches!(value_type, ValueType::Color | ValueType::Vector),
            Self::Array(_) | Self::Vec2(_) | Self::Vec3(_) | Self::Vec4(_) => {
                matches!(value_type, ValueType::Vector | ValueType::Number)
            }
        }
    }

    /// Packs the numeric content into `out`. Text properties write nothing.
    pub fn read_into(&self, out: &mut [f32]) {
        match self {
            Self::Scalar(v) => out[0] = *v,
            Self::Bool(v) => out[0] = if *v { 1.0 } else { 0.0 },
            Self::Text(_) => {}
            Self::Array(values) => out[..values.len()].copy_from_slice(values),
            Self::Vec2(v) => v.to_array_into(out),
            Self::Vec3(v) | Self::Color(v) => v.to_array_into(out),
            Self::Vec4(v) => v.to_array_into(out),
            Self::Quat(v) => v.to_array_into(out),
        }
    }

    /// Unpacks numeric content from `src`. Text properties are left untouched.
    pub fn write_from(&mut self, src: &[f32]) {
        match self {
            Self::Scalar(v) => *v = src[0],
            Self::Bool(v) => *v = src[0] >= 0.5,
            Self::Text(_) => {}
            Self::Array(values) => {
                let n = values.len();
                values.copy_from_slice(&src[..n]);
            }
            Self::Vec2(v) => v.from_array_slice(src),
            Self::Vec3(v) | Self::Color(v) => v.from_array_slice(src),
            Self::Vec4(v) => v.from_array_slice(src),
            Self::Quat(v) => v.from_array_slice(src),
        }
    }
}
