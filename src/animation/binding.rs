use std::fmt;

use crate::animation::values::ArrayValue;
use crate::errors::{AnimationError, Result};
use crate::scene::node::Node;
use crate::scene::property::Property;
use crate::scene::{NodeHandle, Scene};
use crate::utils::interner::Symbol;

/// Element selector inside an array property: `[3]` or `[smile]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathIndex {
    Number(usize),
    Name(String),
}

/// A parsed track name.
///
/// ```text
/// path      := [ selector '.' [ object '.' ] ] property [ '[' index ']' ]
/// selector  := hop ( '/' hop )*
/// ```
///
/// `Body/Arm.quaternion`, `Face.morphTargetInfluences[smile]`,
/// `Cube.material.opacity`, `.position` (the root itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPath {
    /// Node hops below the root. Empty addresses the root.
    pub hops: Vec<String>,
    pub object: Option<String>,
    pub property: String,
    pub index: Option<PathIndex>,
}

impl TrackPath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| AnimationError::InvalidTrackPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let (body, index) = match path.find('[') {
            Some(open) => {
                let rest = &path[open + 1..];
                let inner = rest.strip_suffix(']').ok_or_else(|| invalid("unterminated index"))?;
                if inner.is_empty() || inner.contains(['[', ']']) {
                    return Err(invalid("malformed index"));
                }
                let index = inner
                    .parse::<usize>()
                    .map_or_else(|_| PathIndex::Name(inner.to_string()), PathIndex::Number);
                (&path[..open], Some(index))
            }
            None if path.contains(']') => return Err(invalid("unexpected ']'")),
            None => (path, None),
        };

        let segments: Vec<&str> = body.split('.').collect();
        let Some((&property, head)) = segments.split_last() else {
            return Err(invalid("missing property name"));
        };
        if property.is_empty() {
            return Err(invalid("missing property name"));
        }

        // node names may contain dots, so only `material` directly before
        // the property is treated as an object
        let (selector, object) = match head {
            [] => (None, None),
            [selector @ .., "material"] if !selector.is_empty() => (Some(selector.join(".")), Some("material")),
            _ => (Some(head.join(".")), None),
        };

        let hops = match selector.as_deref() {
            None | Some("") => Vec::new(),
            Some(selector) => {
                let hops: Vec<String> = selector.split('/').map(str::to_string).collect();
                if hops.iter().any(String::is_empty) {
                    return Err(invalid("empty node name in selector"));
                }
                hops
            }
        };

        Ok(Self {
            hops,
            object: object.map(str::to_string),
            property: property.to_string(),
            index,
        })
    }
}

impl fmt::Display for TrackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.", self.hops.join("/"))?;
        if let Some(object) = &self.object {
            write!(f, "{object}.")?;
        }
        write!(f, "{}", self.property)?;
        match &self.index {
            Some(PathIndex::Number(i)) => write!(f, "[{i}]"),
            Some(PathIndex::Name(name)) => write!(f, "[{name}]"),
            None => Ok(()),
        }
    }
}

/// The storage a resolved binding reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Position,
    Rotation,
    Scale,
    Visible,
    MorphTargetInfluences,
    /// Entry of `node.properties`.
    Custom(Symbol),
    /// Entry of `node.material.properties`.
    Material(Symbol),
}

/// How values move between the packed buffer and the target. Chosen once
/// at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// Resolution failed: reads and writes do nothing.
    Unresolved,
    /// One scalar (number, bool or string).
    DirectScalar(Field),
    /// A whole fixed-length `f32` array.
    FixedArray(Field),
    /// One element of an `f32` array.
    IndexedElement(Field, usize),
    /// A math type packed through [`ArrayValue`](crate::animation::values::ArrayValue).
    Delegated(Field),
}

/// Side effect performed after every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Versioning {
    #[default]
    None,
    /// Bumps the material's change tracker.
    NeedsUpdate,
    /// Marks the node transform dirty.
    MatrixWorldNeedsUpdate,
}

/// A track name resolved against a root node.
///
/// Bindings never hold references into the scene: the node is addressed by
/// handle and the property by interned symbol, so a binding stays valid (as a
/// no-op) when its node is removed.
#[derive(Debug, Clone)]
pub struct PropertyBinding {
    path: String,
    node: Option<NodeHandle>,
    accessor: Accessor,
    versioning: Versioning,
}

impl PropertyBinding {
    pub(crate) fn new(path: impl Into<String>, node: NodeHandle, accessor: Accessor, versioning: Versioning) -> Self {
        Self {
            path: path.into(),
            node: Some(node),
            accessor,
            versioning,
        }
    }

    pub(crate) fn unresolved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            node: None,
            accessor: Accessor::Unresolved,
            versioning: Versioning::None,
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    #[inline]
    #[must_use]
    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    #[inline]
    #[must_use]
    pub fn versioning(&self) -> Versioning {
        self.versioning
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.accessor != Accessor::Unresolved
    }

    /// Reads the current target value into `buffer`.
    pub fn get_value(&self, scene: &Scene, buffer: &mut [f32]) {
        let Some(node) = self.node.and_then(|handle| scene.get_node(handle)) else {
            return;
        };

        match self.accessor {
            Accessor::Unresolved => {}
            Accessor::DirectScalar(Field::Visible) => buffer[0] = if node.visible { 1.0 } else { 0.0 },
            Accessor::Delegated(Field::Position) => node.transform.position.to_array_into(buffer),
            Accessor::Delegated(Field::Scale) => node.transform.scale.to_array_into(buffer),
            Accessor::Delegated(Field::Rotation) => node.transform.rotation.to_array_into(buffer),
            Accessor::FixedArray(Field::MorphTargetInfluences) => {
                let n = node.morph_target_influences.len().min(buffer.len());
                buffer[..n].copy_from_slice(&node.morph_target_influences[..n]);
            }
            Accessor::IndexedElement(Field::MorphTargetInfluences, index) => {
                if let Some(&v) = node.morph_target_influences.get(index) {
                    buffer[0] = v;
                }
            }
            Accessor::IndexedElement(field, index) => {
                if let Some(Property::Array(values)) = property(node, field)
                    && let Some(&v) = values.get(index)
                {
                    buffer[0] = v;
                }
            }
            Accessor::DirectScalar(field) | Accessor::FixedArray(field) | Accessor::Delegated(field) => {
                if let Some(prop) = property(node, field)
                    && prop.value_size() <= buffer.len()
                {
                    prop.read_into(buffer);
                }
            }
        }
    }

    /// Writes `buffer` into the target, then performs the versioning side effect.
    pub fn set_value(&self, scene: &mut Scene, buffer: &[f32]) {
        let Some(node) = self.node.and_then(|handle| scene.get_node_mut(handle)) else {
            return;
        };

        match self.accessor {
            Accessor::Unresolved => return,
            Accessor::DirectScalar(Field::Visible) => node.visible = buffer[0] >= 0.5,
            Accessor::Delegated(Field::Position) => node.transform.position.from_array_slice(buffer),
            Accessor::Delegated(Field::Scale) => node.transform.scale.from_array_slice(buffer),
            Accessor::Delegated(Field::Rotation) => node.transform.rotation.from_array_slice(buffer),
            Accessor::FixedArray(Field::MorphTargetInfluences) => {
                let n = node.morph_target_influences.len().min(buffer.len());
                node.morph_target_influences[..n].copy_from_slice(&buffer[..n]);
            }
            Accessor::IndexedElement(Field::MorphTargetInfluences, index) => {
                if let Some(v) = node.morph_target_influences.get_mut(index) {
                    *v = buffer[0];
                }
            }
            Accessor::IndexedElement(field, index) => {
                if let Some(Property::Array(values)) = property_mut(node, field)
                    && let Some(v) = values.get_mut(index)
                {
                    *v = buffer[0];
                }
            }
            Accessor::DirectScalar(field) | Accessor::FixedArray(field) | Accessor::Delegated(field) => {
                if let Some(prop) = property_mut(node, field)
                    && prop.value_size() <= buffer.len()
                {
                    prop.write_from(buffer);
                }
            }
        }

        version(node, self.versioning);
    }

    /// Reads a string target.
    #[must_use]
    pub fn get_text(&self, scene: &Scene) -> Option<String> {
        let node = scene.get_node(self.node?)?;
        match (self.accessor, property(node, field_of(self.accessor)?)?) {
            (Accessor::DirectScalar(_), Property::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Writes a string target, then performs the versioning side effect.
    pub fn set_text(&self, scene: &mut Scene, text: &str) {
        let Some(node) = self.node.and_then(|handle| scene.get_node_mut(handle)) else {
            return;
        };
        let Some(field) = field_of(self.accessor) else {
            return;
        };
        if let (Accessor::DirectScalar(_), Some(Property::Text(target))) = (self.accessor, property_mut(node, field)) {
            if target != text {
                text.clone_into(target);
            }
            version(node, self.versioning);
        }
    }
}

fn field_of(accessor: Accessor) -> Option<Field> {
    match accessor {
        Accessor::Unresolved => None,
        Accessor::DirectScalar(field)
        | Accessor::FixedArray(field)
        | Accessor::IndexedElement(field, _)
        | Accessor::Delegated(field) => Some(field),
    }
}

fn property(node: &Node, field: Field) -> Option<&Property> {
    match field {
        Field::Custom(symbol) => node.properties.get(&symbol),
        Field::Material(symbol) => node.material.as_ref()?.properties.get(&symbol),
        _ => None,
    }
}

fn property_mut(node: &mut Node, field: Field) -> Option<&mut Property> {
    match field {
        Field::Custom(symbol) => node.properties.get_mut(&symbol),
        Field::Material(symbol) => node.material.as_mut()?.properties.get_mut(&symbol),
        _ => None,
    }
}

fn version(node: &mut Node, versioning: Versioning) {
    match versioning {
        Versioning::None => {}
        Versioning::NeedsUpdate => {
            if let Some(material) = node.material.as_mut() {
                material.version.changed();
            }
        }
        Versioning::MatrixWorldNeedsUpdate => node.transform.mark_dirty(),
    }
}
