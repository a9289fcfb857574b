use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::resources::material::Material;
use crate::scene::NodeHandle;
use crate::scene::property::Property;
use crate::scene::transform::Transform;
use crate::utils::interner::{self, Symbol};

/// A scene node: hierarchy, transform and the animatable state attached to it.
///
/// # Animatable state
///
/// - `transform` (`position`, `quaternion`/`rotation`, `scale`)
/// - `visible`
/// - `morph_target_influences`, addressed as a whole or per element by index
///   or by a name from `morph_target_dictionary`
/// - `material` parameters (`material.<name>`)
/// - free-form `properties`, keyed by interned name
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub uuid: Uuid,

    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,
    pub visible: bool,

    // === Morph targets ===
    pub morph_target_influences: Vec<f32>,
    pub morph_target_dictionary: FxHashMap<String, usize>,

    pub material: Option<Material>,
    pub(crate) properties: FxHashMap<Symbol, Property>,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("")
    }

    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            morph_target_influences: Vec::new(),
            morph_target_dictionary: FxHashMap::default(),
            material: None,
            properties: FxHashMap::default(),
        }
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    /// Declares the morph targets of this node, all influences at zero.
    pub fn set_morph_targets<S: Into<String>>(&mut self, names: impl IntoIterator<Item = S>) {
        self.morph_target_dictionary.clear();
        for (index, name) in names.into_iter().enumerate() {
            self.morph_target_dictionary.insert(name.into(), index);
        }
        self.morph_target_influences = vec![0.0; self.morph_target_dictionary.len()];
    }

    pub fn set_property(&mut self, name: &str, value: Property) {
        self.properties.insert(interner::intern(name), value);
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(&interner::get(name)?)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
