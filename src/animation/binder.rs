use crate::animation::binding::{Accessor, Field, PathIndex, PropertyBinding, TrackPath, Versioning};
use crate::animation::tracks::KeyframeTrack;
use crate::animation::values::ValueType;
use crate::scene::property::Property;
use crate::scene::{NodeHandle, Scene};
use crate::utils::interner;

/// Resolves track names against a scene.
pub struct Binder;

impl Binder {
    /// 将轨道路径解析到 `root` 下的实际节点属性
    ///
    /// 解析失败（路径非法、节点或属性不存在、类型或尺寸不匹配）只记录一次
    /// 警告，返回一个永久无操作的绑定。
    #[must_use]
    pub fn bind(scene: &Scene, root: NodeHandle, track: &KeyframeTrack) -> PropertyBinding {
        match Self::resolve(scene, root, track) {
            Ok(binding) => binding,
            Err(reason) => {
                log::warn!("Animation binding '{}' ignored: {reason}", track.name());
                PropertyBinding::unresolved(track.name())
            }
        }
    }

    fn resolve(scene: &Scene, root: NodeHandle, track: &KeyframeTrack) -> Result<PropertyBinding, String> {
        let path = TrackPath::parse(track.name()).map_err(|e| e.to_string())?;

        let node_handle = find_node(scene, root, &path.hops).ok_or_else(|| {
            if path.hops.is_empty() {
                "root node does not exist".to_string()
            } else {
                format!("no node '{}' below the root", path.hops.join("/"))
            }
        })?;
        let node = scene.get_node(node_handle).ok_or("node vanished")?;

        let value_type = track.value_type();
        let value_size = track.value_size();

        let (accessor, versioning, expected_size, accepted) = match path.object.as_deref() {
            Some("material") => {
                let material = node.material.as_ref().ok_or("node has no material")?;
                let symbol = interner::get(&path.property)
                    .filter(|symbol| material.properties.contains_key(symbol))
                    .ok_or_else(|| format!("material has no property '{}'", path.property))?;
                let prop = &material.properties[&symbol];
                let (accessor, size, accepted) = property_accessor(Field::Material(symbol), prop, path.index.as_ref(), value_type)?;
                (accessor, Versioning::NeedsUpdate, size, accepted)
            }
            Some(other) => return Err(format!("unknown object '{other}'")),
            None => match path.property.as_str() {
                "position" | "scale" => {
                    let field = if path.property == "position" { Field::Position } else { Field::Scale };
                    let accepted = matches!(value_type, ValueType::Vector | ValueType::Number);
                    (Accessor::Delegated(field), Versioning::MatrixWorldNeedsUpdate, 3, accepted)
                }
                "quaternion" | "rotation" => (
                    Accessor::Delegated(Field::Rotation),
                    Versioning::MatrixWorldNeedsUpdate,
                    4,
                    value_type == ValueType::Quaternion,
                ),
                "visible" => (
                    Accessor::DirectScalar(Field::Visible),
                    Versioning::None,
                    1,
                    value_type == ValueType::Bool,
                ),
                "morphTargetInfluences" => {
                    let accepted = matches!(value_type, ValueType::Number | ValueType::Vector);
                    match &path.index {
                        None => (
                            Accessor::FixedArray(Field::MorphTargetInfluences),
                            Versioning::None,
                            node.morph_target_influences.len(),
                            accepted,
                        ),
                        Some(index) => {
                            let i = match index {
                                PathIndex::Number(i) => *i,
                                PathIndex::Name(name) => *node
                                    .morph_target_dictionary
                                    .get(name)
                                    .ok_or_else(|| format!("no morph target named '{name}'"))?,
                            };
                            if i >= node.morph_target_influences.len() {
                                return Err(format!("morph target index {i} out of range"));
                            }
                            (
                                Accessor::IndexedElement(Field::MorphTargetInfluences, i),
                                Versioning::None,
                                1,
                                accepted,
                            )
                        }
                    }
                }
                name => {
                    let symbol = interner::get(name)
                        .filter(|symbol| node.properties.contains_key(symbol))
                        .ok_or_else(|| format!("node has no property '{name}'"))?;
                    let prop = &node.properties[&symbol];
                    let (accessor, size, accepted) = property_accessor(Field::Custom(symbol), prop, path.index.as_ref(), value_type)?;
                    (accessor, Versioning::None, size, accepted)
                }
            },
        };

        if !accepted {
            return Err(format!("{value_type:?} track cannot drive '{}'", path.property));
        }
        if expected_size != value_size {
            return Err(format!("value size mismatch (track {value_size}, target {expected_size})"));
        }

        Ok(PropertyBinding::new(track.name(), node_handle, accessor, versioning))
    }
}

/// Picks the accessor shape for a dynamic property.
/// Returns `(accessor, target value size, type accepted)`.
fn property_accessor(
    field: Field,
    prop: &Property,
    index: Option<&PathIndex>,
    value_type: ValueType,
) -> Result<(Accessor, usize, bool), String> {
    match (prop, index) {
        (Property::Array(values), Some(PathIndex::Number(i))) => {
            if *i >= values.len() {
                return Err(format!("index {i} out of range"));
            }
            Ok((
                Accessor::IndexedElement(field, *i),
                1,
                matches!(value_type, ValueType::Number | ValueType::Vector),
            ))
        }
        (_, Some(index)) => Err(format!("property cannot be indexed by {index:?}")),
        (Property::Scalar(_) | Property::Bool(_) | Property::Text(_), None) => {
            Ok((Accessor::DirectScalar(field), 1, prop.accepts(value_type)))
        }
        (Property::Array(_), None) => Ok((Accessor::FixedArray(field), prop.value_size(), prop.accepts(value_type))),
        (_, None) => Ok((Accessor::Delegated(field), prop.value_size(), prop.accepts(value_type))),
    }
}

/// Follows `hops` from `root`. The first hop may match the root itself; each
/// later hop searches below the previous match.
fn find_node(scene: &Scene, root: NodeHandle, hops: &[String]) -> Option<NodeHandle> {
    scene.get_node(root)?;

    let mut current = root;
    for (i, hop) in hops.iter().enumerate() {
        current = if i == 0 {
            scene.find_by_name(current, hop)?
        } else {
            scene
                .get_node(current)?
                .children()
                .iter()
                .find_map(|&child| scene.find_by_name(child, hop))?
        };
    }
    Some(current)
}
