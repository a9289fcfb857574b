use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::resources::version_tracker::ChangeTracker;
use crate::scene::property::Property;
use crate::utils::interner::{self, Symbol};

/// 材质：一组按名字寻址的参数
///
/// 动画通过 `material.<name>` 路径写入参数，每次写入后递增 `version`，
/// 渲染端据此判断是否需要重新上传 Uniform。
#[derive(Debug, Clone)]
pub struct Material {
    pub uuid: Uuid,
    pub name: String,
    pub(crate) properties: FxHashMap<Symbol, Property>,
    pub(crate) version: ChangeTracker,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            properties: FxHashMap::default(),
            version: ChangeTracker::new(),
        }
    }

    /// Builder 风格设置参数
    #[must_use]
    pub fn with_property(mut self, name: &str, value: Property) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: &str, value: Property) {
        self.properties.insert(interner::intern(name), value);
        self.version.changed();
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(&interner::get(name)?)
    }

    /// 便捷访问器：标量参数
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.property(name)? {
            Property::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// 当前版本号（每次修改递增）
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.version()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("Material")
    }
}
