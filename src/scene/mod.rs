//! 场景图系统模块
//!
//! 动画写入的目标对象图：
//! - Node: 场景节点（层级、变换、可见性、变形目标、材质、自定义属性）
//! - Transform: 变换组件（位置、旋转、缩放）
//! - Property: 动态类型的可动画属性
//! - Scene: 场景容器

pub mod node;
pub mod property;
pub mod scene;
pub mod transform;

// 重新导出常用类型
pub use node::Node;
pub use property::Property;
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
}
