//! 核心资源定义模块
//!
//! 动画可写入的非节点资源：
//! - Material: 材质参数表
//! - ChangeTracker: 版本号，标记资源需要重新上传

pub mod material;
pub mod version_tracker;

pub use material::Material;
pub use version_tracker::ChangeTracker;
