use glam::{Affine3A, Quat, Vec3};

/// Transform 组件
///
/// 封装节点的位置、旋转、缩放（TRS）以及局部矩阵缓存和脏标记。
/// 动画写入 TRS 后调用 [`Transform::mark_dirty`]，宿主的变换系统据此
/// 重算矩阵（即 "matrix world needs update"）。
#[derive(Debug, Clone)]
pub struct Transform {
    // === Public 属性 ===
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    // === 矩阵缓存 ===
    pub(crate) local_matrix: Affine3A,

    // === 脏检查状态 ===
    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,

            local_matrix: Affine3A::IDENTITY,

            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    /// 检查并更新局部矩阵
    /// 返回值: 是否发生了变化
    pub fn update_local_matrix(&mut self) -> bool {
        let changed = self.needs_update();

        if changed {
            self.local_matrix = Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);

            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.force_update = false;
        }

        changed
    }

    /// 矩阵是否过期（TRS 改变或被手动标记）
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.force_update
            || self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
    }

    /// 获取局部矩阵（可能尚未更新，先调用 `update_local_matrix`）
    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    /// 手动标记脏
    pub fn mark_dirty(&mut self) {
        self.force_update = true;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
