//! 骨骼系统
//!
//! 核心设计思想：
//! - BoneState: 单个骨骼节点（本地变换 + 派生的世界变换）
//! - Pose: 扁平骨骼数组，负责父子层级与 FK 传播
//! - Chain: 从根到末端的有序骨骼子序列（腿、手臂、脊柱）

mod bone_state;
mod chain;
mod pose;

pub use bone_state::{BoneDesc, BoneState};
pub use chain::{Chain, ChainBone};
pub use pose::Pose;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 参考轴（Y 向上，角色面朝 +Z，角色左侧为 +X）
// ============================================================================

pub const FORWARD: Vec3 = Vec3::Z;
pub const BACK: Vec3 = Vec3::NEG_Z;
pub const UP: Vec3 = Vec3::Y;
pub const DOWN: Vec3 = Vec3::NEG_Y;
pub const LEFT: Vec3 = Vec3::X;
pub const RIGHT: Vec3 = Vec3::NEG_X;

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据（平移 / 旋转 / 缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { translation, rotation, scale }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    #[inline]
    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// 父变换 ∘ 子本地变换
    ///
    /// 位置先乘父缩放再乘父旋转后加父位置；四元数相乘；缩放逐分量相乘。
    #[inline]
    pub fn mul(&self, local: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(local.translation),
            rotation: (self.rotation * local.rotation).normalize(),
            scale: self.scale * local.scale,
        }
    }

    /// 将本地空间中的点变换到此变换的父空间
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// transform_point 的逆运算
    #[inline]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) / self.scale
    }

    /// 求 `local`，使得 `self.mul(&local) == world`
    #[inline]
    pub fn relative(&self, world: &Transform) -> Transform {
        Transform {
            translation: self.inverse_transform_point(world.translation),
            rotation: (self.rotation.inverse() * world.rotation).normalize(),
            scale: world.scale / self.scale,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// 转换为 4x4 矩阵（供蒙皮使用）
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}
