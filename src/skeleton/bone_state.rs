//! 骨骼节点
//!
//! BoneState 是骨骼系统的核心单元，每个 BoneState 代表骨骼层次中的一个关节。

use glam::{Quat, Vec3};

use super::Transform;

// ============================================================================
// 骨骼描述（由资源加载方提供）
// ============================================================================

/// 原始骨骼记录
#[derive(Clone, Debug)]
pub struct BoneDesc {
    /// 骨骼名称
    pub name: String,
    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,
    /// 相对父骨骼的绑定变换
    pub local: Transform,
}

impl BoneDesc {
    pub fn new(name: impl Into<String>, parent_index: i32, local: Transform) -> Self {
        Self {
            name: name.into(),
            parent_index,
            local,
        }
    }

    /// 仅平移的骨骼（绑定旋转为单位四元数）
    pub fn at(name: impl Into<String>, parent_index: i32, translation: Vec3) -> Self {
        Self::new(name, parent_index, Transform::from_translation(translation))
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// - 静态数据：名称、索引、父子关系、静止长度
/// - 动态数据：本地变换（可写）与世界变换（只由 FK 派生）
/// - 变换计算：world = parent.world ∘ local
#[derive(Clone, Debug)]
pub struct BoneState {
    /// 骨骼名称
    pub name: String,

    /// 在姿势数组中的位置
    pub index: usize,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 相对父骨骼的变换
    pub local: Transform,

    /// 世界变换（派生数据，不要直接写入）
    pub world: Transform,

    /// 到链上唯一子骨骼的静止距离（叶骨骼为 0）
    pub length: f32,
}

impl BoneState {
    pub fn from_desc(index: usize, desc: BoneDesc) -> Self {
        Self {
            name: desc.name,
            index,
            parent_index: desc.parent_index,
            local: desc.local,
            world: desc.local,
            length: 0.0,
        }
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.world.translation
    }

    /// 获取世界旋转
    #[inline]
    pub fn rotation(&self) -> Quat {
        self.world.rotation
    }
}
