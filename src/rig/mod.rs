//! IK Rig - 命名的点与链
//!
//! 一个 Rig 由绑定姿势、当前姿势、5 条链（双腿、双臂、脊柱）和 4 个点（髋、头、双脚）组成。

mod definition;
mod mapping;

pub use definition::RigDefinition;
pub use mapping::{ChainMapping, RigMapping};

/// Rig 角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RigRole {
    /// 动画源：只读取其姿势
    Source,
    /// 重定向目标：姿势由 IK 求解写入
    Target,
}

/// 链类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainKind {
    LegL,
    LegR,
    ArmL,
    ArmR,
    Spine,
}

impl ChainKind {
    pub const ALL: [ChainKind; 5] = [
        ChainKind::LegL,
        ChainKind::LegR,
        ChainKind::ArmL,
        ChainKind::ArmR,
        ChainKind::Spine,
    ];

    /// 四肢（两骨骼 IK）
    pub const LIMBS: [ChainKind; 4] = [ChainKind::LegL, ChainKind::LegR, ChainKind::ArmL, ChainKind::ArmR];

    pub fn name(self) -> &'static str {
        match self {
            ChainKind::LegL => "leg_l",
            ChainKind::LegR => "leg_r",
            ChainKind::ArmL => "arm_l",
            ChainKind::ArmR => "arm_r",
            ChainKind::Spine => "spine",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 最少成员数
    pub fn min_bones(self) -> usize {
        match self {
            ChainKind::Spine => 1,
            _ => 2,
        }
    }
}

/// 点类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointKind {
    Hip,
    Head,
    FootL,
    FootR,
}

impl PointKind {
    pub const ALL: [PointKind; 4] = [PointKind::Hip, PointKind::Head, PointKind::FootL, PointKind::FootR];

    pub fn name(self) -> &'static str {
        match self {
            PointKind::Hip => "hip",
            PointKind::Head => "head",
            PointKind::FootL => "foot_l",
            PointKind::FootR => "foot_r",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 单骨骼引用
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point {
    pub name: String,
    pub index: usize,
}
