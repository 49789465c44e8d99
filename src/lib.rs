//! IK Rig 重定向引擎
//!
//! 将源角色的当前姿势提炼为与骨骼比例无关的 IK 姿势（IkPose），
//! 再在目标骨骼上逐肢体、逐脊柱段、逐朝向点求解 IK 重建同等姿势。
//!
//! 流程：`compute_ik_pose(源 Rig)` → `IkPose` → `apply_ik_pose_to_ik_rig(目标 Rig)` → FK 传播

pub mod config;
pub mod ik;
pub mod rig;
pub mod skeleton;
pub mod space;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RetargetConfig;
pub use ik::{
    apply_hip, apply_ik_pose_to_ik_rig, apply_ik_pose_with, apply_limb, apply_look_twist,
    apply_pose_to_rig, apply_spine, compute_hip, compute_ik_pose, compute_ik_pose_with,
    compute_limb, compute_look_twist, compute_spine, ApplyReport, IkHip, IkLimb, IkLookTwist,
    IkParts, IkPose, LimbSolve,
};
pub use rig::{ChainKind, Point, PointKind, RigDefinition, RigMapping, RigRole};
pub use skeleton::{BoneDesc, BoneState, Chain, ChainBone, Pose, Transform};
pub use space::{model_to_world, world_to_model};
pub use world::{FrameReport, RetargetContext, RigHandle};

use thiserror::Error;

/// 重定向错误
///
/// 只有 Rig 构建期的错误会返回给调用方；逐帧求解中的退化输入
/// （零长度方向、超伸肢体、acos 越界）都在原地修正，不会出现在这里。
#[derive(Debug, Error)]
pub enum RetargetError {
    /// 点或链引用的骨骼名不存在
    #[error("Missing bone: {name}")]
    MissingBone { name: String },

    /// 父子关系非拓扑顺序、重名、链不连续等
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// 绑定姿势无法作为参考（例如髋部位于地面以下）
    #[error("Degenerate bind pose: {0}")]
    DegenerateBindPose(String),

    /// 配置无效
    #[error("Invalid config: {0}")]
    Config(String),

    /// 名称映射表 JSON 解析失败
    #[error("Mapping parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// 句柄已失效或不存在
    #[error("Unknown rig handle: {0:?}")]
    UnknownHandle(RigHandle),
}

pub type Result<T> = std::result::Result<T, RetargetError>;
