//! 骨骼名称映射表
//!
//! 把 hip / leg_l 等逻辑名映射到具体骨骼名。内置 Mixamo 表，也可从 JSON 加载。

use glam::Vec3;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{ChainKind, PointKind};
use crate::skeleton::{BACK, DOWN, FORWARD, LEFT, RIGHT, UP};
use crate::Result;

/// 一条链的骨骼名
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainMapping {
    /// 成员骨骼名（近端 → 远端）
    pub bones: Vec<String>,
    /// 末端骨骼名
    pub end: String,
    /// 绑定姿势退化时使用的方向参考轴（模型空间）
    #[serde(default = "default_forward_hint")]
    pub forward_hint: Vec3,
    /// 绑定姿势伸直时使用的弯曲参考轴（模型空间）
    #[serde(default = "default_up_hint")]
    pub up_hint: Vec3,
}

fn default_forward_hint() -> Vec3 {
    DOWN
}

fn default_up_hint() -> Vec3 {
    FORWARD
}

impl ChainMapping {
    fn new(bones: &[&str], end: &str, forward_hint: Vec3, up_hint: Vec3) -> Self {
        Self {
            bones: bones.iter().map(|b| b.to_string()).collect(),
            end: end.to_string(),
            forward_hint,
            up_hint,
        }
    }
}

/// Rig 名称映射表
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigMapping {
    pub hip: String,
    pub head: String,
    pub foot_l: String,
    pub foot_r: String,
    pub leg_l: ChainMapping,
    pub leg_r: ChainMapping,
    pub arm_l: ChainMapping,
    pub arm_r: ChainMapping,
    pub spine: ChainMapping,
}

static MIXAMO: Lazy<RigMapping> = Lazy::new(|| RigMapping {
    hip: "Hips".into(),
    head: "Head".into(),
    foot_l: "LeftFoot".into(),
    foot_r: "RightFoot".into(),
    leg_l: ChainMapping::new(&["LeftUpLeg", "LeftLeg"], "LeftFoot", DOWN, FORWARD),
    leg_r: ChainMapping::new(&["RightUpLeg", "RightLeg"], "RightFoot", DOWN, FORWARD),
    arm_l: ChainMapping::new(&["LeftArm", "LeftForeArm"], "LeftHand", LEFT, BACK),
    arm_r: ChainMapping::new(&["RightArm", "RightForeArm"], "RightHand", RIGHT, BACK),
    spine: ChainMapping::new(&["Spine", "Spine1", "Spine2"], "Neck", UP, FORWARD),
});

impl RigMapping {
    /// 内置 Mixamo 命名
    pub fn mixamo() -> &'static RigMapping {
        &MIXAMO
    }

    /// 所有骨骼名加前缀（例如 "mixamorig:"）
    pub fn with_prefix(&self, prefix: &str) -> RigMapping {
        let p = |name: &String| format!("{}{}", prefix, name);
        let chain = |c: &ChainMapping| ChainMapping {
            bones: c.bones.iter().map(p).collect(),
            end: p(&c.end),
            forward_hint: c.forward_hint,
            up_hint: c.up_hint,
        };
        RigMapping {
            hip: p(&self.hip),
            head: p(&self.head),
            foot_l: p(&self.foot_l),
            foot_r: p(&self.foot_r),
            leg_l: chain(&self.leg_l),
            leg_r: chain(&self.leg_r),
            arm_l: chain(&self.arm_l),
            arm_r: chain(&self.arm_r),
            spine: chain(&self.spine),
        }
    }

    /// 从 JSON 加载
    pub fn from_json(json: &str) -> Result<RigMapping> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn point(&self, kind: PointKind) -> &str {
        match kind {
            PointKind::Hip => &self.hip,
            PointKind::Head => &self.head,
            PointKind::FootL => &self.foot_l,
            PointKind::FootR => &self.foot_r,
        }
    }

    pub fn chain(&self, kind: ChainKind) -> &ChainMapping {
        match kind {
            ChainKind::LegL => &self.leg_l,
            ChainKind::LegR => &self.leg_r,
            ChainKind::ArmL => &self.arm_l,
            ChainKind::ArmR => &self.arm_r,
            ChainKind::Spine => &self.spine,
        }
    }
}
