//! IK 姿势 - 与骨骼比例无关的中间表示
//!
//! 所有方向都在模型空间中，位移以髋部绑定高度为单位。

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::rig::{ChainKind, PointKind};
use crate::skeleton::{FORWARD, UP};

/// 髋部
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkHip {
    /// 源 Rig 的髋部绑定高度
    pub bind_height: f32,
    /// 绕 dir 的滚转（弧度）
    pub twist: f32,
    /// 髋部朝向
    pub dir: Vec3,
    /// 相对绑定位置的位移 / bind_height
    pub movement: Vec3,
}

impl Default for IkHip {
    fn default() -> Self {
        Self {
            bind_height: 0.0,
            twist: 0.0,
            dir: FORWARD,
            movement: Vec3::ZERO,
        }
    }
}

/// 四肢
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkLimb {
    /// 首关节 → 末端
    pub dir: Vec3,
    /// 中间关节的弯曲方向，与 dir 正交
    pub joint_direction: Vec3,
    /// 当前 首关节→末端 距离 / 链绑定长度
    pub length_scale: f32,
}

impl Default for IkLimb {
    fn default() -> Self {
        Self {
            dir: Vec3::NEG_Y,
            joint_direction: FORWARD,
            length_scale: 1.0,
        }
    }
}

/// 朝向 + 扭转
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkLookTwist {
    pub look_direction: Vec3,
    pub twist_direction: Vec3,
}

impl Default for IkLookTwist {
    fn default() -> Self {
        Self {
            look_direction: FORWARD,
            twist_direction: UP,
        }
    }
}

/// IK 姿势
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkPose {
    pub hip: IkHip,
    pub leg_l: IkLimb,
    pub leg_r: IkLimb,
    pub arm_l: IkLimb,
    pub arm_r: IkLimb,
    pub foot_l: IkLookTwist,
    pub foot_r: IkLookTwist,
    pub head: IkLookTwist,
    /// 沿脊柱累积长度均匀分布的采样（至少 2 个）
    pub spine: Vec<IkLookTwist>,
}

impl Default for IkPose {
    fn default() -> Self {
        Self::new(2)
    }
}

impl IkPose {
    /// `spine_samples` 小于 2 时按 2 处理
    pub fn new(spine_samples: usize) -> Self {
        // 脊柱以 up 为 look 轴
        let upright = IkLookTwist {
            look_direction: UP,
            twist_direction: FORWARD,
        };
        Self {
            hip: IkHip::default(),
            leg_l: IkLimb::default(),
            leg_r: IkLimb::default(),
            arm_l: IkLimb::default(),
            arm_r: IkLimb::default(),
            foot_l: IkLookTwist::default(),
            foot_r: IkLookTwist::default(),
            head: IkLookTwist::default(),
            spine: vec![upright; spine_samples.max(2)],
        }
    }

    /// 四肢数据；脊柱返回 None
    pub fn limb(&self, kind: ChainKind) -> Option<&IkLimb> {
        match kind {
            ChainKind::LegL => Some(&self.leg_l),
            ChainKind::LegR => Some(&self.leg_r),
            ChainKind::ArmL => Some(&self.arm_l),
            ChainKind::ArmR => Some(&self.arm_r),
            ChainKind::Spine => None,
        }
    }

    pub fn limb_mut(&mut self, kind: ChainKind) -> Option<&mut IkLimb> {
        match kind {
            ChainKind::LegL => Some(&mut self.leg_l),
            ChainKind::LegR => Some(&mut self.leg_r),
            ChainKind::ArmL => Some(&mut self.arm_l),
            ChainKind::ArmR => Some(&mut self.arm_r),
            ChainKind::Spine => None,
        }
    }

    /// 朝向点数据；髋部返回 None
    pub fn look_twist(&self, kind: PointKind) -> Option<&IkLookTwist> {
        match kind {
            PointKind::Head => Some(&self.head),
            PointKind::FootL => Some(&self.foot_l),
            PointKind::FootR => Some(&self.foot_r),
            PointKind::Hip => None,
        }
    }

    pub fn look_twist_mut(&mut self, kind: PointKind) -> Option<&mut IkLookTwist> {
        match kind {
            PointKind::Head => Some(&mut self.head),
            PointKind::FootL => Some(&mut self.foot_l),
            PointKind::FootR => Some(&mut self.foot_r),
            PointKind::Hip => None,
        }
    }

    /// 保存为 JSON 快照
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<IkPose> {
        Ok(serde_json::from_str(json)?)
    }
}
