//! Rig 定义 - 绑定姿势 + 当前姿势 + 链 + 点

use super::{ChainKind, Point, PointKind, RigMapping, RigRole};
use crate::ik::solver::EPSILON;
use crate::skeleton::{BoneDesc, Chain, Pose, Transform};
use crate::{RetargetError, Result};

/// Rig 定义
///
/// `tpose` 的骨骼本地变换在构建后不再修改，只有 `set_root_offset` 会改变它的场景摆放；
/// `pose` 每帧由动画采样（源）或 IK 求解（目标）写入。
#[derive(Clone, Debug)]
pub struct RigDefinition {
    pub role: RigRole,
    /// 绑定姿势
    pub tpose: Pose,
    /// 当前姿势
    pub pose: Pose,
    /// 按 ChainKind 索引
    chains: Vec<Chain>,
    /// 按 PointKind 索引
    points: Vec<Point>,
    /// 绑定姿势下髋部离地高度（模型空间 Y）
    pub bind_height: f32,
}

impl RigDefinition {
    /// 从骨骼记录与名称映射构建
    pub fn new(role: RigRole, bones: Vec<BoneDesc>, mapping: &RigMapping, root_offset: Transform) -> Result<Self> {
        let mut tpose = Pose::with_root_offset(bones, root_offset)?;

        let lookup = |pose: &Pose, name: &str| {
            pose.find(name).ok_or_else(|| RetargetError::MissingBone { name: name.to_string() })
        };

        let mut points = Vec::with_capacity(PointKind::ALL.len());
        for kind in PointKind::ALL {
            let name = mapping.point(kind);
            points.push(Point {
                name: name.to_string(),
                index: lookup(&tpose, name)?,
            });
        }

        let mut chains = Vec::with_capacity(ChainKind::ALL.len());
        for kind in ChainKind::ALL {
            let cm = mapping.chain(kind);
            let members = cm
                .bones
                .iter()
                .map(|name| lookup(&tpose, name.as_str()))
                .collect::<Result<Vec<_>>>()?;
            let end = lookup(&tpose, cm.end.as_str())?;

            if members.len() < kind.min_bones() {
                return Err(RetargetError::InvalidHierarchy(format!(
                    "chain '{}' needs at least {} bones, got {}",
                    kind.name(),
                    kind.min_bones(),
                    members.len()
                )));
            }

            chains.push(Chain::build(kind.name(), &members, end, &tpose, cm.forward_hint, cm.up_hint)?);
        }

        // 链成员的长度以链上的下一个关节为准
        for chain in &chains {
            for cb in &chain.bones {
                tpose.bones[cb.index].length = cb.length;
            }
        }

        let hip = points[PointKind::Hip.index()].index;
        let bind_height = tpose.model_transform(hip).translation.y;
        if bind_height.is_nan() || bind_height <= EPSILON {
            return Err(RetargetError::DegenerateBindPose(format!(
                "hip '{}' is at or below the ground (height {})",
                points[PointKind::Hip.index()].name,
                bind_height
            )));
        }

        log::info!(
            "[IkRig] Rig 创建: 角色={:?}, 骨骼数={}, 髋高={:.3}, 腿长={:.3}/{:.3}, 臂长={:.3}/{:.3}",
            role,
            tpose.len(),
            bind_height,
            chains[ChainKind::LegL.index()].length,
            chains[ChainKind::LegR.index()].length,
            chains[ChainKind::ArmL.index()].length,
            chains[ChainKind::ArmR.index()].length
        );

        let pose = tpose.clone();
        Ok(Self {
            role,
            tpose,
            pose,
            chains,
            points,
            bind_height,
        })
    }

    #[inline]
    pub fn chain(&self, kind: ChainKind) -> &Chain {
        &self.chains[kind.index()]
    }

    #[inline]
    pub fn point(&self, kind: PointKind) -> &Point {
        &self.points[kind.index()]
    }

    /// 当前姿势恢复为绑定姿势
    pub fn reset_pose(&mut self) {
        for (bone, bind) in self.pose.bones.iter_mut().zip(&self.tpose.bones) {
            bone.local = bind.local;
        }
        self.pose.propagate();
    }

    /// 把场景摆放同时写入绑定姿势与当前姿势
    pub fn set_root_offset(&mut self, root_offset: Transform) {
        self.tpose.set_root_offset(root_offset);
        self.pose.set_root_offset(root_offset);
    }
}
