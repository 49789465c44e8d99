//! 骨骼链 - 从近端到远端的有序骨骼子序列
//!
//! 链在 Rig 绑定时一次性构建，之后不再改变。
//! 末端骨骼（脚、手、脖子）不属于链成员，只用来确定最后一节的长度与方向。

use glam::Vec3;

use super::Pose;
use crate::ik::solver::{orthogonalize, EPSILON};
use crate::{RetargetError, Result};

/// 链成员
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainBone {
    /// 骨骼索引
    pub index: usize,
    /// 绑定姿势下到下一个关节的距离
    pub length: f32,
}

/// 骨骼链
#[derive(Clone, Debug)]
pub struct Chain {
    pub name: String,
    /// 链成员（近端 → 远端）
    pub bones: Vec<ChainBone>,
    /// 末端骨骼索引
    pub end_index: usize,
    /// 成员长度之和
    pub length: f32,
    /// 绑定姿势下 首关节 → 末端 的方向，位于首骨骼的绑定本地空间
    pub alt_forward: Vec3,
    /// 绑定姿势下的弯曲方向，位于首骨骼的绑定本地空间，与 alt_forward 正交
    pub alt_up: Vec3,
}

impl Chain {
    /// 从绑定姿势构建链
    ///
    /// `members` 中每个骨骼必须是下一个骨骼的直接父骨骼，最后一个成员必须是 `end` 的直接父骨骼。
    /// `forward_hint` / `up_hint` 为模型空间参考轴，只在绑定姿势退化（零长度、完全伸直）时使用。
    pub fn build(
        name: &str,
        members: &[usize],
        end: usize,
        tpose: &Pose,
        forward_hint: Vec3,
        up_hint: Vec3,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(RetargetError::InvalidHierarchy(format!("chain '{}' has no bones", name)));
        }

        let mut joints = members.to_vec();
        joints.push(end);
        for pair in joints.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            if child >= tpose.len() || tpose.bones[child].parent_id() != Some(parent) {
                return Err(RetargetError::InvalidHierarchy(format!(
                    "chain '{}': bone {} is not the direct parent of bone {}",
                    name, parent, child
                )));
            }
        }

        let bones: Vec<ChainBone> = joints
            .windows(2)
            .map(|pair| ChainBone {
                index: pair[0],
                length: tpose.bones[pair[0]].position().distance(tpose.bones[pair[1]].position()),
            })
            .collect();
        let length = bones.iter().map(|b| b.length).sum();

        // 参考轴都换算到首骨骼的绑定本地空间
        let first = members[0];
        let first_model_rot = tpose.model_transform(first).rotation;
        let to_local = first_model_rot.inverse();
        let root_inv = tpose.root_offset.rotation.inverse();

        let p0 = tpose.bones[first].position();
        let pe = tpose.bones[end].position();

        let forward_model = (root_inv * (pe - p0))
            .try_normalize()
            .or_else(|| forward_hint.try_normalize())
            .unwrap_or(super::FORWARD);

        // 弯曲方向：第二个关节相对 首关节→末端 直线的垂直分量
        let bend_model = members
            .get(1)
            .and_then(|&joint| orthogonalize(root_inv * (tpose.bones[joint].position() - p0), forward_model))
            .filter(|_| (pe - p0).length() > EPSILON)
            .or_else(|| orthogonalize(up_hint, forward_model))
            .or_else(|| orthogonalize(super::UP, forward_model))
            .unwrap_or_else(|| forward_model.any_orthonormal_vector());

        Ok(Self {
            name: name.to_string(),
            bones,
            end_index: end,
            length,
            alt_forward: (to_local * forward_model).normalize(),
            alt_up: (to_local * bend_model).normalize(),
        })
    }

    /// 成员数量
    #[inline]
    pub fn cnt(&self) -> usize {
        self.bones.len()
    }

    /// 近端骨骼索引
    #[inline]
    pub fn first(&self) -> usize {
        self.bones[0].index
    }

    /// 远端成员骨骼索引
    #[inline]
    pub fn last(&self) -> usize {
        self.bones[self.bones.len() - 1].index
    }

    /// 每个成员沿链的累积长度比例，首成员为 0，末成员为 1
    ///
    /// 只有一个成员时返回 `[0.0]`。
    pub fn joint_fractions(&self) -> Vec<f32> {
        let mut cum = Vec::with_capacity(self.bones.len());
        let mut acc = 0.0;
        for bone in &self.bones {
            cum.push(acc);
            acc += bone.length;
        }
        let total = cum.last().copied().unwrap_or(0.0);
        if total <= EPSILON {
            let n = cum.len();
            return (0..n)
                .map(|i| if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 })
                .collect();
        }
        cum.into_iter().map(|c| c / total).collect()
    }
}
