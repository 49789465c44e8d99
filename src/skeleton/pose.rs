//! 姿势 - 扁平骨骼数组 + 父子层级 + FK 传播

use std::collections::HashMap;

use glam::Quat;

use super::bone_state::{BoneDesc, BoneState};
use super::Transform;
use crate::space::world_to_model;
use crate::{RetargetError, Result};

/// 姿势
///
/// 骨骼按父先于子的顺序存储（构建时校验），
/// 因此按索引顺序遍历一次即可完成 FK。
#[derive(Clone, Debug)]
pub struct Pose {
    /// 骨骼数组
    ///
    /// 可以直接写 `local`；`world` 是派生数据，写入后会在下次 FK 时被覆盖。
    pub bones: Vec<BoneState>,
    /// 根骨骼所组合的世界变换（角色在场景中的摆放）
    pub root_offset: Transform,
    /// 子骨骼缓存
    children_cache: Vec<Vec<usize>>,
    /// 名称索引
    name_to_index: HashMap<String, usize>,
}

impl Pose {
    /// 从原始骨骼记录构建（根偏移为单位变换）
    pub fn from_bones(descs: Vec<BoneDesc>) -> Result<Self> {
        Self::with_root_offset(descs, Transform::IDENTITY)
    }

    /// 从原始骨骼记录构建
    ///
    /// 父索引必须为 -1 或严格小于自身索引，否则返回 `InvalidHierarchy`。
    pub fn with_root_offset(descs: Vec<BoneDesc>, root_offset: Transform) -> Result<Self> {
        if descs.is_empty() {
            return Err(RetargetError::InvalidHierarchy("skeleton has no bones".into()));
        }

        let mut name_to_index = HashMap::with_capacity(descs.len());
        let mut children_cache = vec![Vec::new(); descs.len()];

        for (i, desc) in descs.iter().enumerate() {
            if desc.parent_index < -1 || desc.parent_index >= i as i32 {
                return Err(RetargetError::InvalidHierarchy(format!(
                    "bone '{}' ({}) has parent {} that is not defined before it",
                    desc.name, i, desc.parent_index
                )));
            }
            if name_to_index.insert(desc.name.clone(), i).is_some() {
                return Err(RetargetError::InvalidHierarchy(format!(
                    "duplicate bone name '{}'",
                    desc.name
                )));
            }
            if desc.parent_index >= 0 {
                children_cache[desc.parent_index as usize].push(i);
            }
        }

        let bones = descs
            .into_iter()
            .enumerate()
            .map(|(i, desc)| BoneState::from_desc(i, desc))
            .collect();

        let mut pose = Self {
            bones,
            root_offset,
            children_cache,
            name_to_index,
        };
        pose.propagate();
        pose.compute_lengths();
        Ok(pose)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// 按名称查找骨骼索引
    #[inline]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    #[inline]
    pub fn children(&self, index: usize) -> &[usize] {
        &self.children_cache[index]
    }

    // ========================================
    // FK
    // ========================================

    /// 按父先于子的顺序重新计算所有世界变换
    pub fn propagate(&mut self) {
        for i in 0..self.bones.len() {
            let parent_world = self.parent_world(i);
            self.bones[i].world = parent_world.mul(&self.bones[i].local);
        }
    }

    /// 只更新一个骨骼及其子树的世界变换
    pub fn update_world_recursive(&mut self, index: usize) {
        if index >= self.bones.len() {
            return;
        }

        let parent_world = self.parent_world(index);
        self.bones[index].world = parent_world.mul(&self.bones[index].local);

        for c in 0..self.children_cache[index].len() {
            let child = self.children_cache[index][c];
            self.update_world_recursive(child);
        }
    }

    /// 父骨骼的世界变换；根骨骼返回根偏移
    #[inline]
    pub fn parent_world(&self, index: usize) -> Transform {
        match self.bones[index].parent_id() {
            Some(parent) => self.bones[parent].world,
            None => self.root_offset,
        }
    }

    /// 骨骼在模型空间（根偏移空间）中的变换
    pub fn model_transform(&self, index: usize) -> Transform {
        let world = self.bones[index].world;
        let (mut position, mut rotation, mut scale) = (world.translation, world.rotation, world.scale);
        world_to_model(&mut position, &mut rotation, &mut scale, &self.root_offset);
        Transform::new(position, rotation, scale)
    }

    // ========================================
    // 写入
    // ========================================

    /// 写入本地旋转并刷新子树
    pub fn set_local_rotation(&mut self, index: usize, rotation: Quat) {
        self.bones[index].local.rotation = rotation.normalize();
        self.update_world_recursive(index);
    }

    /// 写入本地变换并刷新子树
    pub fn set_local(&mut self, index: usize, local: Transform) {
        self.bones[index].local = local;
        self.update_world_recursive(index);
    }

    /// 设置根偏移并重新传播
    pub fn set_root_offset(&mut self, root_offset: Transform) {
        self.root_offset = root_offset;
        self.propagate();
    }

    /// 批量写入一帧动画采样的本地变换，随后传播一次
    pub fn set_locals(&mut self, locals: &[Transform]) -> Result<()> {
        if locals.len() != self.bones.len() {
            return Err(RetargetError::InvalidHierarchy(format!(
                "expected {} local transforms, got {}",
                self.bones.len(),
                locals.len()
            )));
        }
        for (bone, local) in self.bones.iter_mut().zip(locals) {
            bone.local = *local;
        }
        self.propagate();
        Ok(())
    }

    /// 默认骨骼长度：到第一个子骨骼的距离，叶骨骼为 0
    fn compute_lengths(&mut self) {
        for i in 0..self.bones.len() {
            self.bones[i].length = match self.children_cache[i].first() {
                Some(&child) => self.bones[i].position().distance(self.bones[child].position()),
                None => 0.0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{humanoid, quat_angle};
    use glam::Vec3;

    #[test]
    fn test_rejects_parent_after_child() {
        let bones = vec![
            BoneDesc::at("root", -1, Vec3::ZERO),
            BoneDesc::at("a", 2, Vec3::Y),
            BoneDesc::at("b", 0, Vec3::Y),
        ];
        assert!(matches!(
            Pose::from_bones(bones),
            Err(RetargetError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let bones = vec![
            BoneDesc::at("root", -1, Vec3::ZERO),
            BoneDesc::at("root", 0, Vec3::Y),
        ];
        assert!(matches!(
            Pose::from_bones(bones),
            Err(RetargetError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn test_world_composes_parent_chain() {
        let bones = vec![
            BoneDesc::at("root", -1, Vec3::new(0.0, 1.0, 0.0)),
            BoneDesc::new(
                "a",
                0,
                Transform::from_translation_rotation(
                    Vec3::new(0.0, 1.0, 0.0),
                    Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                ),
            ),
            BoneDesc::at("b", 1, Vec3::new(0.0, 1.0, 0.0)),
        ];
        let mut pose = Pose::from_bones(bones).unwrap();
        pose.set_root_offset(Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)));

        // b 在 a 的 +Y 方向，a 绕 Z 轴旋转 90° 后指向 -X
        let b = pose.bones[2].position();
        assert!((b - Vec3::new(4.0, 2.0, 0.0)).length() < 1e-5);
        assert!((pose.bones[0].length - 1.0).abs() < 1e-6);
        assert_eq!(pose.bones[2].length, 0.0);
    }

    #[test]
    fn test_propagate_is_idempotent() {
        let mut pose = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        let knee = pose.find("LeftLeg").unwrap();
        pose.bones[knee].local.rotation = Quat::from_rotation_x(0.8);
        pose.propagate();
        let first: Vec<Transform> = pose.bones.iter().map(|b| b.world).collect();

        pose.propagate();
        for (bone, before) in pose.bones.iter().zip(&first) {
            assert_eq!(bone.world, *before);
        }
    }

    #[test]
    fn test_written_world_is_rederived() {
        let mut pose = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        let bind: Vec<Transform> = pose.bones.iter().map(|b| b.world).collect();
        let hand = pose.find("LeftHand").unwrap();
        pose.bones[hand].world.translation = Vec3::splat(9.0);

        pose.propagate();
        assert_eq!(pose.bones[hand].world, bind[hand]);
    }

    #[test]
    fn test_update_world_recursive_matches_propagate() {
        let mut pose = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        let spine = pose.find("Spine1").unwrap();
        pose.set_local_rotation(spine, Quat::from_rotation_y(0.4));
        let incremental: Vec<Transform> = pose.bones.iter().map(|b| b.world).collect();

        pose.propagate();
        for (bone, inc) in pose.bones.iter().zip(&incremental) {
            assert!((bone.world.translation - inc.translation).length() < 1e-6);
            assert!(quat_angle(bone.world.rotation, inc.rotation) < 1e-5);
        }
    }

    #[test]
    fn test_model_transform_removes_root_offset() {
        let mut pose = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        let hips = pose.find("Hips").unwrap();
        let before = pose.model_transform(hips);

        pose.set_root_offset(Transform::new(
            Vec3::new(3.0, 0.0, -2.0),
            Quat::from_rotation_y(1.2),
            Vec3::ONE,
        ));
        let after = pose.model_transform(hips);

        assert!((before.translation - after.translation).length() < 1e-5);
        assert!(quat_angle(before.rotation, after.rotation) < 1e-4);
    }

    #[test]
    fn test_set_locals_checks_length() {
        let mut pose = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        assert!(pose.set_locals(&[Transform::IDENTITY]).is_err());
    }
}
