//! IK 重定向
//!
//! 核心设计思想：
//! - compute: 源 Rig 当前姿势 → IkPose（模型空间，与骨骼比例无关）
//! - apply: IkPose → 目标 Rig 的本地变换，最后做一次 FK
//! - solver: 两阶段共用的解析数学

mod apply;
mod compute;
mod ik_pose;
pub mod solver;

pub use apply::{
    apply_hip, apply_ik_pose_to_ik_rig, apply_ik_pose_with, apply_limb, apply_look_twist, apply_pose_to_rig,
    apply_spine,
};
pub use compute::{
    compute_hip, compute_ik_pose, compute_ik_pose_with, compute_limb, compute_look_twist, compute_spine,
};
pub use ik_pose::{IkHip, IkLimb, IkLookTwist, IkPose};

use bitflags::bitflags;

use crate::rig::{ChainKind, PointKind};
use solver::LimbTriangle;

// ============================================================================
// 部位标志
// ============================================================================

bitflags! {
    /// IK 姿势的各个部位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IkParts: u32 {
        const HIP = 1 << 0;
        const SPINE = 1 << 1;
        const LEG_L = 1 << 2;
        const LEG_R = 1 << 3;
        const ARM_L = 1 << 4;
        const ARM_R = 1 << 5;
        const FOOT_L = 1 << 6;
        const FOOT_R = 1 << 7;
        const HEAD = 1 << 8;
    }
}

impl IkParts {
    pub fn for_chain(kind: ChainKind) -> Self {
        match kind {
            ChainKind::LegL => IkParts::LEG_L,
            ChainKind::LegR => IkParts::LEG_R,
            ChainKind::ArmL => IkParts::ARM_L,
            ChainKind::ArmR => IkParts::ARM_R,
            ChainKind::Spine => IkParts::SPINE,
        }
    }

    pub fn for_point(kind: PointKind) -> Self {
        match kind {
            PointKind::Hip => IkParts::HIP,
            PointKind::Head => IkParts::HEAD,
            PointKind::FootL => IkParts::FOOT_L,
            PointKind::FootR => IkParts::FOOT_R,
        }
    }
}

// ============================================================================
// 求解结果
// ============================================================================

/// 一次两骨骼求解的记录
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LimbSolve {
    /// 目标链近端骨骼长度
    pub a: f32,
    /// 目标链第二关节到末端的长度
    pub b: f32,
    /// 求解使用的 首关节→末端 距离（已钳制）
    pub c: f32,
    pub root_angle: f32,
    /// 中间关节内角，伸直时为 π
    pub joint_angle: f32,
    /// 中间关节弯曲角，伸直时为 0
    pub bend: f32,
    /// 是否用到了回退轴或恢复了绑定姿势
    pub recovered: bool,
}

impl From<LimbTriangle> for LimbSolve {
    fn from(tri: LimbTriangle) -> Self {
        Self {
            a: tri.a,
            b: tri.b,
            c: tri.c,
            root_angle: tri.root_angle,
            joint_angle: tri.joint_angle,
            bend: tri.bend,
            recovered: false,
        }
    }
}

/// 一次完整求解的汇总
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// 已求解的部位
    pub applied: IkParts,
    /// 用到回退或恢复为绑定姿势的部位
    pub recovered: IkParts,
}

impl ApplyReport {
    #[inline]
    pub(crate) fn mark(&mut self, part: IkParts, recovered: bool) {
        self.applied |= part;
        if recovered {
            self.recovered |= part;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetargetConfig;
    use crate::rig::{RigDefinition, RigMapping, RigRole};
    use crate::skeleton::BoneDesc;
    use crate::test_support::{assert_vec_near, humanoid, humanoid_rig, humanoid_rotated, quat_angle, rig_from};
    use crate::Transform;
    use glam::{Quat, Vec3};

    /// 一组覆盖全身的非平凡姿势
    fn animate(rig: &mut RigDefinition) {
        let set = |rig: &mut RigDefinition, name: &str, rot: Quat| {
            let index = rig.pose.find(name).unwrap();
            rig.pose.bones[index].local.rotation = rot;
        };
        let hip = rig.pose.find("Hips").unwrap();
        rig.pose.bones[hip].local.translation += Vec3::new(0.05, -0.12, 0.2);

        set(rig, "Hips", Quat::from_rotation_y(0.4) * Quat::from_rotation_x(0.1));
        // 脊柱按各段长度比例前屈，两个采样即可精确重建
        set(rig, "Spine", Quat::from_rotation_x(0.15));
        set(rig, "Spine1", Quat::from_rotation_x(0.12));
        set(rig, "Spine2", Quat::from_rotation_x(0.14));
        set(rig, "Head", Quat::from_rotation_y(-0.5) * Quat::from_rotation_x(0.2));
        set(rig, "LeftUpLeg", Quat::from_rotation_x(-0.9) * Quat::from_rotation_z(0.1));
        set(rig, "LeftLeg", Quat::from_rotation_x(1.2));
        set(rig, "LeftFoot", Quat::from_rotation_x(-0.3));
        set(rig, "RightUpLeg", Quat::from_rotation_x(0.3));
        set(rig, "RightLeg", Quat::from_rotation_x(0.4));
        set(rig, "LeftArm", Quat::from_rotation_z(-1.1));
        set(rig, "LeftForeArm", Quat::from_rotation_y(0.9));
        set(rig, "RightArm", Quat::from_rotation_z(0.8) * Quat::from_rotation_x(0.3));
        set(rig, "RightForeArm", Quat::from_rotation_y(-1.3));
        rig.pose.propagate();
    }

    #[test]
    fn test_bind_pose_round_trip() {
        let source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.0);

        let mut ik = IkPose::default();
        assert!(compute_ik_pose(&source, &mut ik).is_empty());
        for kind in ChainKind::LIMBS {
            assert!((ik.limb(kind).unwrap().length_scale - 1.0).abs() < 1e-5);
        }

        let report = apply_ik_pose_to_ik_rig(&mut target, &ik);
        assert_eq!(report.applied, IkParts::all());
        assert!(report.recovered.is_empty());

        for (bone, bind) in target.pose.bones.iter().zip(&target.tpose.bones) {
            assert!((bone.position() - bind.position()).length() < 1e-3 * 0.84, "{}", bone.name);
            assert!(quat_angle(bone.rotation(), bind.rotation()) < 1e-3, "{}", bone.name);
        }
    }

    #[test]
    fn test_same_proportions_reproduce_pose() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);
        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.0);

        let mut ik = IkPose::default();
        compute_ik_pose(&source, &mut ik);
        apply_ik_pose_to_ik_rig(&mut target, &ik);

        // 四肢末端、头与髋部位置一致
        for name in ["Hips", "LeftFoot", "RightFoot", "LeftHand", "RightHand", "LeftLeg", "RightForeArm"] {
            let index = source.pose.find(name).unwrap();
            assert_vec_near(target.pose.bones[index].position(), source.pose.bones[index].position(), 2e-3);
        }
        for name in ["Hips", "Head", "LeftFoot", "Spine"] {
            let index = source.pose.find(name).unwrap();
            assert!(
                quat_angle(target.pose.bones[index].rotation(), source.pose.bones[index].rotation()) < 2e-3,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_uniform_scale_invariance() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);
        let mut ik = IkPose::default();
        compute_ik_pose(&source, &mut ik);

        let s = 1.7;
        let mut small = humanoid_rig(RigRole::Target, 1.0, 1.2);
        let mut large = humanoid_rig(RigRole::Target, s, 1.2);
        apply_ik_pose_to_ik_rig(&mut small, &ik);
        apply_ik_pose_to_ik_rig(&mut large, &ik);

        for (a, b) in small.pose.bones.iter().zip(&large.pose.bones) {
            assert_vec_near(a.position() * s, b.position(), 1e-3 * s);
            assert!(quat_angle(a.rotation(), b.rotation()) < 1e-3, "{}", a.name);
        }
    }

    #[test]
    fn test_longer_legs_keep_proportional_stance() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);
        let mut ik = IkPose::default();
        compute_ik_pose(&source, &mut ik);

        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.3);
        apply_ik_pose_to_ik_rig(&mut target, &ik);

        // 膝盖弯曲角与源一致，足部距离按目标腿长缩放
        for kind in [ChainKind::LegL, ChainKind::LegR] {
            let bend = |rig: &RigDefinition| {
                let chain = rig.chain(kind);
                let p0 = rig.pose.bones[chain.first()].position();
                let p1 = rig.pose.bones[chain.bones[1].index].position();
                let pe = rig.pose.bones[chain.end_index].position();
                ((p1 - p0).angle_between(pe - p1), p0.distance(pe) / chain.length)
            };
            let (src_bend, src_scale) = bend(&source);
            let (dst_bend, dst_scale) = bend(&target);
            assert!((src_bend - dst_bend).abs() < 2e-3, "{:?}", kind);
            assert!((src_scale - dst_scale).abs() < 1e-4, "{:?}", kind);
        }

        let hip = target.point(crate::rig::PointKind::Hip).index;
        let expected = target.tpose.bones[hip].position() + ik.hip.movement * target.bind_height;
        assert_vec_near(target.pose.bones[hip].position(), expected, 1e-5);
    }

    #[test]
    fn test_scene_placement_does_not_change_result() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);

        let mut placed = source.clone();
        let offset = Transform::new(Vec3::new(3.0, 0.0, -7.0), Quat::from_rotation_y(1.9), Vec3::ONE);
        placed.set_root_offset(offset);

        let mut a = IkPose::default();
        let mut b = IkPose::default();
        compute_ik_pose(&source, &mut a);
        compute_ik_pose(&placed, &mut b);

        assert_vec_near(a.hip.dir, b.hip.dir, 1e-4);
        assert_vec_near(a.hip.movement, b.hip.movement, 1e-4);
        assert_vec_near(a.leg_l.joint_direction, b.leg_l.joint_direction, 1e-4);
        assert_vec_near(a.head.look_direction, b.head.look_direction, 1e-4);

        // 目标放在别处时结果随摆放一起变换
        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.0);
        target.set_root_offset(offset);
        apply_ik_pose_to_ik_rig(&mut target, &a);
        let foot = target.pose.find("LeftFoot").unwrap();
        assert_vec_near(
            target.pose.bones[foot].position(),
            offset.transform_point(source.pose.bones[foot].position()),
            2e-3,
        );
    }

    #[test]
    fn test_more_spine_samples() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);
        let config = RetargetConfig {
            spine_samples: 4,
            ..Default::default()
        };
        let mut ik = IkPose::new(config.spine_samples);
        compute_ik_pose_with(&source, &mut ik, &config);
        assert_eq!(ik.spine.len(), 4);
        for sample in &ik.spine {
            assert!((sample.look_direction.length() - 1.0).abs() < 1e-5);
            assert!(sample.look_direction.dot(sample.twist_direction).abs() < 1e-5);
        }

        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.0);
        let report = apply_ik_pose_with(&mut target, &ik, &config);
        assert!(report.recovered.is_empty());

        // 末成员的朝向由最后一个采样决定
        let last = source.chain(ChainKind::Spine).last();
        assert!(quat_angle(target.pose.bones[last].rotation(), source.pose.bones[last].rotation()) < 2e-3);
    }

    #[test]
    fn test_garbage_ik_pose_is_isolated() {
        let mut target = humanoid_rig(RigRole::Target, 1.0, 1.0);
        let mut ik = IkPose::default();
        ik.arm_l.dir = Vec3::splat(f32::NAN);
        ik.head.look_direction = Vec3::ZERO;
        ik.spine.clear();

        let report = apply_ik_pose_to_ik_rig(&mut target, &ik);
        assert!(report.recovered.contains(IkParts::ARM_L | IkParts::HEAD | IkParts::SPINE));
        assert!(!report.recovered.contains(IkParts::LEG_L));
        for bone in &target.pose.bones {
            assert!(bone.world.is_finite(), "{}", bone.name);
        }
    }

    #[test]
    fn test_rotated_bind_round_trip() {
        let source = rig_from(RigRole::Source, humanoid_rotated(1.0, 1.0), RigMapping::mixamo());
        let mut target = rig_from(RigRole::Target, humanoid_rotated(1.0, 1.0), RigMapping::mixamo());

        let mut ik = IkPose::default();
        assert!(compute_ik_pose(&source, &mut ik).is_empty());
        let report = apply_ik_pose_to_ik_rig(&mut target, &ik);
        assert!(report.recovered.is_empty());

        for (bone, bind) in target.pose.bones.iter().zip(&target.tpose.bones) {
            assert!((bone.position() - bind.position()).length() < 1e-3, "{}", bone.name);
            assert!(quat_angle(bone.rotation(), bind.rotation()) < 1e-3, "{}", bone.name);
        }
    }

    #[test]
    fn test_rotated_bind_target_follows_animation() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        animate(&mut source);
        let mut target = rig_from(RigRole::Target, humanoid_rotated(1.0, 1.0), RigMapping::mixamo());

        let mut ik = IkPose::default();
        compute_ik_pose(&source, &mut ik);
        let report = apply_ik_pose_to_ik_rig(&mut target, &ik);
        assert!(report.recovered.is_empty());

        for name in ["Hips", "LeftFoot", "RightFoot"] {
            let index = source.pose.find(name).unwrap();
            assert_vec_near(target.pose.bones[index].position(), source.pose.bones[index].position(), 2e-3);
        }
    }

    /// 去掉 Spine2，其子骨骼改挂到 Spine1
    fn short_spine() -> Vec<BoneDesc> {
        let bones = humanoid(1.0, 1.0);
        let dropped = bones.iter().position(|b| b.name == "Spine2").unwrap() as i32;
        let offset = bones[dropped as usize].local.translation;

        bones
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i as i32 != dropped)
            .map(|(_, mut bone)| {
                if bone.parent_index == dropped {
                    bone.local.translation += offset;
                }
                if bone.parent_index >= dropped {
                    bone.parent_index -= 1;
                }
                bone
            })
            .collect()
    }

    #[test]
    fn test_target_with_shorter_spine() {
        let mut source = humanoid_rig(RigRole::Source, 1.0, 1.0);
        for name in ["Spine", "Spine1", "Spine2"] {
            let index = source.pose.find(name).unwrap();
            source.pose.set_local_rotation(index, Quat::from_rotation_x(0.2));
        }

        let mut mapping = RigMapping::mixamo().clone();
        mapping.spine.bones = vec!["Spine".into(), "Spine1".into()];
        let mut target = rig_from(RigRole::Target, short_spine(), &mapping);
        assert_eq!(target.chain(ChainKind::Spine).cnt(), 2);

        let mut ik = IkPose::default();
        assert!(compute_ik_pose(&source, &mut ik).is_empty());
        let report = apply_ik_pose_to_ik_rig(&mut target, &ik);
        assert!(report.recovered.is_empty());

        let rot = |rig: &RigDefinition, name: &str| rig.pose.bones[rig.pose.find(name).unwrap()].rotation();
        // 首成员取首采样，末成员取末采样，累积前屈落在 Spine1 上
        assert!(quat_angle(rot(&target, "Spine"), Quat::from_rotation_x(0.2)) < 1e-4);
        assert!(quat_angle(rot(&target, "Spine1"), Quat::from_rotation_x(0.6)) < 1e-4);
        assert!(quat_angle(rot(&target, "Neck"), rot(&source, "Neck")) < 1e-4);
    }
}
