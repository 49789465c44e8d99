//! 测试辅助：参数化的人形骨骼与容差比较

use glam::{Quat, Vec3};

use crate::rig::{RigDefinition, RigMapping, RigRole};
use crate::skeleton::{BoneDesc, Transform};

/// 两个旋转之间的夹角（弧度）
///
/// 用 atan2 形式而不是 acos(dot)，后者在接近 0 时 f32 误差很大。
pub fn quat_angle(a: Quat, b: Quat) -> f32 {
    let d = a.inverse() * b;
    2.0 * d.xyz().length().atan2(d.w.abs())
}

/// Mixamo 命名的人形骨骼，绑定旋转全部为单位四元数
///
/// `scale` 整体缩放，`leg_scale` 额外缩放腿部骨骼长度。
pub fn humanoid(scale: f32, leg_scale: f32) -> Vec<BoneDesc> {
    let s = scale;
    let l = scale * leg_scale;
    let v = |x: f32, y: f32, z: f32, k: f32| Vec3::new(x, y, z) * k;

    vec![
        // 0..=6 躯干
        BoneDesc::at("Hips", -1, v(0.0, 1.0, 0.0, s)),
        BoneDesc::at("Spine", 0, v(0.0, 0.1, 0.0, s)),
        BoneDesc::at("Spine1", 1, v(0.0, 0.12, 0.0, s)),
        BoneDesc::at("Spine2", 2, v(0.0, 0.14, 0.0, s)),
        BoneDesc::at("Neck", 3, v(0.0, 0.15, 0.0, s)),
        BoneDesc::at("Head", 4, v(0.0, 0.1, 0.0, s)),
        BoneDesc::at("HeadTop_End", 5, v(0.0, 0.18, 0.0, s)),
        // 7..=10 左臂
        BoneDesc::at("LeftShoulder", 3, v(0.05, 0.12, 0.0, s)),
        BoneDesc::at("LeftArm", 7, v(0.1, 0.0, 0.0, s)),
        BoneDesc::at("LeftForeArm", 8, v(0.28, 0.0, 0.0, s)),
        BoneDesc::at("LeftHand", 9, v(0.26, 0.0, 0.0, s)),
        // 11..=14 右臂
        BoneDesc::at("RightShoulder", 3, v(-0.05, 0.12, 0.0, s)),
        BoneDesc::at("RightArm", 11, v(-0.1, 0.0, 0.0, s)),
        BoneDesc::at("RightForeArm", 12, v(-0.28, 0.0, 0.0, s)),
        BoneDesc::at("RightHand", 13, v(-0.26, 0.0, 0.0, s)),
        // 15..=18 左腿
        BoneDesc::at("LeftUpLeg", 0, v(0.09, -0.05, 0.0, s)),
        BoneDesc::at("LeftLeg", 15, v(0.0, -0.42, 0.0, l)),
        BoneDesc::at("LeftFoot", 16, v(0.0, -0.42, 0.0, l)),
        BoneDesc::at("LeftToeBase", 17, v(0.0, -0.06, 0.12, s)),
        // 19..=22 右腿
        BoneDesc::at("RightUpLeg", 0, v(-0.09, -0.05, 0.0, s)),
        BoneDesc::at("RightLeg", 19, v(0.0, -0.42, 0.0, l)),
        BoneDesc::at("RightFoot", 20, v(0.0, -0.42, 0.0, l)),
        BoneDesc::at("RightToeBase", 21, v(0.0, -0.06, 0.12, s)),
    ]
}

/// 与 `humanoid` 世界位置相同，但每个骨骼都带非单位的绑定旋转
pub fn humanoid_rotated(scale: f32, leg_scale: f32) -> Vec<BoneDesc> {
    let flat = humanoid(scale, leg_scale);
    let mut world_rot: Vec<Quat> = Vec::with_capacity(flat.len());
    let mut bones = Vec::with_capacity(flat.len());

    for (i, desc) in flat.into_iter().enumerate() {
        let parent_rot = match desc.parent_index {
            -1 => Quat::IDENTITY,
            p => world_rot[p as usize],
        };
        let rot = Quat::from_rotation_y(0.3 + 0.17 * i as f32) * Quat::from_rotation_x(0.25 * (i % 4) as f32 - 0.3);
        world_rot.push(rot);

        // 原骨骼全部为单位旋转，本地平移即世界偏移
        let inv = parent_rot.inverse();
        let local = Transform::new(inv * desc.local.translation, (inv * rot).normalize(), Vec3::ONE);
        bones.push(BoneDesc::new(desc.name, desc.parent_index, local));
    }
    bones
}

/// 测试日志，重复调用无副作用
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 以内置 Mixamo 映射构建 Rig
pub fn humanoid_rig(role: RigRole, scale: f32, leg_scale: f32) -> RigDefinition {
    rig_from(role, humanoid(scale, leg_scale), RigMapping::mixamo())
}

/// 以任意骨骼与映射构建 Rig
pub fn rig_from(role: RigRole, bones: Vec<BoneDesc>, mapping: &RigMapping) -> RigDefinition {
    init_logger();
    RigDefinition::new(role, bones, mapping, Transform::IDENTITY).unwrap()
}

/// 近似相等（位置）
pub fn assert_vec_near(a: Vec3, b: Vec3, tol: f32) {
    assert!((a - b).length() < tol, "{a:?} != {b:?} (tol {tol})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Pose;

    #[test]
    fn test_logger_init_is_repeatable() {
        init_logger();
        init_logger();
        log::info!("[IkRig] test logger ready");
    }

    #[test]
    fn test_rotated_humanoid_keeps_world_positions() {
        let flat = Pose::from_bones(humanoid(1.0, 1.0)).unwrap();
        let rotated = Pose::from_bones(humanoid_rotated(1.0, 1.0)).unwrap();

        for (a, b) in flat.bones.iter().zip(&rotated.bones) {
            assert_vec_near(a.position(), b.position(), 1e-5);
            assert!(quat_angle(b.rotation(), Quat::IDENTITY) > 0.1, "{}", b.name);
        }
    }
}
