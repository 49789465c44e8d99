//! 计算阶段 - 从源 Rig 的当前姿势提炼 IK 姿势
//!
//! 每个函数只读取 `rig.pose` / `rig.tpose`，结果全部写在模型空间。
//! 返回值表示该部位是否用到了退化输入的回退轴。

use glam::{Quat, Vec3};

use super::ik_pose::{IkLimb, IkLookTwist, IkPose};
use super::solver::{bracket, orthogonalize, orthonormal_pair, signed_angle, EPSILON};
use super::IkParts;
use crate::config::RetargetConfig;
use crate::rig::{ChainKind, PointKind, RigDefinition};
use crate::skeleton::{Chain, Pose, FORWARD, UP};

// ============================================================================
// 髋部
// ============================================================================

/// 髋部朝向、滚转与相对绑定高度的位移
pub fn compute_hip(rig: &RigDefinition, ik: &mut IkPose) -> bool {
    compute_hip_axes(rig, ik, FORWARD, UP)
}

pub(crate) fn compute_hip_axes(rig: &RigDefinition, ik: &mut IkPose, forward: Vec3, up: Vec3) -> bool {
    let hip = rig.point(PointKind::Hip).index;
    let h = rig.pose.model_transform(hip);
    let h0 = rig.tpose.model_transform(hip);

    // 相对绑定姿势的旋转增量
    let delta = (h.rotation * h0.rotation.inverse()).normalize();
    let (dir, pose_up, recovered) = orthonormal_pair(delta * forward, delta * up, forward, up);

    // 只含摆动时 up 轴会落在哪里，与实际 up 轴的差就是滚转
    let swing = Quat::from_rotation_arc(forward, dir);
    let twist = signed_angle(swing * up, pose_up, dir);

    let movement = (h.translation - h0.translation) / rig.bind_height;

    ik.hip.bind_height = rig.bind_height;
    ik.hip.dir = dir;
    if twist.is_finite() && movement.is_finite() {
        ik.hip.twist = twist;
        ik.hip.movement = movement;
        recovered
    } else {
        ik.hip.twist = 0.0;
        ik.hip.movement = Vec3::ZERO;
        true
    }
}

// ============================================================================
// 四肢
// ============================================================================

/// 首关节 → 末端 的方向、中间关节的弯曲方向与伸展比例
pub fn compute_limb(pose: &Pose, chain: &Chain, limb: &mut IkLimb) -> bool {
    let root_inv = pose.root_offset.rotation.inverse();
    let first = &pose.bones[chain.first()];
    let p0 = first.position();
    let span = root_inv * (pose.bones[chain.end_index].position() - p0);
    let dist = span.length();

    let mut recovered = false;
    let dir = match span.try_normalize().filter(|_| dist > EPSILON) {
        Some(d) => d,
        None => {
            recovered = true;
            log::debug!("[IkRig] 链 '{}' 首末端重合，使用绑定方向", chain.name);
            (root_inv * first.rotation() * chain.alt_forward).normalize()
        }
    };

    // 完全伸直时没有垂直分量，按绑定弯曲方向跟随首骨骼旋转
    let joint_direction = chain
        .bones
        .get(1)
        .and_then(|joint| orthogonalize(root_inv * (pose.bones[joint.index].position() - p0), dir))
        .or_else(|| orthogonalize(root_inv * first.rotation() * chain.alt_up, dir))
        .unwrap_or_else(|| dir.any_orthonormal_vector());

    limb.dir = dir;
    limb.joint_direction = joint_direction;
    limb.length_scale = if chain.length > EPSILON { dist / chain.length } else { 0.0 };
    recovered
}

// ============================================================================
// 朝向点（双脚、头）
// ============================================================================

/// 骨骼相对绑定姿势旋转后的参考轴
///
/// 参考轴为零或彼此平行时依次回退到默认前 / 上轴，再回退到任意正交向量。
pub fn compute_look_twist(
    rig: &RigDefinition,
    point: PointKind,
    data: &mut IkLookTwist,
    forward_ref: Vec3,
    up_ref: Vec3,
) -> bool {
    let index = rig.point(point).index;
    let delta = bind_delta(rig, index);

    let (look, twist, recovered) = orthonormal_pair(delta * forward_ref, delta * up_ref, delta * FORWARD, delta * UP);
    data.look_direction = look;
    data.twist_direction = twist;
    recovered
}

// ============================================================================
// 脊柱
// ============================================================================

/// 沿脊柱累积长度均匀采样
///
/// 采样点落在两个成员之间时，对两者的绑定增量旋转做球面插值。
pub fn compute_spine(rig: &RigDefinition, kind: ChainKind, ik: &mut IkPose, up_ref: Vec3, forward_ref: Vec3) -> bool {
    let chain = rig.chain(kind);
    let fractions = chain.joint_fractions();
    let deltas: Vec<Quat> = chain.bones.iter().map(|b| bind_delta(rig, b.index)).collect();

    let n = ik.spine.len();
    let mut recovered = false;
    for (k, sample) in ik.spine.iter_mut().enumerate() {
        let t = if n > 1 { k as f32 / (n - 1) as f32 } else { 0.0 };
        let (i0, i1, w) = bracket(&fractions, t);
        let delta = deltas[i0].slerp(deltas[i1], w).normalize();

        let (look, twist, r) = orthonormal_pair(delta * up_ref, delta * forward_ref, delta * UP, delta * FORWARD);
        sample.look_direction = look;
        sample.twist_direction = twist;
        recovered |= r;
    }
    recovered
}

// ============================================================================
// 整体
// ============================================================================

/// 按默认配置计算全部部位，返回用到回退的部位
pub fn compute_ik_pose(rig: &RigDefinition, ik: &mut IkPose) -> IkParts {
    compute_ik_pose_with(rig, ik, &RetargetConfig::default())
}

/// 按配置计算：髋 → 四肢 → 双脚 → 头 → 脊柱
pub fn compute_ik_pose_with(rig: &RigDefinition, ik: &mut IkPose, config: &RetargetConfig) -> IkParts {
    let (forward, up) = config.axes();
    let parts = config.parts;
    let mut recovered = IkParts::empty();

    if ik.spine.len() < 2 {
        ik.spine = IkPose::new(2).spine;
    }

    if parts.contains(IkParts::HIP) && compute_hip_axes(rig, ik, forward, up) {
        recovered |= IkParts::HIP;
    }

    for kind in ChainKind::LIMBS {
        let part = IkParts::for_chain(kind);
        if !parts.contains(part) {
            continue;
        }
        if let Some(limb) = ik.limb_mut(kind) {
            if compute_limb(&rig.pose, rig.chain(kind), limb) {
                recovered |= part;
            }
        }
    }

    for point in [PointKind::FootL, PointKind::FootR, PointKind::Head] {
        let part = IkParts::for_point(point);
        if !parts.contains(part) {
            continue;
        }
        if let Some(data) = ik.look_twist_mut(point) {
            if compute_look_twist(rig, point, data, forward, up) {
                recovered |= part;
            }
        }
    }

    if parts.contains(IkParts::SPINE) && compute_spine(rig, ChainKind::Spine, ik, up, forward) {
        recovered |= IkParts::SPINE;
    }

    if !recovered.is_empty() {
        log::debug!("[IkRig] 计算阶段回退: {:?}", recovered);
    }
    if config.debug_log {
        log::debug!(
            "[IkRig] IK 姿势: 髋位移={:?}, 髋滚转={:.4}, 左腿比例={:.4}, 右腿比例={:.4}",
            ik.hip.movement,
            ik.hip.twist,
            ik.leg_l.length_scale,
            ik.leg_r.length_scale
        );
    }

    recovered
}

/// 模型空间中 姿势旋转 · 绑定旋转⁻¹
fn bind_delta(rig: &RigDefinition, index: usize) -> Quat {
    let rot = rig.pose.model_transform(index).rotation;
    let bind = rig.tpose.model_transform(index).rotation;
    (rot * bind.inverse()).normalize()
}
