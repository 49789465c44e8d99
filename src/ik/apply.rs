//! 求解阶段 - 在目标 Rig 上重建 IK 姿势
//!
//! 顺序：髋 → 脊柱 → 四肢 → 双脚 → 头 → FK 传播。
//! 每一步写入本地变换后立即刷新子树，后续步骤读取的父骨骼世界变换总是最新的。

use glam::{Quat, Vec3};

use super::ik_pose::{IkLimb, IkLookTwist, IkPose};
use super::solver::{aim_twist, bracket, orthogonalize, orthonormal_pair, slerp_dir, solve_limb_triangle};
use super::{ApplyReport, IkParts, LimbSolve};
use crate::config::RetargetConfig;
use crate::rig::{ChainKind, PointKind, RigDefinition};
use crate::skeleton::{Transform, FORWARD};
use crate::space::model_to_world;

// ============================================================================
// 髋部
// ============================================================================

/// 按目标绑定高度还原髋部位置，再由朝向与滚转还原旋转
pub fn apply_hip(ik: &IkPose, rig: &mut RigDefinition) -> bool {
    apply_hip_axes(ik, rig, FORWARD)
}

pub(crate) fn apply_hip_axes(ik: &IkPose, rig: &mut RigDefinition, forward: Vec3) -> bool {
    let hip = rig.point(PointKind::Hip).index;
    let h0 = rig.tpose.model_transform(hip);
    let bind_local = rig.tpose.bones[hip].local;

    let mut recovered = false;
    let dir = ik.hip.dir.try_normalize().unwrap_or_else(|| {
        recovered = true;
        forward
    });
    let twist = if ik.hip.twist.is_finite() {
        ik.hip.twist
    } else {
        recovered = true;
        0.0
    };
    let movement = if ik.hip.movement.is_finite() {
        ik.hip.movement
    } else {
        recovered = true;
        Vec3::ZERO
    };

    let swing = Quat::from_rotation_arc(forward, dir);
    let mut rotation = (Quat::from_axis_angle(dir, twist) * swing * h0.rotation).normalize();
    let mut position = h0.translation + movement * rig.bind_height;
    let mut scale = h0.scale;
    model_to_world(&mut position, &mut rotation, &mut scale, &rig.pose.root_offset);

    let world = Transform::new(position, rotation, scale);
    let local = rig.pose.parent_world(hip).relative(&world);
    if local.is_finite() {
        rig.pose.set_local(hip, local);
    } else {
        log::warn!("[IkRig] 髋部求解结果非有限值，恢复绑定姿势");
        rig.pose.set_local(hip, bind_local);
        recovered = true;
    }

    recovered
}

// ============================================================================
// 四肢 - 两骨骼 IK
// ============================================================================

/// 在目标链上用余弦定理求解两骨骼肢体
///
/// `bend_hint`（世界空间）在 `joint_direction` 退化时代替它。
/// 额外成员与末端骨骼恢复为绑定本地旋转。
pub fn apply_limb(rig: &mut RigDefinition, kind: ChainKind, limb: &IkLimb, bend_hint: Option<Vec3>) -> LimbSolve {
    let chain = rig.chain(kind);
    if chain.cnt() < 2 {
        log::warn!("[IkRig] 链 '{}' 成员不足，跳过两骨骼求解", chain.name);
        return LimbSolve {
            recovered: true,
            ..Default::default()
        };
    }

    let first = chain.first();
    let second = chain.bones[1].index;
    let end = chain.end_index;
    let (alt_forward, alt_up, chain_length) = (chain.alt_forward, chain.alt_up, chain.length);
    let rest: Vec<usize> = chain.bones[1..].iter().map(|b| b.index).chain(std::iter::once(end)).collect();

    // 目标链的绑定尺寸
    let t = &rig.tpose;
    let (p0t, p1t, pet) = (t.bones[first].position(), t.bones[second].position(), t.bones[end].position());
    let axis0 = (t.bones[first].rotation().inverse() * (p1t - p0t)).normalize_or_zero();
    let axis1 = (t.bones[second].rotation().inverse() * (pet - p1t)).normalize_or_zero();
    let bind_local0 = t.bones[first].local;
    let bind_local1 = t.bones[second].local;

    let tri = solve_limb_triangle(p0t.distance(p1t), p1t.distance(pet), limb.length_scale, chain_length);
    let mut solve = LimbSolve::from(tri);

    // 首骨骼保持绑定本地变换时的世界帧
    let root = rig.pose.root_offset.rotation;
    let parent0 = rig.pose.parent_world(first);
    let start = parent0.mul(&bind_local0);
    let p0 = start.translation;

    let dir = match (root * limb.dir).try_normalize() {
        Some(d) => d,
        None => {
            solve.recovered = true;
            (start.rotation * alt_forward).normalize()
        }
    };
    let joint_direction = match orthogonalize(root * limb.joint_direction, dir) {
        Some(j) => j,
        None => {
            solve.recovered = true;
            bend_hint
                .and_then(|h| orthogonalize(h, dir))
                .or_else(|| orthogonalize(start.rotation * alt_up, dir))
                .unwrap_or_else(|| dir.any_orthonormal_vector())
        }
    };

    // 弯曲平面法线；dir 绕它转 root_angle 得到中间关节方向
    let bend_axis = dir.cross(joint_direction);
    let knee_dir = Quat::from_axis_angle(bend_axis, tri.root_angle) * dir;
    let target_end = p0 + dir * tri.c;

    // 首骨骼：绑定轴对准中间关节，绑定弯曲平面对准目标弯曲平面
    let rot0 = aim_twist(start.rotation, axis0, alt_forward.cross(alt_up), knee_dir, bend_axis);
    let local0 = Transform::new(
        bind_local0.translation,
        (parent0.rotation.inverse() * rot0).normalize(),
        bind_local0.scale,
    );

    if !local0.is_finite() {
        recover_limb(rig, kind, first, &rest);
        solve.recovered = true;
        return solve;
    }

    for &index in &rest {
        rig.pose.bones[index].local = rig.tpose.bones[index].local;
    }
    rig.pose.set_local(first, local0);

    // 第二骨骼：绑定轴对准末端目标
    let w0 = rig.pose.bones[first].world;
    let w1 = rig.pose.bones[second].world;
    if let Some(target) = (target_end - w1.translation).try_normalize() {
        let current = (w1.rotation * axis1).normalize_or_zero();
        if current != Vec3::ZERO {
            let rot1 = Quat::from_rotation_arc(current, target) * w1.rotation;
            let local1 = (w0.rotation.inverse() * rot1).normalize();
            if local1.is_finite() {
                rig.pose.set_local_rotation(second, local1);
            } else {
                rig.pose.set_local(second, bind_local1);
                solve.recovered = true;
            }
        }
    }

    solve
}

/// 非有限结果：整条链恢复绑定本地变换
fn recover_limb(rig: &mut RigDefinition, kind: ChainKind, first: usize, rest: &[usize]) {
    log::warn!("[IkRig] 链 '{}' 求解结果非有限值，恢复绑定姿势", kind.name());
    for &index in rest {
        rig.pose.bones[index].local = rig.tpose.bones[index].local;
    }
    let bind = rig.tpose.bones[first].local;
    rig.pose.set_local(first, bind);
}

// ============================================================================
// 朝向点（双脚、头）
// ============================================================================

/// 绑定前向轴摆向 look_direction，再绕它扭转使上轴贴近 twist_direction
pub fn apply_look_twist(ik: &IkPose, rig: &mut RigDefinition, point: PointKind, forward_ref: Vec3, up_ref: Vec3) -> bool {
    let Some(data) = ik.look_twist(point) else {
        return false;
    };
    let index = rig.point(point).index;
    let (look, twist, recovered) = orthonormal_pair(data.look_direction, data.twist_direction, forward_ref, up_ref);
    solve_look_twist(rig, index, look, twist, forward_ref, up_ref) || recovered
}

/// 以 `index` 父骨骼当前世界帧为基准求解一个朝向点，返回是否恢复为绑定姿势
fn solve_look_twist(rig: &mut RigDefinition, index: usize, look: Vec3, twist: Vec3, look_ref: Vec3, twist_ref: Vec3) -> bool {
    let root = rig.pose.root_offset.rotation;
    let bind_local = rig.tpose.bones[index].local;
    let bind_inv = rig.tpose.model_transform(index).rotation.inverse();
    let parent = rig.pose.parent_world(index).rotation;

    let base = parent * bind_local.rotation;
    let rot = aim_twist(base, bind_inv * look_ref, bind_inv * twist_ref, root * look, root * twist);
    let local = (parent.inverse() * rot).normalize();

    if local.is_finite() {
        rig.pose.set_local(index, Transform::new(bind_local.translation, local, bind_local.scale));
        false
    } else {
        log::warn!("[IkRig] 骨骼 '{}' 朝向求解结果非有限值，恢复绑定姿势", rig.pose.bones[index].name);
        rig.pose.set_local(index, bind_local);
        true
    }
}

// ============================================================================
// 脊柱
// ============================================================================

/// 按成员的累积长度比例在采样之间插值，逐个成员求解朝向
pub fn apply_spine(rig: &mut RigDefinition, kind: ChainKind, data: &[IkLookTwist], up_ref: Vec3, forward_ref: Vec3) -> bool {
    let chain = rig.chain(kind);
    let members: Vec<usize> = chain.bones.iter().map(|b| b.index).collect();
    let fractions = chain.joint_fractions();

    if data.is_empty() {
        log::warn!("[IkRig] 脊柱采样为空，保持绑定姿势");
        for &index in &members {
            let bind = rig.tpose.bones[index].local;
            rig.pose.set_local(index, bind);
        }
        return true;
    }

    let stops: Vec<f32> = (0..data.len())
        .map(|k| if data.len() > 1 { k as f32 / (data.len() - 1) as f32 } else { 0.0 })
        .collect();

    let mut recovered = false;
    for (&index, &t) in members.iter().zip(&fractions) {
        let (i0, i1, w) = bracket(&stops, t);
        let look = slerp_dir(data[i0].look_direction, data[i1].look_direction, w);
        let twist = slerp_dir(data[i0].twist_direction, data[i1].twist_direction, w);
        let (look, twist, r) = orthonormal_pair(look, twist, up_ref, forward_ref);

        recovered |= r;
        recovered |= solve_look_twist(rig, index, look, twist, up_ref, forward_ref);
    }
    recovered
}

// ============================================================================
// 整体
// ============================================================================

/// 一次 FK 传播
pub fn apply_pose_to_rig(rig: &mut RigDefinition) {
    rig.pose.propagate();
}

/// 按默认配置求解全部部位
pub fn apply_ik_pose_to_ik_rig(rig: &mut RigDefinition, ik: &IkPose) -> ApplyReport {
    apply_ik_pose_with(rig, ik, &RetargetConfig::default())
}

/// 按配置求解：髋 → 脊柱 → 四肢 → 双脚 → 头 → FK 传播
///
/// 单个部位的失败只会让该部位恢复绑定姿势，不影响其他部位。
pub fn apply_ik_pose_with(rig: &mut RigDefinition, ik: &IkPose, config: &RetargetConfig) -> ApplyReport {
    let (forward, up) = config.axes();
    let parts = config.parts;
    let mut report = ApplyReport::default();

    if parts.contains(IkParts::HIP) {
        report.mark(IkParts::HIP, apply_hip_axes(ik, rig, forward));
    }

    if parts.contains(IkParts::SPINE) {
        report.mark(IkParts::SPINE, apply_spine(rig, ChainKind::Spine, &ik.spine, up, forward));
    }

    for kind in ChainKind::LIMBS {
        let part = IkParts::for_chain(kind);
        if !parts.contains(part) {
            continue;
        }
        if let Some(limb) = ik.limb(kind) {
            let solve = apply_limb(rig, kind, limb, None);
            report.mark(part, solve.recovered);
        }
    }

    for point in [PointKind::FootL, PointKind::FootR, PointKind::Head] {
        let part = IkParts::for_point(point);
        if parts.contains(part) {
            report.mark(part, apply_look_twist(ik, rig, point, forward, up));
        }
    }

    apply_pose_to_rig(rig);

    if !report.recovered.is_empty() {
        log::debug!("[IkRig] 求解阶段回退: {:?}", report.recovered);
    }
    if config.debug_log {
        let hip = rig.point(PointKind::Hip).index;
        log::debug!(
            "[IkRig] 求解完成: 部位={:?}, 髋位置={:?}",
            report.applied,
            rig.pose.bones[hip].position()
        );
    }

    report
}
