//! IK 数学 - 余弦定理两骨骼解、摆动-扭转分解、正交化
//!
//! 设计原则：
//! - 解析求解，不迭代
//! - 所有 acos 参数先钳制到 [-1, 1]
//! - 退化向量返回 None / 回退轴，绝不产生 NaN

use glam::{Quat, Vec3};
use std::f32::consts::PI;

/// 通用零长度阈值
pub const EPSILON: f32 = 1e-6;

/// 扭转角小于此值时跳过（0.01°）
pub const MIN_TWIST_ANGLE: f32 = 0.000_174_532_92;

/// 垂直分量相对原向量长度低于此比例时视为平行
const PERP_EPSILON: f32 = 1e-4;

/// 伸直判定的相对容差
const STRAIGHT_EPSILON: f32 = 1e-6;

// ============================================================================
// 向量工具
// ============================================================================

/// 去掉 `v` 在 `axis` 上的分量后归一化（Gram–Schmidt）
///
/// `axis` 必须是单位向量。`v` 与 `axis` 平行或为零向量时返回 None。
#[inline]
pub fn orthogonalize(v: Vec3, axis: Vec3) -> Option<Vec3> {
    let perp = v - axis * v.dot(axis);
    let len = perp.length();
    if !len.is_finite() || len <= PERP_EPSILON * v.length().max(EPSILON) {
        return None;
    }
    Some(perp / len)
}

/// 构造一对正交单位向量（look, twist）
///
/// 依次尝试传入值、回退轴、任意正交向量；第三个返回值表示是否用到了回退。
pub fn orthonormal_pair(look: Vec3, twist: Vec3, fallback_look: Vec3, fallback_twist: Vec3) -> (Vec3, Vec3, bool) {
    let mut recovered = false;

    let look = match look.try_normalize() {
        Some(l) => l,
        None => {
            recovered = true;
            fallback_look.try_normalize().unwrap_or(crate::skeleton::FORWARD)
        }
    };

    let twist = match orthogonalize(twist, look) {
        Some(t) => t,
        None => {
            recovered = true;
            orthogonalize(fallback_twist, look)
                .or_else(|| orthogonalize(crate::skeleton::UP, look))
                .unwrap_or_else(|| look.any_orthonormal_vector())
        }
    };

    (look, twist, recovered)
}

/// 绕 `axis` 从 `from` 转到 `to` 的有符号角（两者先投影到垂直于 axis 的平面）
///
/// `axis` 必须是单位向量。任一投影为零时返回 0。
#[inline]
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let f = from - axis * from.dot(axis);
    let t = to - axis * to.dot(axis);
    axis.dot(f.cross(t)).atan2(f.dot(t))
}

/// 两个单位方向之间的球面插值
#[inline]
pub fn slerp_dir(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    let arc = Quat::from_rotation_arc(a, b);
    (Quat::IDENTITY.slerp(arc, t) * a).normalize()
}

/// 在升序位置 `stops` 中找到包含 `t` 的区间，返回 (下标, 下标, 权重)
///
/// `t` 超出范围时夹到端点；`stops` 为空时返回 (0, 0, 0)。
pub fn bracket(stops: &[f32], t: f32) -> (usize, usize, f32) {
    if stops.len() < 2 || t <= stops[0] {
        return (0, 0, 0.0);
    }
    let last = stops.len() - 1;
    if t >= stops[last] {
        return (last, last, 0.0);
    }

    let i = stops.windows(2).position(|w| t <= w[1]).unwrap_or(last - 1);
    let span = stops[i + 1] - stops[i];
    let w = if span > EPSILON { (t - stops[i]) / span } else { 0.0 };
    (i, i + 1, w.clamp(0.0, 1.0))
}

// ============================================================================
// 摆动 + 扭转
// ============================================================================

/// 先把 `base * local_look` 摆到 `look`，再绕 `look` 扭转使 `base * local_twist` 贴近 `twist`
///
/// `look` 必须是单位向量。返回新的世界旋转。
pub fn aim_twist(base: Quat, local_look: Vec3, local_twist: Vec3, look: Vec3, twist: Vec3) -> Quat {
    let Some(current) = (base * local_look).try_normalize() else {
        return base;
    };

    let swing = Quat::from_rotation_arc(current, look);
    let mut rot = swing * base;

    let angle = signed_angle(rot * local_twist, twist, look);
    if angle.abs() > MIN_TWIST_ANGLE {
        rot = Quat::from_axis_angle(look, angle) * rot;
    }

    rot.normalize()
}

// ============================================================================
// 两骨骼三角形
// ============================================================================

/// 余弦定理：已知三边，求 `c` 的对角
///
/// 参数先钳制到 [-1, 1]；`a` 或 `b` 为零时返回 0。
#[inline]
pub fn law_cos_sss(a: f32, b: f32, c: f32) -> f32 {
    let denom = 2.0 * a * b;
    if denom <= EPSILON {
        return 0.0;
    }
    ((a * a + b * b - c * c) / denom).clamp(-1.0, 1.0).acos()
}

/// 两骨骼肢体的三角形解
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LimbTriangle {
    /// 近端骨骼长度
    pub a: f32,
    /// 远端长度（第二关节到末端）
    pub b: f32,
    /// 目标 首关节→末端 距离
    pub c: f32,
    /// 首关节处 首关节→末端 与 首关节→中间关节 的夹角
    pub root_angle: f32,
    /// 中间关节的内角（伸直时为 π）
    pub joint_angle: f32,
    /// 中间关节的弯曲角 π - joint_angle（伸直时为 0）
    pub bend: f32,
}

/// 按目标链长度求解三角形
///
/// `length_scale` 钳制到 [0, 1]，超伸的肢体解为完全伸直。
pub fn solve_limb_triangle(a: f32, b: f32, length_scale: f32, chain_length: f32) -> LimbTriangle {
    let scale = if length_scale.is_finite() { length_scale.clamp(0.0, 1.0) } else { 1.0 };
    let c = (scale * chain_length).min(a + b);

    if c >= (a + b) * (1.0 - STRAIGHT_EPSILON) {
        return LimbTriangle {
            a,
            b,
            c,
            root_angle: 0.0,
            joint_angle: PI,
            bend: 0.0,
        };
    }

    let joint_angle = law_cos_sss(a, b, c);
    LimbTriangle {
        a,
        b,
        c,
        root_angle: law_cos_sss(a, c, b),
        joint_angle,
        bend: PI - joint_angle,
    }
}
