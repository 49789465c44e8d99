//! 重定向配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use glam::Vec3;

use crate::ik::IkParts;
use crate::skeleton::{FORWARD, UP};
use crate::{RetargetError, Result};

/// 重定向配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RetargetConfig {
    // ========== 参考轴 ==========
    /// 角色正前方（模型空间），默认 +Z
    /// 髋部朝向、双脚与头部的 look 轴
    pub forward: Vec3,
    /// 角色正上方（模型空间），默认 +Y
    /// 髋部、双脚与头部的 twist 轴；脊柱以它为 look 轴
    pub up: Vec3,

    // ========== 脊柱 ==========
    /// 脊柱采样数，默认 2（首、末成员各一个）
    /// 目标脊柱骨骼比源多时可适当增加
    pub spine_samples: usize,

    // ========== 部位开关 ==========
    /// 参与计算 / 求解的部位，默认全部
    pub parts: IkParts,

    // ========== 调试 ==========
    /// 是否输出逐帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            // ====== 参考轴 ======
            // Y 向上，角色面朝 +Z（与 Mixamo 导出一致）
            forward: FORWARD,
            up: UP,

            // ====== 脊柱 ======
            spine_samples: 2,

            // ====== 部位开关 ======
            parts: IkParts::all(),

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl RetargetConfig {
    /// 检查参数
    pub fn validate(&self) -> Result<()> {
        if self.spine_samples < 2 {
            return Err(RetargetError::Config(format!(
                "spine_samples must be at least 2, got {}",
                self.spine_samples
            )));
        }
        let (Some(forward), Some(up)) = (self.forward.try_normalize(), self.up.try_normalize()) else {
            return Err(RetargetError::Config("forward and up axes must be non-zero".into()));
        };
        if forward.cross(up).length() < 1e-3 {
            return Err(RetargetError::Config("forward and up axes must not be parallel".into()));
        }
        Ok(())
    }

    /// 归一化后的参考轴；`up` 已与 `forward` 正交
    pub fn axes(&self) -> (Vec3, Vec3) {
        let forward = self.forward.try_normalize().unwrap_or(FORWARD);
        let up = crate::ik::solver::orthogonalize(self.up, forward).unwrap_or(UP);
        (forward, up)
    }
}
