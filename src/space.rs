//! 空间转换 - 场景世界空间 ⇄ 模型（网格根）空间
//!
//! 骨骼的世界变换位于场景空间，而 IK 姿势中的方向都以模型空间存储，
//! 这样摆放位置 / 朝向不同的两个角色可以得到相同的重定向结果。

use glam::{Quat, Vec3};

use crate::skeleton::Transform;

/// 原地把世界空间的位置 / 旋转 / 缩放转换到 `mesh_world` 的本地空间
#[inline]
pub fn world_to_model(position: &mut Vec3, rotation: &mut Quat, scale: &mut Vec3, mesh_world: &Transform) {
    *position = mesh_world.inverse_transform_point(*position);
    *rotation = (mesh_world.rotation.inverse() * *rotation).normalize();
    *scale /= mesh_world.scale;
}

/// world_to_model 的逆运算
#[inline]
pub fn model_to_world(position: &mut Vec3, rotation: &mut Quat, scale: &mut Vec3, mesh_world: &Transform) {
    *position = mesh_world.transform_point(*position);
    *rotation = (mesh_world.rotation * *rotation).normalize();
    *scale *= mesh_world.scale;
}

/// 只转换方向（不受平移与缩放影响）
#[inline]
pub fn dir_world_to_model(dir: Vec3, mesh_world: &Transform) -> Vec3 {
    mesh_world.rotation.inverse() * dir
}

#[inline]
pub fn dir_model_to_world(dir: Vec3, mesh_world: &Transform) -> Vec3 {
    mesh_world.rotation * dir
}
