//! 帧上下文 - 句柄表 + 按角色并行的重定向批处理
//!
//! 每个槽位独占一个 RigDefinition 及其 IkPose，角色之间没有共享的可变状态。
//! 一帧的工作：并行计算所有源 → 快照 → 并行求解所有目标。

use std::collections::HashMap;

use crate::config::RetargetConfig;
use crate::ik::{apply_ik_pose_with, compute_ik_pose_with, ApplyReport, IkParts, IkPose};
use crate::rig::{RigDefinition, RigRole};
use crate::skeleton::Transform;
use crate::{RetargetError, Result};

/// Rig 句柄（槽位 + 代数，槽位复用后旧句柄失效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RigHandle {
    index: u32,
    generation: u32,
}

impl RigHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// 槽位内容
#[derive(Debug)]
struct RigEntry {
    rig: RigDefinition,
    /// 源：本帧计算结果；目标：本帧使用的快照
    ik_pose: IkPose,
    /// 目标绑定的源
    source: Option<RigHandle>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<RigEntry>,
}

/// 一帧的结果
#[derive(Debug, Default)]
pub struct FrameReport {
    /// 每个源在计算阶段用到回退的部位
    pub computed: Vec<(RigHandle, IkParts)>,
    /// 每个目标的求解汇总
    pub applied: Vec<(RigHandle, ApplyReport)>,
    /// 源不存在或未绑定而跳过的目标
    pub skipped: Vec<RigHandle>,
}

/// 重定向上下文
#[derive(Debug)]
pub struct RetargetContext {
    config: RetargetConfig,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl RetargetContext {
    pub fn new(config: RetargetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    /// 存活的 Rig 数量
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================
    // 句柄表
    // ========================================

    /// 注册动画源
    pub fn insert_source(&mut self, rig: RigDefinition) -> Result<RigHandle> {
        if rig.role != RigRole::Source {
            return Err(RetargetError::Config("insert_source expects a source rig".into()));
        }
        Ok(self.insert(rig, None))
    }

    /// 注册重定向目标并绑定到一个源
    pub fn insert_target(&mut self, rig: RigDefinition, source: RigHandle) -> Result<RigHandle> {
        if rig.role != RigRole::Target {
            return Err(RetargetError::Config("insert_target expects a target rig".into()));
        }
        self.check_source(source)?;
        Ok(self.insert(rig, Some(source)))
    }

    /// 把目标改绑到另一个源
    pub fn bind(&mut self, target: RigHandle, source: RigHandle) -> Result<()> {
        self.check_source(source)?;
        let entry = self.entry_mut(target)?;
        if entry.rig.role != RigRole::Target {
            return Err(RetargetError::Config("only target rigs can be bound to a source".into()));
        }
        entry.source = Some(source);
        Ok(())
    }

    /// 移除并返回 Rig；旧句柄随即失效
    pub fn remove(&mut self, handle: RigHandle) -> Result<RigDefinition> {
        self.entry(handle)?;
        let slot = &mut self.slots[handle.index()];
        let entry = slot.entry.take().ok_or(RetargetError::UnknownHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        log::info!("[IkRig] Rig 移除: 槽位={}", handle.index);
        Ok(entry.rig)
    }

    pub fn rig(&self, handle: RigHandle) -> Result<&RigDefinition> {
        Ok(&self.entry(handle)?.rig)
    }

    pub fn rig_mut(&mut self, handle: RigHandle) -> Result<&mut RigDefinition> {
        Ok(&mut self.entry_mut(handle)?.rig)
    }

    /// 最近一帧的 IK 姿势
    pub fn ik_pose(&self, handle: RigHandle) -> Result<&IkPose> {
        Ok(&self.entry(handle)?.ik_pose)
    }

    /// 写入一帧动画采样（本地变换）到源 Rig
    pub fn set_source_pose(&mut self, handle: RigHandle, locals: &[Transform]) -> Result<()> {
        self.rig_mut(handle)?.pose.set_locals(locals)
    }

    fn insert(&mut self, rig: RigDefinition, source: Option<RigHandle>) -> RigHandle {
        let entry = RigEntry {
            rig,
            ik_pose: IkPose::new(self.config.spine_samples),
            source,
        };
        let role = entry.rig.role;

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);

        log::info!("[IkRig] Rig 注册: 槽位={}, 角色={:?}", index, role);
        RigHandle {
            index,
            generation: slot.generation,
        }
    }

    fn entry(&self, handle: RigHandle) -> Result<&RigEntry> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(RetargetError::UnknownHandle(handle))
    }

    fn entry_mut(&mut self, handle: RigHandle) -> Result<&mut RigEntry> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(RetargetError::UnknownHandle(handle))
    }

    fn check_source(&self, source: RigHandle) -> Result<()> {
        match self.entry(source)?.rig.role {
            RigRole::Source => Ok(()),
            RigRole::Target => Err(RetargetError::UnknownHandle(source)),
        }
    }

    // ========================================
    // 每帧
    // ========================================

    /// 运行一帧：计算所有源，再把快照应用到各自绑定的目标
    pub fn run_frame(&mut self) -> FrameReport {
        use rayon::prelude::*;

        let Self { config, slots, .. } = self;
        let config = &*config;

        // 1. 并行计算源
        let computed: Vec<(RigHandle, IkParts)> = slots
            .par_iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let generation = slot.generation;
                let entry = slot.entry.as_mut()?;
                if entry.rig.role != RigRole::Source {
                    return None;
                }
                let recovered = compute_ik_pose_with(&entry.rig, &mut entry.ik_pose, config);
                Some((
                    RigHandle {
                        index: index as u32,
                        generation,
                    },
                    recovered,
                ))
            })
            .collect();

        // 2. 快照
        let snapshots: HashMap<RigHandle, IkPose> = computed
            .iter()
            .filter_map(|(handle, _)| {
                slots[handle.index()]
                    .entry
                    .as_ref()
                    .map(|entry| (*handle, entry.ik_pose.clone()))
            })
            .collect();

        // 3. 并行求解目标
        let results: Vec<std::result::Result<(RigHandle, ApplyReport), RigHandle>> = slots
            .par_iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let handle = RigHandle {
                    index: index as u32,
                    generation: slot.generation,
                };
                let entry = slot.entry.as_mut()?;
                if entry.rig.role != RigRole::Target {
                    return None;
                }

                match entry.source.and_then(|source| snapshots.get(&source)) {
                    Some(ik) => {
                        entry.ik_pose.clone_from(ik);
                        Some(Ok((handle, apply_ik_pose_with(&mut entry.rig, ik, config))))
                    }
                    None => {
                        log::warn!("[IkRig] 目标槽位 {} 的源不存在，跳过", index);
                        Some(Err(handle))
                    }
                }
            })
            .collect();

        let mut report = FrameReport {
            computed,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(applied) => report.applied.push(applied),
                Err(skipped) => report.skipped.push(skipped),
            }
        }

        if config.debug_log {
            log::debug!(
                "[IkRig] 帧完成: 源={}, 目标={}, 跳过={}",
                report.computed.len(),
                report.applied.len(),
                report.skipped.len()
            );
        }

        report
    }
}
