// 该文件是 Kanxiang （看相） 项目的一部分。
// src/predict/state.rs - 预测状态单元
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{PredictionError, PredictionResult};

/// 当前预测状态，结果与错误互斥
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PredictionState {
  /// 尚未收到任何响应
  #[default]
  Idle,
  Showing(Arc<PredictionResult>),
  Failing(PredictionError),
}

impl PredictionState {
  pub fn result(&self) -> Option<&PredictionResult> {
    match self {
      PredictionState::Showing(result) => Some(result),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&PredictionError> {
    match self {
      PredictionState::Failing(error) => Some(error),
      _ => None,
    }
  }
}

#[derive(Debug, Default)]
struct Slot {
  version: u64,
  state: PredictionState,
}

/// 单值状态单元
///
/// 每次写入整体替换旧值，没有队列也没有合并；读取拿到的是某一次响应的完整快照。
#[derive(Debug, Clone, Default)]
pub struct PredictionCell {
  slot: Arc<Mutex<Slot>>,
}

impl PredictionCell {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Slot> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn replace(&self, state: PredictionState) {
    let mut slot = self.lock();
    slot.version += 1;
    slot.state = state;
    debug!("预测状态更新至版本 {}", slot.version);
  }

  pub fn set_result(&self, result: PredictionResult) {
    self.replace(PredictionState::Showing(Arc::new(result)));
  }

  pub fn set_error(&self, error: PredictionError) {
    self.replace(PredictionState::Failing(error));
  }

  /// 返回 (版本号, 状态)，版本号每次写入加一
  pub fn snapshot(&self) -> (u64, PredictionState) {
    let slot = self.lock();
    (slot.version, slot.state.clone())
  }

  pub fn state(&self) -> PredictionState {
    self.snapshot().1
  }

  pub fn version(&self) -> u64 {
    self.lock().version
  }
}
