// 该文件是 Kanxiang （看相） 项目的一部分。
// src/sampler.rs - 定时帧采样
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

use std::{
  sync::{Arc, mpsc},
  thread,
  time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
  capture::LiveFeed,
  frame::{CaptureGeometry, DEFAULT_JPEG_QUALITY, EncodeError, FrameSnapshot},
  predict::{Origin, PredictionCell, Predictor, spawn_prediction},
};

/// 默认采样间隔
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// 一次采样的结果
#[derive(Debug)]
pub enum SamplerTick {
  /// 画面尚未就绪，本次什么也不做
  Skipped,
  /// 已编码并发出请求
  Dispatched {
    geometry: CaptureGeometry,
    request: thread::JoinHandle<()>,
  },
}

/// 把当前画面编码成 JPEG 并交给预测客户端
pub struct FrameSampler {
  feed: LiveFeed,
  predictor: Arc<dyn Predictor>,
  cell: PredictionCell,
  quality: u8,
}

impl FrameSampler {
  pub fn new(feed: LiveFeed, predictor: Arc<dyn Predictor>, cell: PredictionCell) -> Self {
    Self {
      feed,
      predictor,
      cell,
      quality: DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_quality(mut self, quality: u8) -> Self {
    self.quality = quality;
    self
  }

  pub fn tick(&self) -> Result<SamplerTick, EncodeError> {
    let Some(frame) = self.feed.latest() else {
      return Ok(SamplerTick::Skipped);
    };
    if !CaptureGeometry::of(&frame).is_ready() {
      return Ok(SamplerTick::Skipped);
    }

    let snapshot = FrameSnapshot::encode(&frame, self.quality)?;
    let geometry = snapshot.geometry;
    debug!(
      "采样帧 {}x{}, JPEG {} 字节",
      geometry.width,
      geometry.height,
      snapshot.jpeg.len()
    );

    let request = spawn_prediction(
      self.predictor.clone(),
      snapshot.into_payload(),
      self.cell.clone(),
      Origin::Capture,
    );
    Ok(SamplerTick::Dispatched { geometry, request })
  }

  /// 每隔 `interval` 采样一次，直到句柄被取消
  pub fn spawn(self, interval: Duration) -> std::io::Result<SamplerHandle> {
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
      .name("sampler".to_string())
      .spawn(move || {
        info!("采样器启动，间隔 {:?}", interval);
        let mut dispatched = 0u64;
        while let Err(mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(interval) {
          match self.tick() {
            Ok(SamplerTick::Skipped) => debug!("画面未就绪，跳过本次采样"),
            Ok(SamplerTick::Dispatched { .. }) => dispatched += 1,
            Err(e) => warn!("采样帧编码失败: {}", e),
          }
        }
        info!("采样器停止，共发出 {} 次请求", dispatched);
      })?;

    Ok(SamplerHandle {
      cancel_tx: Some(cancel_tx),
      handle: Some(handle),
    })
  }
}

/// 采样线程句柄，取消后不再发出新请求；已发出的请求不受影响
pub struct SamplerHandle {
  cancel_tx: Option<mpsc::Sender<()>>,
  handle: Option<thread::JoinHandle<()>>,
}

impl SamplerHandle {
  pub fn cancel(&mut self) {
    if let Some(cancel_tx) = self.cancel_tx.take() {
      let _ = cancel_tx.send(());
    }
    if let Some(handle) = self.handle.take()
      && handle.join().is_err()
    {
      warn!("采样线程异常结束");
    }
  }

  pub fn is_running(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }
}

impl Drop for SamplerHandle {
  fn drop(&mut self) {
    self.cancel();
  }
}
