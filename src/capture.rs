// 该文件是 Kanxiang （看相） 项目的一部分。
// src/capture.rs - 摄像头采集源
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

//! 采集源在独立线程上持续抓帧，并把最新一帧放进 [`LiveFeed`]。
//! 采样器和渲染器都只读 `LiveFeed`，互不等待。
//!
//! 设备只在启动时尝试打开一次，失败后整个会话退化为仅上传模式。

use std::{
  sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::Duration,
};

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::frame::CaptureGeometry;

#[cfg(feature = "read_image_file")]
mod image_capture;
#[cfg(feature = "read_image_file")]
pub use self::image_capture::StillImageGrabber;

#[cfg(feature = "v4l_capture")]
mod v4l_capture;
#[cfg(feature = "v4l_capture")]
pub use self::v4l_capture::V4lGrabber;

#[cfg(feature = "gstreamer_input")]
mod gstreamer_capture;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_capture::{GStreamerGrabber, GStreamerGrabberBuilder};

/// 命令行未指定时使用的采集源
pub const DEFAULT_CAPTURE: &str = "v4l:///dev/video0";

/// 连续抓帧失败达到该次数后认为设备已不可用
const MAX_CONSECUTIVE_FAILURES: u32 = 30;
const FAILURE_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum CaptureError {
  #[error("不支持的采集源: {0}")]
  UnsupportedScheme(String),
  #[error("设备错误: {0}")]
  Device(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("帧数据错误: {0}")]
  Frame(String),
  #[error("采集线程错误: {0}")]
  Thread(String),
}

/// 逐帧读取的采集后端，在采集线程内部创建和使用
pub trait FrameGrabber {
  fn grab(&mut self) -> Result<RgbImage, CaptureError>;
}

/// 最新视频帧的共享单元，相当于页面上的 `<video>` 元素
#[derive(Debug, Clone, Default)]
pub struct LiveFeed {
  latest: Arc<RwLock<Option<Arc<RgbImage>>>>,
}

impl LiveFeed {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn publish(&self, frame: RgbImage) {
    let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
    *latest = Some(Arc::new(frame));
  }

  pub fn clear(&self) {
    let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
    *latest = None;
  }

  pub fn latest(&self) -> Option<Arc<RgbImage>> {
    self
      .latest
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// 尚无画面时为 (0, 0)
  pub fn geometry(&self) -> CaptureGeometry {
    self
      .latest()
      .map(|frame| CaptureGeometry::of(&frame))
      .unwrap_or_default()
  }

  pub fn is_ready(&self) -> bool {
    self.geometry().is_ready()
  }
}

type GrabberOpener = Box<dyn FnOnce() -> Result<Box<dyn FrameGrabber>, CaptureError> + Send>;

/// 按 URL 方案选择采集后端
fn grabber_opener(url: &Url) -> Result<GrabberOpener, CaptureError> {
  let scheme = url.scheme().to_string();
  let url = url.clone();
  match scheme.as_str() {
    #[cfg(feature = "read_image_file")]
    scheme if scheme == <StillImageGrabber as crate::FromUrlWithScheme>::SCHEME => {
      Ok(Box::new(move || {
        use crate::FromUrl;
        Ok(Box::new(StillImageGrabber::from_url(&url)?) as Box<dyn FrameGrabber>)
      }))
    }
    #[cfg(feature = "v4l_capture")]
    scheme if scheme == <V4lGrabber as crate::FromUrlWithScheme>::SCHEME => {
      Ok(Box::new(move || {
        use crate::FromUrl;
        Ok(Box::new(V4lGrabber::from_url(&url)?) as Box<dyn FrameGrabber>)
      }))
    }
    #[cfg(feature = "gstreamer_input")]
    scheme if scheme == <GStreamerGrabberBuilder as crate::FromUrlWithScheme>::SCHEME => {
      Ok(Box::new(move || {
        use crate::FromUrl;
        let grabber = GStreamerGrabberBuilder::from_url(&url)?.build()?;
        Ok(Box::new(grabber) as Box<dyn FrameGrabber>)
      }))
    }
    other => Err(CaptureError::UnsupportedScheme(other.to_string())),
  }
}

/// 运行中的采集源
pub struct CaptureSource {
  feed: LiveFeed,
  stop: Arc<AtomicBool>,
  handle: Option<thread::JoinHandle<()>>,
}

impl CaptureSource {
  /// 按 URL 打开采集源，只尝试一次
  pub fn start(url: &Url) -> Result<Self, CaptureError> {
    info!("打开采集源: {}", url);
    Self::spawn_with(grabber_opener(url)?)
  }

  /// 采集不可用时的占位源，画面永远不会就绪
  pub fn unavailable() -> Self {
    Self {
      feed: LiveFeed::new(),
      stop: Arc::new(AtomicBool::new(true)),
      handle: None,
    }
  }

  /// 在采集线程内打开后端并持续抓帧，打开结果同步返回
  pub fn spawn_with<F>(open: F) -> Result<Self, CaptureError>
  where
    F: FnOnce() -> Result<Box<dyn FrameGrabber>, CaptureError> + Send + 'static,
  {
    let feed = LiveFeed::new();
    let stop = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let handle = {
      let feed = feed.clone();
      let stop = stop.clone();
      thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || {
          let mut grabber = match open() {
            Ok(grabber) => {
              let _ = ready_tx.send(Ok(()));
              grabber
            }
            Err(e) => {
              let _ = ready_tx.send(Err(e));
              return;
            }
          };
          capture_loop(grabber.as_mut(), &feed, &stop);
        })?
    };

    match ready_rx.recv() {
      Ok(Ok(())) => {
        info!("采集源已就绪");
        Ok(Self {
          feed,
          stop,
          handle: Some(handle),
        })
      }
      Ok(Err(e)) => {
        let _ = handle.join();
        Err(e)
      }
      Err(_) => {
        let _ = handle.join();
        Err(CaptureError::Thread("采集线程意外退出".to_string()))
      }
    }
  }

  pub fn feed(&self) -> &LiveFeed {
    &self.feed
  }

  pub fn is_running(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  pub fn stop(&mut self) {
    self.stop.store(true, Ordering::SeqCst);
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        warn!("采集线程异常结束");
      }
      info!("采集源已停止");
    }
  }
}

impl Drop for CaptureSource {
  fn drop(&mut self) {
    self.stop();
  }
}

fn capture_loop(grabber: &mut dyn FrameGrabber, feed: &LiveFeed, stop: &AtomicBool) {
  let mut failures = 0u32;
  let mut frames = 0u64;
  while !stop.load(Ordering::SeqCst) {
    match grabber.grab() {
      Ok(frame) => {
        failures = 0;
        frames += 1;
        feed.publish(frame);
      }
      Err(e) => {
        failures += 1;
        warn!("抓帧失败 ({}/{}): {}", failures, MAX_CONSECUTIVE_FAILURES, e);
        if failures >= MAX_CONSECUTIVE_FAILURES {
          error!("采集设备持续失败，停止采集");
          feed.clear();
          break;
        }
        thread::sleep(FAILURE_BACKOFF);
      }
    }
  }
  info!("采集线程退出，共采集 {} 帧", frames);
}
