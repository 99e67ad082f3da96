// 该文件是 Kanxiang （看相） 项目的一部分。
// src/capture/gstreamer_capture.rs - GStreamer 摄像头采集
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

//! # GStreamer 采集
//!
//! 通过 `v4l2src` 或任意 GStreamer 源抓取 RGB 帧。
//!
//! ## URL Scheme
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=30`：V4L2 摄像头
//! - `gst://test?width=640&height=480`：`videotestsrc` 测试画面
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{info, warn};
use url::Url;

use super::{CaptureError, FrameGrabber};
use crate::{FromUrl, FromUrlWithScheme, url_file_path};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;

impl From<gst::glib::Error> for CaptureError {
  fn from(err: gst::glib::Error) -> Self {
    CaptureError::Device(format!("GStreamer error: {}", err))
  }
}

impl From<gst::glib::BoolError> for CaptureError {
  fn from(err: gst::glib::BoolError) -> Self {
    CaptureError::Device(format!("GStreamer error: {}", err))
  }
}

impl From<gst::StateChangeError> for CaptureError {
  fn from(err: gst::StateChangeError) -> Self {
    CaptureError::Device(format!("GStreamer state change error: {}", err))
  }
}

enum SourceItem {
  Camera {
    device: String,
    io_mode: Option<u32>,
    width: u32,
    height: u32,
    fps: u32,
  },
  TestPattern {
    width: u32,
    height: u32,
  },
}

impl SourceItem {
  fn to_pipeline(&self) -> String {
    match self {
      SourceItem::Camera {
        device,
        io_mode,
        width,
        height,
        fps,
      } => {
        let io_mode_str = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        format!(
          "v4l2src device={}{} ! video/x-raw,width={},height={},framerate={}/1",
          device, io_mode_str, width, height, fps
        )
      }
      SourceItem::TestPattern { width, height } => format!(
        "videotestsrc is-live=true pattern=ball ! video/x-raw,width={},height={}",
        width, height
      ),
    }
  }
}

/// GStreamer 采集管道构建器
pub struct GStreamerGrabberBuilder {
  source: SourceItem,
}

impl FromUrlWithScheme for GStreamerGrabberBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerGrabberBuilder {
  type Error = CaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CaptureError::UnsupportedScheme(url.scheme().to_string()));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let get = |key: &str, default: u32| {
      query
        .get(key)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
    };

    let source = match url.host_str() {
      Some("camera") => {
        let path = url_file_path(url);
        SourceItem::Camera {
          device: if path.is_empty() {
            "/dev/video0".to_string()
          } else {
            path
          },
          io_mode: query.get("io-mode").and_then(|v| v.parse().ok()),
          width: get("width", DEFAULT_WIDTH),
          height: get("height", DEFAULT_HEIGHT),
          fps: get("fps", DEFAULT_FPS),
        }
      }
      Some("test") => SourceItem::TestPattern {
        width: get("width", DEFAULT_WIDTH),
        height: get("height", DEFAULT_HEIGHT),
      },
      other => {
        return Err(CaptureError::Device(format!(
          "未知的 GStreamer 源: {:?}",
          other
        )));
      }
    };

    Ok(Self { source })
  }
}

impl GStreamerGrabberBuilder {
  fn pipeline_description(&self) -> String {
    format!(
      "{} ! videoconvert ! video/x-raw,format=RGB ! appsink max-buffers=2 drop=true name=sink",
      self.source.to_pipeline()
    )
  }

  pub fn build(self) -> Result<GStreamerGrabber, CaptureError> {
    gst::init()?;

    let description = self.pipeline_description();
    info!("GStreamer 采集管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| CaptureError::Device("无法创建 GStreamer 管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| CaptureError::Device("找不到 appsink 元素".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| CaptureError::Device("无法转换为 appsink".to_string()))?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerGrabber { pipeline, appsink })
  }
}

/// GStreamer 采集源
pub struct GStreamerGrabber {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl Drop for GStreamerGrabber {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl FrameGrabber for GStreamerGrabber {
  fn grab(&mut self) -> Result<RgbImage, CaptureError> {
    let sample = self
      .appsink
      .pull_sample()
      .map_err(|e| CaptureError::Frame(format!("无法获取样本: {}", e)))?;
    sample_to_rgb(&sample)
  }
}

fn sample_to_rgb(sample: &gst::Sample) -> Result<RgbImage, CaptureError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| CaptureError::Frame("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| CaptureError::Frame("样本中没有 caps".to_string()))?;
  let info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|_| CaptureError::Frame("无法从 caps 获取视频信息".to_string()))?;

  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(CaptureError::Frame(format!(
      "不支持的视频格式: {:?}",
      info.format()
    )));
  }

  let width = info.width();
  let height = info.height();
  let stride = info.stride()[0] as usize;
  let row = width as usize * 3;

  let map = buffer
    .map_readable()
    .map_err(|e| CaptureError::Frame(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();

  if height == 0 {
    return Err(CaptureError::Frame("帧高度为零".to_string()));
  }
  let expected = stride * (height as usize - 1) + row;
  if data.len() < expected {
    return Err(CaptureError::Frame(format!(
      "缓冲区大小不匹配: 期望 {} 字节, 实际 {} 字节",
      expected,
      data.len()
    )));
  }

  let mut rgb = Vec::with_capacity(row * height as usize);
  for y in 0..height as usize {
    rgb.extend_from_slice(&data[y * stride..y * stride + row]);
  }

  RgbImage::from_raw(width, height, rgb)
    .ok_or_else(|| CaptureError::Frame("无法创建 RGB 图像".to_string()))
}
