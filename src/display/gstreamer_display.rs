// 该文件是 Kanxiang （看相） 项目的一部分。
// src/display/gstreamer_display.rs - GStreamer 实时窗口
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

//! # GStreamer 显示
//!
//! 把合成后的画面通过 `appsrc` 推给任意视频 sink。
//!
//! ## URL Scheme
//!
//! - `gst://autovideosink`：系统默认窗口
//! - `gst://ximagesink?fps=15`
//!
//! 画面尺寸变化时重新设置 caps。

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use super::{Display, DisplayError};
use crate::{
  FromUrl, FromUrlWithScheme, frame::CaptureGeometry, overlay::OverlayFrame, query_value,
};

const DEFAULT_SINK: &str = "autovideosink";
const DEFAULT_FPS: u32 = 30;

#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  fps: u32,
  geometry: CaptureGeometry,
  frame_count: u64,
}

impl FromUrlWithScheme for GStreamerDisplay {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerDisplayError::SchemeMismatch);
    }

    gst::init()?;

    let sink = url.host_str().unwrap_or(DEFAULT_SINK);
    let fps = query_value(url, "fps").unwrap_or(DEFAULT_FPS).max(1);
    let description = format!(
      "appsrc name=src is-live=true format=time ! videoconvert ! {} sync=false",
      sink
    );
    info!("GStreamer 显示管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcNotFound)?;
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerDisplay {
      pipeline,
      appsrc,
      fps,
      geometry: CaptureGeometry::default(),
      frame_count: 0,
    })
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }
    info!("GStreamer 显示已关闭，共推送 {} 帧", self.frame_count);
  }
}

impl GStreamerDisplay {
  fn renegotiate(&mut self, geometry: CaptureGeometry) {
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", geometry.width as i32)
      .field("height", geometry.height as i32)
      .field("framerate", gst::Fraction::new(self.fps as i32, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    self.geometry = geometry;
    info!("显示尺寸: {}x{}", geometry.width, geometry.height);
  }

  fn push_frame(&mut self, data: Vec<u8>) -> Result<(), GStreamerDisplayError> {
    let period = 1_000_000_000 / self.fps as u64;
    let mut buffer = gst::Buffer::from_mut_slice(data);
    if let Some(buffer_ref) = buffer.get_mut() {
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * period));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(period));
    }
    self.frame_count += 1;

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| GStreamerDisplayError::PipelineError(format!("无法推送缓冲区: {:?}", e)))?;
    Ok(())
  }
}

impl Display for GStreamerDisplay {
  fn present(&mut self, frame: &OverlayFrame) -> Result<(), DisplayError> {
    let geometry = CaptureGeometry::of(&frame.composed);
    if geometry != self.geometry {
      self.renegotiate(geometry);
    }
    self.push_frame(frame.composed.as_raw().clone())?;
    Ok(())
  }
}
