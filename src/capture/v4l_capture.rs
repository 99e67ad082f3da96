// 该文件是 Kanxiang （看相） 项目的一部分。
// src/capture/v4l_capture.rs - V4L2 摄像头采集
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

use std::pin::Pin;

use image::RgbImage;
use tracing::{error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{CaptureError, FrameGrabber};
use crate::{FromUrl, FromUrlWithScheme, query_value, url_file_path};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

/// V4L2 摄像头，例如 `v4l:///dev/video0?width=640&height=480`
///
/// v4l 的 Stream 需要引用 Device，这里用 `Pin<Box<Device>>` 保证设备地址稳定。
pub struct V4lGrabber {
  /// 捕获流（生命周期与 device 关联，必须先于 device 释放）
  stream: Option<Stream<'static>>,
  device: Pin<Box<Device>>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4lGrabber {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lGrabber {
  type Error = CaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CaptureError::UnsupportedScheme(url.scheme().to_string()));
    }

    let path = url_file_path(url);
    let device_path = if path.is_empty() || path == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      path
    };
    let width = query_value(url, "width").unwrap_or(DEFAULT_WIDTH);
    let height = query_value(url, "height").unwrap_or(DEFAULT_HEIGHT);

    Self::open(&device_path, width, height)
  }
}

impl V4lGrabber {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CaptureError> {
    let device = Box::pin(Device::with_path(device_path).map_err(|e| {
      CaptureError::Device(format!("无法打开设备 {}: {}", device_path, e))
    })?);

    // 只请求视频，不涉及音频
    let mut format = device
      .format()
      .map_err(|e| CaptureError::Device(e.to_string()))?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(|e| CaptureError::Device(e.to_string()))?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(CaptureError::Device(format!(
        "设备不支持 YUYV 格式，实际为 {}",
        format.fourcc
      )));
    }

    let mut grabber = Self {
      stream: None,
      device,
      width: format.width,
      height: format.height,
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动；
    // stream 在 Drop 中先于 device 释放
    let device_ref: &Device = &grabber.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, STREAM_BUFFERS)
        .map_err(|e| CaptureError::Device(format!("无法创建捕获流: {}", e)))?
    };
    grabber.stream = Some(stream);

    info!(
      "V4L2 设备已打开: {} ({}x{})",
      device_path, grabber.width, grabber.height
    );
    Ok(grabber)
  }
}

impl Drop for V4lGrabber {
  fn drop(&mut self) {
    self.stream.take();
  }
}

impl FrameGrabber for V4lGrabber {
  fn grab(&mut self) -> Result<RgbImage, CaptureError> {
    let stream = self
      .stream
      .as_mut()
      .ok_or_else(|| CaptureError::Device("捕获流已关闭".to_string()))?;

    let (buffer, _meta) = stream
      .next()
      .map_err(|e| CaptureError::Frame(format!("无法捕获帧: {}", e)))?;

    let rgb = yuyv_to_rgb(buffer, self.width, self.height);
    RgbImage::from_raw(self.width, self.height, rgb)
      .ok_or_else(|| CaptureError::Frame("缓冲区大小与帧尺寸不符".to_string()))
  }
}

/// 将 YUYV (YUV 4:2:2) 转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let pixels = (width * height) as usize;
  let mut rgb = Vec::with_capacity(pixels * 3);

  for chunk in yuyv.chunks_exact(4) {
    if rgb.len() >= pixels * 3 {
      break;
    }
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;

    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}
