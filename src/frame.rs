// 该文件是 Kanxiang （看相） 项目的一部分。
// src/frame.rs - 帧快照与图像载荷定义
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

use image::{ExtendedColorType, ImageEncoder, RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;

/// 采样帧的默认文件名
pub const FRAME_FILENAME: &str = "frame.jpg";
pub const JPEG_MIME: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// 视频源当前的固有尺寸
///
/// 每次渲染都会重新读取，尺寸为 0 表示视频源尚未就绪。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureGeometry {
  pub width: u32,
  pub height: u32,
}

impl CaptureGeometry {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn of(image: &RgbImage) -> Self {
    Self::new(image.width(), image.height())
  }

  pub fn is_ready(&self) -> bool {
    self.width > 0 && self.height > 0
  }
}

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("帧尺寸为零，无法编码")]
  EmptyFrame,
  #[error("JPEG 编码错误: {0}")]
  Jpeg(#[from] image::ImageError),
}

/// 一次请求期间存在的编码帧
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
  pub jpeg: Vec<u8>,
  pub geometry: CaptureGeometry,
}

impl FrameSnapshot {
  pub fn encode(frame: &RgbImage, quality: u8) -> Result<Self, EncodeError> {
    let geometry = CaptureGeometry::of(frame);
    if !geometry.is_ready() {
      return Err(EncodeError::EmptyFrame);
    }

    let mut jpeg = Vec::with_capacity((geometry.width * geometry.height / 4) as usize);
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).write_image(
      frame.as_raw(),
      geometry.width,
      geometry.height,
      ExtendedColorType::Rgb8,
    )?;

    Ok(Self { jpeg, geometry })
  }

  pub fn into_payload(self) -> ImagePayload {
    ImagePayload {
      bytes: self.jpeg,
      filename: FRAME_FILENAME.to_string(),
      mime: JPEG_MIME.to_string(),
    }
  }
}

/// 发送给预测服务的图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
  pub bytes: Vec<u8>,
  pub filename: String,
  pub mime: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn encodes_jpeg_with_source_geometry() {
    let frame = RgbImage::from_pixel(32, 24, Rgb([200, 10, 10]));
    let snapshot = FrameSnapshot::encode(&frame, 80).unwrap();
    assert_eq!(snapshot.geometry, CaptureGeometry::new(32, 24));
    assert_eq!(&snapshot.jpeg[..2], &[0xFF, 0xD8]);

    let payload = snapshot.into_payload();
    assert_eq!(payload.filename, "frame.jpg");
    assert_eq!(payload.mime, "image/jpeg");
    assert_eq!(
      image::guess_format(&payload.bytes).unwrap(),
      image::ImageFormat::Jpeg
    );
  }

  #[test]
  fn empty_frame_is_rejected() {
    let frame = RgbImage::new(0, 0);
    assert!(matches!(
      FrameSnapshot::encode(&frame, 80),
      Err(EncodeError::EmptyFrame)
    ));
    assert!(!CaptureGeometry::default().is_ready());
  }
}
