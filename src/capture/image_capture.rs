// 该文件是 Kanxiang （看相） 项目的一部分。
// src/capture/image_capture.rs - 静态图片模拟摄像头
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

use std::time::{Duration, Instant};

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use super::{CaptureError, FrameGrabber};
use crate::{FromUrl, FromUrlWithScheme, query_value, url_file_path};

const DEFAULT_FPS: u32 = 15;

/// 以固定帧率重复输出同一张图片，例如 `image:///tmp/face.jpg?fps=15`
pub struct StillImageGrabber {
  image: RgbImage,
  period: Duration,
  last_grab: Option<Instant>,
}

impl FromUrlWithScheme for StillImageGrabber {
  const SCHEME: &'static str = "image";
}

impl FromUrl for StillImageGrabber {
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
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();
    let fps = query_value::<u32>(url, "fps").unwrap_or(DEFAULT_FPS).max(1);
    info!(
      "静态图片采集源: {} ({}x{} @ {} fps)",
      path,
      image.width(),
      image.height(),
      fps
    );

    Ok(Self::new(image, fps))
  }
}

impl StillImageGrabber {
  pub fn new(image: RgbImage, fps: u32) -> Self {
    Self {
      image,
      period: Duration::from_secs(1) / fps.max(1),
      last_grab: None,
    }
  }
}

impl FrameGrabber for StillImageGrabber {
  fn grab(&mut self) -> Result<RgbImage, CaptureError> {
    if let Some(last) = self.last_grab {
      let elapsed = last.elapsed();
      if elapsed < self.period {
        std::thread::sleep(self.period - elapsed);
      }
    }
    self.last_grab = Some(Instant::now());
    Ok(self.image.clone())
  }
}
