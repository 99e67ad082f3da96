// 该文件是 Kanxiang （看相） 项目的一部分。
// src/display/save_image_file.rs - 保存画面到图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{Display, DisplayError};
use crate::{FromUrl, FromUrlWithScheme, overlay::OverlayFrame, query_value, url_file_path};

/// 默认每 30 帧（约 1 秒）覆盖一次
const DEFAULT_EVERY: u64 = 30;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 定期覆盖写入同一个图像文件，例如 `image:///tmp/kanxiang.png?every=15`
pub struct SaveImageFileDisplay {
  path: PathBuf,
  every: u64,
  ticks: u64,
}

impl FromUrlWithScheme for SaveImageFileDisplay {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileDisplay {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileDisplay {
      path: PathBuf::from(url_file_path(uri)),
      every: query_value(uri, "every").unwrap_or(DEFAULT_EVERY).max(1),
      ticks: 0,
    })
  }
}

impl SaveImageFileDisplay {
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    debug!("保存画面到文件: {}", self.path.display());
    Ok(())
  }
}

impl Display for SaveImageFileDisplay {
  fn present(&mut self, frame: &OverlayFrame) -> Result<(), DisplayError> {
    let tick = self.ticks;
    self.ticks += 1;
    if tick % self.every != 0 {
      return Ok(());
    }
    self.save_image(&frame.composed)?;
    Ok(())
  }
}
