// 该文件是 Kanxiang （看相） 项目的一部分。
// src/display.rs - 显示输出
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, overlay::OverlayFrame};

#[cfg(any(
  feature = "save_image_file",
  feature = "directory_record",
  feature = "gstreamer_output"
))]
use crate::FromUrlWithScheme;

/// 接收合成后画面的显示端
pub trait Display: Send {
  fn present(&mut self, frame: &OverlayFrame) -> Result<(), DisplayError>;
}

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileDisplay, SaveImageFileError};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordDisplay, DirectoryRecordError};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError};

#[derive(Error, Debug)]
pub enum DisplayError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFile(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录错误: {0}")]
  DirectoryRecord(#[from] DirectoryRecordError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 显示错误: {0}")]
  GStreamer(#[from] GStreamerDisplayError),
  #[error("不支持的显示方式: {0}")]
  SchemeMismatch(String),
}

pub enum DisplayWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFile(SaveImageFileDisplay),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordDisplay),
  #[cfg(feature = "gstreamer_output")]
  GStreamer(GStreamerDisplay),
}

impl FromUrl for DisplayWrapper {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileDisplay::SCHEME => Ok(DisplayWrapper::SaveImageFile(
        SaveImageFileDisplay::from_url(url)?,
      )),
      #[cfg(feature = "directory_record")]
      DirectoryRecordDisplay::SCHEME => Ok(DisplayWrapper::DirectoryRecord(
        DirectoryRecordDisplay::from_url(url)?,
      )),
      #[cfg(feature = "gstreamer_output")]
      GStreamerDisplay::SCHEME => Ok(DisplayWrapper::GStreamer(GStreamerDisplay::from_url(
        url,
      )?)),
      other => Err(DisplayError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Display for DisplayWrapper {
  fn present(&mut self, frame: &OverlayFrame) -> Result<(), DisplayError> {
    match self {
      #[cfg(feature = "save_image_file")]
      DisplayWrapper::SaveImageFile(display) => display.present(frame),
      #[cfg(feature = "directory_record")]
      DisplayWrapper::DirectoryRecord(display) => display.present(frame),
      #[cfg(feature = "gstreamer_output")]
      DisplayWrapper::GStreamer(display) => display.present(frame),
      #[allow(unreachable_patterns)]
      _ => Ok(()),
    }
  }
}
