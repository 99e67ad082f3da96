// 该文件是 Kanxiang （看相） 项目的一部分。
// src/display/directory_record.rs - 按日期目录记录预测画面
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

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::info;
use url::Url;

use super::{Display, DisplayError};
use crate::{FromUrl, FromUrlWithScheme, overlay::OverlayFrame, url_file_path};

#[derive(Error, Debug)]
pub enum DirectoryRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每当预测状态更新就保存一帧，例如 `folder:///var/lib/kanxiang`
///
/// 文件布局为 `YYYY/MM/DD/HH-MM-SS-XXXX.png`，同名 `.txt` 记录状态行和框坐标。
/// 加上 `?always` 则每一帧都保存。
pub struct DirectoryRecordDisplay {
  directory: PathBuf,
  frame_counter: u16,
  last_version: u64,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordDisplay {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordDisplay {
  type Error = DirectoryRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let directory = PathBuf::from(url_file_path(uri));
    info!("记录目录: {}", directory.display());

    Ok(DirectoryRecordDisplay {
      directory,
      frame_counter: 0,
      last_version: 0,
      always,
    })
  }
}

impl DirectoryRecordDisplay {
  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, DirectoryRecordError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

fn record(frame: &OverlayFrame, path: &Path) -> Result<(), std::io::Error> {
  let mut lines = vec![frame.status.to_string()];
  if let Some(rect) = &frame.plan.rect {
    lines.push(format!(
      "{:.1}, {:.1}, {:.1}, {:.1}",
      rect.x, rect.y, rect.w, rect.h
    ));
  }
  std::fs::write(path.with_extension("txt"), lines.join("\n"))
}

impl Display for DirectoryRecordDisplay {
  fn present(&mut self, frame: &OverlayFrame) -> Result<(), DisplayError> {
    if !self.always && frame.version == self.last_version {
      return Ok(());
    }
    self.last_version = frame.version;

    let path = self.frame_path()?;
    frame
      .composed
      .save(&path)
      .map_err(DirectoryRecordError::from)?;
    record(frame, &path).map_err(DirectoryRecordError::from)?;
    info!("已记录预测画面: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::CaptureGeometry, geometry::BoundingBox, overlay::OverlayPlan, status::StatusLine,
  };
  use image::RgbImage;

  fn overlay_frame(version: u64, rect: Option<BoundingBox>, status: StatusLine) -> OverlayFrame {
    OverlayFrame {
      plan: OverlayPlan {
        surface: CaptureGeometry::new(8, 8),
        rect,
        label: None,
      },
      composed: RgbImage::new(8, 8),
      version,
      status,
    }
  }

  fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        found.extend(files_with_extension(&path, ext));
      } else if path.extension().is_some_and(|e| e == ext) {
        found.push(path);
      }
    }
    found
  }

  #[test]
  fn records_once_per_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let mut display = DirectoryRecordDisplay::from_url(&url).unwrap();

    display
      .present(&overlay_frame(0, None, StatusLine::Waiting))
      .unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    let label = StatusLine::Label("Male, 30-34".to_string());
    let rect = Some(BoundingBox::new(530.0, 20.0, 100.0, 150.0));
    display
      .present(&overlay_frame(1, rect, label.clone()))
      .unwrap();
    display
      .present(&overlay_frame(1, rect, label.clone()))
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);

    let records = files_with_extension(dir.path(), "txt");
    assert_eq!(records.len(), 1);
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert_eq!(text, "Male, 30-34\n530.0, 20.0, 100.0, 150.0");

    display
      .present(&overlay_frame(
        2,
        None,
        StatusLine::Error("No face detected".to_string()),
      ))
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 2);
  }

  #[test]
  fn always_records_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let mut display = DirectoryRecordDisplay::from_url(&url).unwrap();

    for _ in 0..3 {
      display
        .present(&overlay_frame(0, None, StatusLine::Waiting))
        .unwrap();
    }
    assert_eq!(files_with_extension(dir.path(), "png").len(), 3);
  }
}
