// 该文件是 Kanxiang （看相） 项目的一部分。
// src/upload.rs - 手动上传图片
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

//! 上传路径不经过采样器，也不关心摄像头是否就绪，
//! 结果写入与实时采样相同的预测状态单元。

use std::{
  io::BufRead,
  path::{Path, PathBuf},
  sync::Arc,
  thread,
};

use ab_glyph::FontArc;
use image::{ImageFormat, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  frame::ImagePayload,
  geometry::LABEL_BASELINE_OFFSET,
  overlay::{OverlayStyle, draw},
  predict::{Origin, PredictionCell, PredictionResult, Predictor, spawn_prediction},
};

const FALLBACK_FILENAME: &str = "upload";

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("无法读取文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("不是图像文件: {0}")]
  NotAnImage(String),
  #[error("图像处理失败: {0}")]
  Image(#[from] image::ImageError),
  #[error("{0} 无法解码，没有预览")]
  NoPreview(String),
}

/// 用户选择的一张图片
#[derive(Debug, Clone)]
pub struct UploadedImage {
  format: ImageFormat,
  preview: Option<RgbImage>,
  payload: ImagePayload,
}

impl UploadedImage {
  pub fn open(path: &Path) -> Result<Self, UploadError> {
    let bytes = std::fs::read(path)?;
    let filename = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    Self::from_bytes(bytes, filename)
  }

  /// 按内容判断格式，扩展名不参与判断。
  ///
  /// 头部可识别但解码失败的文件仍会上传，由服务端给出结论，只是没有预览。
  pub fn from_bytes(bytes: Vec<u8>, filename: impl Into<String>) -> Result<Self, UploadError> {
    let filename = filename.into();
    let format =
      image::guess_format(&bytes).map_err(|_| UploadError::NotAnImage(filename.clone()))?;
    let preview = match image::load_from_memory_with_format(&bytes, format) {
      Ok(image) => Some(image.to_rgb8()),
      Err(e) => {
        warn!("无法解码 {} 的预览: {}", filename, e);
        None
      }
    };

    Ok(Self {
      format,
      preview,
      payload: ImagePayload {
        bytes,
        filename,
        mime: format.to_mime_type().to_string(),
      },
    })
  }

  pub fn format(&self) -> ImageFormat {
    self.format
  }

  pub fn preview(&self) -> Option<&RgbImage> {
    self.preview.as_ref()
  }

  pub fn payload(&self) -> &ImagePayload {
    &self.payload
  }

  pub fn save_preview(&self, path: &Path) -> Result<(), UploadError> {
    let preview = self
      .preview
      .as_ref()
      .ok_or_else(|| UploadError::NoPreview(self.payload.filename.clone()))?;
    preview.save(path)?;
    info!("预览已保存: {}", path.display());
    Ok(())
  }

  /// 在未镜像的预览上标出结果，没有预览时返回 `None`
  pub fn annotated_preview(
    &self,
    result: &PredictionResult,
    style: &OverlayStyle,
    font: Option<&FontArc>,
  ) -> Option<RgbImage> {
    let mut image = self.preview.clone()?;
    let Some(bbox) = result.bbox else {
      return Some(image);
    };

    let (width, height) = image.dimensions();
    let mut overlay = RgbaImage::new(width, height);
    draw::stroke_rect(&mut overlay, &bbox, style);
    if let Some(font) = font {
      draw::draw_label(
        &mut overlay,
        font,
        &result.label(),
        bbox.x,
        bbox.y - LABEL_BASELINE_OFFSET,
        style,
      );
    }
    draw::blend(&mut image, &overlay);
    Some(image)
  }
}

/// 以上传来源发起请求，与采集状态无关
pub fn submit_upload(
  predictor: Arc<dyn Predictor>,
  upload: &UploadedImage,
  cell: PredictionCell,
) -> thread::JoinHandle<()> {
  info!(
    "上传图片: {} ({}, {} 字节)",
    upload.payload.filename,
    upload.payload.mime,
    upload.payload.bytes.len()
  );
  spawn_prediction(predictor, upload.payload.clone(), cell, Origin::Upload)
}

/// 每行一个路径，忽略空行
pub fn upload_paths<R: BufRead>(reader: R) -> impl Iterator<Item = PathBuf> {
  reader
    .lines()
    .map_while(|line| match line {
      Ok(line) => Some(line),
      Err(e) => {
        warn!("读取上传路径失败: {}", e);
        None
      }
    })
    .filter_map(|line| {
      let trimmed = line.trim();
      (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    })
}
