// 该文件是 Kanxiang （看相） 项目的一部分。
// src/predict.rs - 预测结果与预测客户端
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

use std::{fmt, sync::Arc, thread};

use thiserror::Error;
use tracing::{debug, error};

use crate::{frame::ImagePayload, geometry::BoundingBox};

mod client;
mod multipart;
mod response;
mod state;

pub use self::client::{DEFAULT_ENDPOINT, HttpPredictor, HttpPredictorError};
pub use self::multipart::MultipartBody;
pub use self::response::parse_response;
pub use self::state::{PredictionCell, PredictionState};

/// 采样路径上对用户显示的通用失败信息
pub const CAPTURE_FAILURE_MESSAGE: &str = "Prediction failed.";
/// 上传路径上对用户显示的失败信息前缀，后接具体错误
pub const UPLOAD_FAILURE_MESSAGE: &str = "Prediction failed. Please try again.";

pub trait Predictor: Send + Sync {
  fn submit(&self, payload: &ImagePayload) -> Result<PredictionResult, PredictFailure>;
}

/// 性别分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderKind {
  Male,
  Female,
  Unrecognised,
}

/// 服务返回的性别标签，显示时保持原文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gender {
  label: String,
}

impl Gender {
  pub fn new(label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
    }
  }

  pub fn kind(&self) -> GenderKind {
    match self.label.trim().to_ascii_lowercase().as_str() {
      "male" => GenderKind::Male,
      "female" => GenderKind::Female,
      _ => GenderKind::Unrecognised,
    }
  }

  pub fn as_str(&self) -> &str {
    &self.label
  }
}

impl fmt::Display for Gender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label)
  }
}

/// 年龄段标签，例如 "25-29" 或 "95+"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeRange {
  label: String,
}

impl AgeRange {
  pub fn new(label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
    }
  }

  /// 解析上下界；上界为 `None` 表示开区间（"95+"）
  pub fn bounds(&self) -> Option<(u32, Option<u32>)> {
    let label = self.label.trim();
    if let Some(lower) = label.strip_suffix('+') {
      return lower.trim().parse().ok().map(|lo| (lo, None));
    }
    let (lo, hi) = label.split_once('-')?;
    let lo: u32 = lo.trim().parse().ok()?;
    let hi: u32 = hi.trim().parse().ok()?;
    (lo <= hi).then_some((lo, Some(hi)))
  }

  pub fn as_str(&self) -> &str {
    &self.label
  }
}

impl fmt::Display for AgeRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label)
  }
}

/// 一次成功的预测，构造后不可变，只会被整体替换
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
  pub bbox: Option<BoundingBox>,
  pub gender: Gender,
  pub age_range: AgeRange,
}

impl PredictionResult {
  pub fn label(&self) -> String {
    format!("{}, {}", self.gender, self.age_range)
  }
}

/// 预测客户端的失败类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictFailure {
  #[error("{0}")]
  Service(String),
  #[error("HTTP 状态码 {0}")]
  Status(u16),
  #[error("网络错误: {0}")]
  Transport(String),
  #[error("响应格式错误: {0}")]
  Malformed(String),
}

/// 请求来源，决定失败信息的呈现方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  Capture,
  Upload,
}

/// 对用户显示的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionError {
  message: String,
}

impl PredictionError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// 服务端错误原样显示；传输类错误在采样路径只显示通用信息并记录诊断日志，
  /// 在上传路径附带错误详情
  pub fn from_failure(failure: &PredictFailure, origin: Origin) -> Self {
    match (failure, origin) {
      (PredictFailure::Service(message), _) => Self::new(message.clone()),
      (other, Origin::Capture) => {
        error!("Prediction error: {}", other);
        Self::new(CAPTURE_FAILURE_MESSAGE)
      }
      (other, Origin::Upload) => Self::new(format!("{}{}", UPLOAD_FAILURE_MESSAGE, other)),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl fmt::Display for PredictionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

/// 将一次请求的结果写入状态单元
pub fn apply_outcome(
  cell: &PredictionCell,
  outcome: Result<PredictionResult, PredictFailure>,
  origin: Origin,
) {
  match outcome {
    Ok(result) => cell.set_result(result),
    Err(failure) => cell.set_error(PredictionError::from_failure(&failure, origin)),
  }
}

/// 在独立线程上发起请求，完成后写入状态单元
///
/// 不取消、不排序：多个请求并发时以最后完成者为准。
pub fn spawn_prediction(
  predictor: Arc<dyn Predictor>,
  payload: ImagePayload,
  cell: PredictionCell,
  origin: Origin,
) -> thread::JoinHandle<()> {
  thread::spawn(move || {
    debug!(
      "发送预测请求: {} ({} 字节, {:?})",
      payload.filename,
      payload.bytes.len(),
      origin
    );
    let now = std::time::Instant::now();
    let outcome = predictor.submit(&payload);
    debug!("预测请求完成，耗时: {:.2?}", now.elapsed());
    apply_outcome(&cell, outcome, origin);
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_joins_gender_and_age() {
    let result = PredictionResult {
      bbox: None,
      gender: Gender::new("female"),
      age_range: AgeRange::new("25-32"),
    };
    assert_eq!(result.label(), "female, 25-32");
  }

  #[test]
  fn gender_kind_ignores_case() {
    assert_eq!(Gender::new("Male").kind(), GenderKind::Male);
    assert_eq!(Gender::new("female").kind(), GenderKind::Female);
    assert_eq!(Gender::new("robot").kind(), GenderKind::Unrecognised);
    assert_eq!(Gender::new("Female").to_string(), "Female");
  }

  #[test]
  fn age_range_bounds() {
    assert_eq!(AgeRange::new("25-29").bounds(), Some((25, Some(29))));
    assert_eq!(AgeRange::new("95+").bounds(), Some((95, None)));
    assert_eq!(AgeRange::new("adult").bounds(), None);
    assert_eq!(AgeRange::new("30-20").bounds(), None);
  }

  #[test]
  fn service_errors_are_shown_verbatim() {
    let failure = PredictFailure::Service("No face detected".into());
    for origin in [Origin::Capture, Origin::Upload] {
      assert_eq!(
        PredictionError::from_failure(&failure, origin).message(),
        "No face detected"
      );
    }
  }

  #[test]
  fn transport_errors_differ_by_origin() {
    let failure = PredictFailure::Status(500);
    assert_eq!(
      PredictionError::from_failure(&failure, Origin::Capture).message(),
      "Prediction failed."
    );
    let upload = PredictionError::from_failure(&failure, Origin::Upload);
    assert!(upload.message().starts_with("Prediction failed. Please try again."));
    assert!(upload.message().ends_with(&failure.to_string()));
  }

  #[test]
  fn outcome_replaces_state() {
    let cell = PredictionCell::new();
    apply_outcome(
      &cell,
      Err(PredictFailure::Service("no face detected".into())),
      Origin::Capture,
    );
    assert!(matches!(cell.state(), PredictionState::Failing(e) if e.message() == "no face detected"));
  }
}
