// 该文件是 Kanxiang （看相） 项目的一部分。
// src/status.rs - 预测状态文字
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

use std::fmt;

use crate::predict::PredictionState;

pub const WAITING_MESSAGE: &str = "Waiting for prediction...";

const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// 任意时刻只显示三者之一：等待提示、结果标签、红色错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
  Waiting,
  Label(String),
  Error(String),
}

impl From<&PredictionState> for StatusLine {
  fn from(state: &PredictionState) -> Self {
    match state {
      PredictionState::Idle => StatusLine::Waiting,
      PredictionState::Showing(result) => StatusLine::Label(result.label()),
      PredictionState::Failing(error) => StatusLine::Error(error.message().to_string()),
    }
  }
}

impl StatusLine {
  pub fn is_error(&self) -> bool {
    matches!(self, StatusLine::Error(_))
  }

  /// 终端输出，错误为红色
  pub fn to_ansi(&self) -> String {
    match self {
      StatusLine::Error(message) => format!("{}{}{}", ANSI_RED, message, ANSI_RESET),
      other => other.to_string(),
    }
  }
}

impl fmt::Display for StatusLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StatusLine::Waiting => f.write_str(WAITING_MESSAGE),
      StatusLine::Label(label) => f.write_str(label),
      StatusLine::Error(message) => f.write_str(message),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::predict::{AgeRange, Gender, PredictionError, PredictionResult};
  use std::sync::Arc;

  #[test]
  fn one_line_per_state() {
    assert_eq!(StatusLine::from(&PredictionState::Idle).to_string(), WAITING_MESSAGE);

    let shown = PredictionState::Showing(Arc::new(PredictionResult {
      bbox: None,
      gender: Gender::new("female"),
      age_range: AgeRange::new("25-32"),
    }));
    assert_eq!(
      StatusLine::from(&shown),
      StatusLine::Label("female, 25-32".into())
    );

    let failing = PredictionState::Failing(PredictionError::new("no face detected"));
    let line = StatusLine::from(&failing);
    assert!(line.is_error());
    assert_eq!(line.to_ansi(), "\x1b[31mno face detected\x1b[0m");
  }
}
