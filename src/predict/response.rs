// 该文件是 Kanxiang （看相） 项目的一部分。
// src/predict/response.rs - 预测响应解析
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

use serde::Deserialize;

use super::{AgeRange, Gender, PredictFailure, PredictionResult};
use crate::geometry::BoundingBox;

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ResponseBody {
  Failure {
    error: String,
  },
  Success {
    #[serde(rename = "box", default)]
    bbox: Option<BoundingBox>,
    gender: String,
    age_range: String,
  },
}

/// 解析服务响应体
///
/// `{ "error": ... }` 解析为服务端错误，其余必须包含 `gender` 与 `age_range`。
pub fn parse_response(body: &[u8]) -> Result<PredictionResult, PredictFailure> {
  let parsed: ResponseBody =
    serde_json::from_slice(body).map_err(|e| PredictFailure::Malformed(e.to_string()))?;

  match parsed {
    ResponseBody::Failure { error } => Err(PredictFailure::Service(error)),
    ResponseBody::Success {
      bbox,
      gender,
      age_range,
    } => Ok(PredictionResult {
      bbox,
      gender: Gender::new(gender),
      age_range: AgeRange::new(age_range),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_face() {
    let body = br#"{"box":{"x":10,"y":20,"w":100,"h":150},"gender":"female","age_range":"25-32"}"#;
    let result = parse_response(body).unwrap();
    assert_eq!(result.bbox, Some(BoundingBox::new(10.0, 20.0, 100.0, 150.0)));
    assert_eq!(result.label(), "female, 25-32");
  }

  #[test]
  fn parses_service_error() {
    let body = br#"{"error":"no face detected"}"#;
    assert_eq!(
      parse_response(body),
      Err(PredictFailure::Service("no face detected".into()))
    );
  }

  #[test]
  fn missing_box_is_allowed() {
    let body = br#"{"gender":"Male","age_range":"95+"}"#;
    let result = parse_response(body).unwrap();
    assert!(result.bbox.is_none());
  }

  #[test]
  fn float_coordinates_are_accepted() {
    let body = br#"{"box":{"x":1.5,"y":2,"w":3.25,"h":4},"gender":"Male","age_range":"0-4"}"#;
    assert_eq!(
      parse_response(body).unwrap().bbox,
      Some(BoundingBox::new(1.5, 2.0, 3.25, 4.0))
    );
  }

  #[test]
  fn garbage_is_malformed() {
    assert!(matches!(
      parse_response(b"<html>502</html>"),
      Err(PredictFailure::Malformed(_))
    ));
    assert!(matches!(
      parse_response(br#"{"gender":"Male"}"#),
      Err(PredictFailure::Malformed(_))
    ));
  }
}
