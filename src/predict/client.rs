// 该文件是 Kanxiang （看相） 项目的一部分。
// src/predict/client.rs - HTTP 预测客户端
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

use std::{io::Read, time::Duration};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use super::{
  PredictFailure, PredictionResult, Predictor,
  multipart::{FILE_FIELD, MultipartBody},
  parse_response,
};
use crate::{FromUrl, frame::ImagePayload};

/// 默认预测服务地址
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/predict/";

const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum HttpPredictorError {
  #[error("URI 方案不匹配: 期望 http 或 https, 实际 '{0}'")]
  SchemeMismatch(String),
}

/// 通过 `POST <endpoint>` 上传图像的预测客户端
///
/// 不重试，默认不设超时；挂起的请求只是永远不会更新状态。
pub struct HttpPredictor {
  endpoint: Url,
  agent: ureq::Agent,
}

impl FromUrl for HttpPredictor {
  type Error = HttpPredictorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => {
        info!("预测服务地址: {}", url);
        Ok(Self {
          endpoint: url.clone(),
          agent: ureq::Agent::new(),
        })
      }
      other => {
        error!("URI scheme mismatch: expected 'http' or 'https', found '{}'", other);
        Err(HttpPredictorError::SchemeMismatch(other.to_string()))
      }
    }
  }
}

impl HttpPredictor {
  /// 整个请求的超时时间，`None` 表示不限
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    if let Some(timeout) = timeout {
      self.agent = ureq::AgentBuilder::new().timeout(timeout).build();
    }
    self
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

impl Predictor for HttpPredictor {
  fn submit(&self, payload: &ImagePayload) -> Result<PredictionResult, PredictFailure> {
    let body = MultipartBody::with_file(FILE_FIELD, payload);

    let response = self
      .agent
      .post(self.endpoint.as_str())
      .set("Content-Type", &body.content_type())
      .send_bytes(body.as_bytes())
      .map_err(|e| match e {
        ureq::Error::Status(code, _) => PredictFailure::Status(code),
        ureq::Error::Transport(transport) => PredictFailure::Transport(transport.to_string()),
      })?;

    debug!("预测服务响应: {} {}", response.status(), response.status_text());

    let mut bytes = Vec::new();
    response
      .into_reader()
      .take(MAX_RESPONSE_BYTES)
      .read_to_end(&mut bytes)
      .map_err(|e| PredictFailure::Transport(e.to_string()))?;

    parse_response(&bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_http_schemes_are_accepted() {
    let url = Url::parse(DEFAULT_ENDPOINT).unwrap();
    assert_eq!(HttpPredictor::from_url(&url).unwrap().endpoint(), &url);

    let url = Url::parse("ftp://localhost/predict/").unwrap();
    assert!(matches!(
      HttpPredictor::from_url(&url),
      Err(HttpPredictorError::SchemeMismatch(s)) if s == "ftp"
    ));
  }
}
