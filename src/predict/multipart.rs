// 该文件是 Kanxiang （看相） 项目的一部分。
// src/predict/multipart.rs - multipart/form-data 请求体
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

use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::ImagePayload;

/// 表单中图像字段的名称
pub const FILE_FIELD: &str = "file";

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 只含一个文件字段的 multipart/form-data 请求体
pub struct MultipartBody {
  boundary: String,
  body: Vec<u8>,
}

impl MultipartBody {
  pub fn with_file(field: &str, payload: &ImagePayload) -> Self {
    let boundary = Self::new_boundary();
    let mut body = Vec::with_capacity(payload.bytes.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
      format!(
        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
        field,
        escape_quoted(&payload.filename)
      )
      .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", payload.mime).as_bytes());
    body.extend_from_slice(&payload.bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Self { boundary, body }
  }

  fn new_boundary() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("----kanxiang{:016x}{:04x}", nanos, seq & 0xFFFF)
  }

  pub fn content_type(&self) -> String {
    format!("multipart/form-data; boundary={}", self.boundary)
  }

  pub fn boundary(&self) -> &str {
    &self.boundary
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.body
  }
}

fn escape_quoted(value: &str) -> String {
  value
    .replace('\\', "\\\\")
    .replace('"', "\\\"")
    .replace(['\r', '\n'], " ")
}
