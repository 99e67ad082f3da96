// 该文件是 Kanxiang （看相） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod capture;
pub mod display;
pub mod frame;
pub mod geometry;
pub mod overlay;
pub mod predict;
pub mod sampler;
pub mod status;
pub mod task;
pub mod upload;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 路径部分解码为本地文件路径
pub(crate) fn url_file_path(url: &url::Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}

/// 从 URL 查询参数中读取并解析一个值
pub(crate) fn query_value<T: std::str::FromStr>(url: &url::Url, key: &str) -> Option<T> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn file_path_is_percent_decoded() {
    let url = Url::parse("image:///tmp/my%20frames/out.png").unwrap();
    assert_eq!(url_file_path(&url), "/tmp/my frames/out.png");
  }

  #[test]
  fn query_value_parses_or_ignores() {
    let url = Url::parse("image:///tmp/a.jpg?fps=12&width=abc").unwrap();
    assert_eq!(query_value::<u32>(&url, "fps"), Some(12));
    assert_eq!(query_value::<u32>(&url, "width"), None);
    assert_eq!(query_value::<u32>(&url, "height"), None);
  }
}
