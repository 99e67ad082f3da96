// 该文件是 Kanxiang （看相） 项目的一部分。
// src/bin/oneshot.rs - 单张图片预测
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

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use kanxiang::{
  FromUrl,
  overlay::{OverlayStyle, load_font},
  predict::{HttpPredictor, PredictionCell, PredictionState},
  status::StatusLine,
  upload::{UploadedImage, submit_upload},
};

/// 上传一张图片并打印预测结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预测服务地址
  #[arg(long, value_name = "URL", default_value = "http://localhost:8000/predict/")]
  pub endpoint: Url,
  /// 要上传的图片
  #[arg(long, value_name = "FILE")]
  pub upload: PathBuf,
  /// 保存标注后的预览
  #[arg(long, value_name = "FILE")]
  pub preview: Option<PathBuf>,
  /// 标签字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
  /// 请求超时（毫秒）
  #[arg(long, value_name = "MS")]
  pub timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("预测服务: {}", args.endpoint);
  info!("上传图片: {}", args.upload.display());

  let predictor = HttpPredictor::from_url(&args.endpoint)?
    .with_timeout(args.timeout_ms.map(Duration::from_millis));
  let upload = UploadedImage::open(&args.upload)?;
  let cell = PredictionCell::new();

  let now = std::time::Instant::now();
  submit_upload(Arc::new(predictor), &upload, cell.clone())
    .join()
    .map_err(|_| anyhow!("请求线程异常结束"))?;
  info!("预测完成，耗时: {:.2?}", now.elapsed());

  let state = cell.state();
  let status = StatusLine::from(&state);
  println!("{}", status.to_ansi());

  if let PredictionState::Showing(result) = &state
    && let Some(path) = &args.preview
  {
    let font = load_font(args.font.as_deref())?;
    match upload.annotated_preview(result, &OverlayStyle::default(), font.as_ref()) {
      Some(preview) => {
        preview.save(path)?;
        info!("预览已保存: {}", path.display());
      }
      None => warn!("图片无法解码，不保存预览"),
    }
  }

  if status.is_error() {
    return Err(anyhow!("{}", status));
  }
  Ok(())
}
