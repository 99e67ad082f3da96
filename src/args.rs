// 该文件是 Kanxiang （看相） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use kanxiang::{capture::DEFAULT_CAPTURE, task::SessionConfig};

/// Kanxiang 实时年龄与性别预测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预测服务地址
  #[arg(long, value_name = "URL", default_value = "http://localhost:8000/predict/")]
  pub endpoint: Url,

  /// 采集来源
  /// - v4l:///dev/video0?width=640&height=480
  /// - gst://camera/dev/video0?fps=30
  /// - image:///path/to/face.jpg?fps=15
  #[arg(long, value_name = "SOURCE", default_value = DEFAULT_CAPTURE)]
  pub capture: Url,

  /// 显示输出，可重复
  /// - image:///tmp/live.png?every=30
  /// - folder:///var/lib/kanxiang
  /// - gst://autovideosink
  #[arg(long, value_name = "OUTPUT")]
  pub display: Vec<Url>,

  /// 采样间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = 2000)]
  pub interval_ms: u64,

  /// 渲染帧率
  #[arg(long, value_name = "FPS", default_value_t = 30)]
  pub fps: u32,

  /// 采样帧的 JPEG 质量 (1 - 100)
  #[arg(long, value_name = "QUALITY", default_value_t = 90,
        value_parser = clap::value_parser!(u8).range(1..=100))]
  pub jpeg_quality: u8,

  /// 标签字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 启动时上传的图片，可重复
  #[arg(long, value_name = "FILE")]
  pub upload: Vec<PathBuf>,

  /// 上传图片的预览保存位置
  #[arg(long, value_name = "FILE")]
  pub preview: Option<PathBuf>,

  /// 从标准输入逐行读取要上传的图片路径
  #[arg(long)]
  pub stdin: bool,

  /// 请求超时（毫秒），默认不限
  #[arg(long, value_name = "MS")]
  pub timeout_ms: Option<u64>,

  /// 渲染指定帧数后退出
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<u64>,
}

impl Args {
  pub fn session_config(&self) -> SessionConfig {
    let mut config = SessionConfig::new(self.endpoint.clone(), self.capture.clone());
    config.displays = self.display.clone();
    config.interval = Duration::from_millis(self.interval_ms.max(1));
    config.fps = self.fps;
    config.jpeg_quality = self.jpeg_quality;
    config.font = self.font.clone();
    config.uploads = self.upload.clone();
    config.preview = self.preview.clone();
    config.stdin = self.stdin;
    config.timeout = self.timeout_ms.map(Duration::from_millis);
    config
  }
}
