// 该文件是 Kanxiang （看相） 项目的一部分。
// src/task.rs - 实时会话
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

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::AtomicBool,
    mpsc::{self, RecvTimeoutError},
  },
  thread,
  time::Duration,
};

use anyhow::Context;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl,
  capture::{CaptureSource, LiveFeed},
  display::{Display, DisplayWrapper},
  frame::DEFAULT_JPEG_QUALITY,
  overlay::{self, FrameClock, OverlayRenderer, RenderLoop},
  predict::{DEFAULT_ENDPOINT, HttpPredictor, PredictionCell, Predictor},
  sampler::{DEFAULT_INTERVAL, FrameSampler, SamplerHandle},
  status::StatusLine,
  upload::{UploadedImage, submit_upload, upload_paths},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
  pub endpoint: Url,
  pub capture: Url,
  pub displays: Vec<Url>,
  pub interval: Duration,
  pub fps: u32,
  pub jpeg_quality: u8,
  pub font: Option<PathBuf>,
  pub uploads: Vec<PathBuf>,
  pub preview: Option<PathBuf>,
  pub stdin: bool,
  pub timeout: Option<Duration>,
}

impl SessionConfig {
  pub fn new(endpoint: Url, capture: Url) -> Self {
    Self {
      endpoint,
      capture,
      displays: Vec::new(),
      interval: DEFAULT_INTERVAL,
      fps: overlay::DEFAULT_FPS,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      font: None,
      uploads: Vec::new(),
      preview: None,
      stdin: false,
      timeout: None,
    }
  }

  pub fn default_endpoint() -> Result<Url, url::ParseError> {
    Url::parse(DEFAULT_ENDPOINT)
  }
}

/// 上传一张图片；读不出的文件只记录警告，不影响预测状态
fn handle_upload(
  path: &Path,
  predictor: &Arc<dyn Predictor>,
  cell: &PredictionCell,
  preview: Option<&Path>,
) -> Option<thread::JoinHandle<()>> {
  let upload = match UploadedImage::open(path) {
    Ok(upload) => upload,
    Err(e) => {
      warn!("无法上传 {}: {}", path.display(), e);
      return None;
    }
  };
  if let Some(preview) = preview
    && let Err(e) = upload.save_preview(preview)
  {
    warn!("无法保存预览: {}", e);
  }
  Some(submit_upload(predictor.clone(), &upload, cell.clone()))
}

/// 运行中的实时会话
pub struct LiveSession {
  cell: PredictionCell,
  predictor: Arc<dyn Predictor>,
  capture: CaptureSource,
  sampler: SamplerHandle,
  render: RenderLoop,
  uploads: Vec<thread::JoinHandle<()>>,
}

impl LiveSession {
  pub fn start(config: SessionConfig) -> anyhow::Result<Self> {
    let predictor = HttpPredictor::from_url(&config.endpoint)?.with_timeout(config.timeout);
    Self::start_with(config, Arc::new(predictor))
  }

  pub fn start_with(config: SessionConfig, predictor: Arc<dyn Predictor>) -> anyhow::Result<Self> {
    info!("开始会话...");
    let cell = PredictionCell::new();

    // 只尝试一次，失败后退化为仅上传模式
    let capture = match CaptureSource::start(&config.capture) {
      Ok(capture) => capture,
      Err(e) => {
        warn!("摄像头不可用，仅支持上传: {}", e);
        CaptureSource::unavailable()
      }
    };
    let feed: LiveFeed = capture.feed().clone();

    let mut displays: Vec<Box<dyn Display>> = Vec::with_capacity(config.displays.len());
    for url in config.displays.iter() {
      let display =
        DisplayWrapper::from_url(url).with_context(|| format!("无法打开显示输出 {}", url))?;
      info!("显示输出: {}", url);
      displays.push(Box::new(display));
    }

    let font = overlay::load_font(config.font.as_deref())?;
    if font.is_none() {
      warn!("未找到系统字体，可用 --font 指定");
    }

    let renderer = OverlayRenderer::new(feed.clone(), cell.clone()).with_font(font);
    let render = RenderLoop::spawn(
      renderer,
      displays,
      FrameClock::with_fps(config.fps),
      Arc::new(AtomicBool::new(false)),
    )?;

    let sampler = FrameSampler::new(feed, predictor.clone(), cell.clone())
      .with_quality(config.jpeg_quality)
      .spawn(config.interval)?;

    let uploads = config
      .uploads
      .iter()
      .filter_map(|path| handle_upload(path, &predictor, &cell, config.preview.as_deref()))
      .collect();

    if config.stdin {
      let predictor = predictor.clone();
      let cell = cell.clone();
      let preview = config.preview.clone();
      // 阻塞在标准输入上，随进程退出
      thread::Builder::new()
        .name("stdin-upload".to_string())
        .spawn(move || {
          info!("从标准输入读取上传路径，每行一个");
          for path in upload_paths(std::io::stdin().lock()) {
            handle_upload(&path, &predictor, &cell, preview.as_deref());
          }
          info!("标准输入已关闭");
        })?;
    }

    Ok(Self {
      cell,
      predictor,
      capture,
      sampler,
      render,
      uploads,
    })
  }

  pub fn cell(&self) -> &PredictionCell {
    &self.cell
  }

  pub fn feed(&self) -> &LiveFeed {
    self.capture.feed()
  }

  pub fn rendered(&self) -> u64 {
    self.render.rendered()
  }

  /// 运行中追加一次上传
  pub fn upload(&mut self, path: &Path) {
    if let Some(handle) = handle_upload(path, &self.predictor, &self.cell, None) {
      self.uploads.push(handle);
    }
  }

  /// 等待 Ctrl-C 或渲染帧数达到上限后关闭
  pub fn run_until_interrupted(self, max_frames: Option<u64>) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理函数")?;

    self.run_until(rx, max_frames);
    Ok(())
  }

  /// 收到 `stop` 信号、发送端关闭或渲染帧数达到上限后关闭
  pub fn run_until(self, stop: mpsc::Receiver<()>, max_frames: Option<u64>) {
    loop {
      match stop.recv_timeout(POLL_INTERVAL) {
        Ok(()) => {
          warn!("中断信号接收，退出会话");
          break;
        }
        Err(RecvTimeoutError::Disconnected) => break,
        Err(RecvTimeoutError::Timeout) => {}
      }
      if let Some(n) = max_frames
        && self.render.rendered() >= n
      {
        info!("达到指定帧数 {}, 退出会话", n);
        break;
      }
    }
    self.shutdown();
  }

  /// 先停采样，再停渲染，最后释放摄像头；已发出的请求不等待
  pub fn shutdown(mut self) {
    self.sampler.cancel();
    self.render.stop();
    self.capture.stop();
    let pending = self.uploads.iter().filter(|h| !h.is_finished()).count();
    if pending > 0 {
      info!("仍有 {} 个上传请求未完成", pending);
    }
    info!("会话结束，最终状态: {}", StatusLine::from(&self.cell.state()));
  }
}
