// 该文件是 Kanxiang （看相） 项目的一部分。
// src/overlay.rs - 叠加层渲染
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

//! # 叠加层
//!
//! 每个渲染周期读取最新画面与预测状态，在透明的 RGBA 表面上绘制镜像后的
//! 人脸框和标签，再合成到水平翻转的视频帧上交给各个显示端。

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  thread,
};

use ab_glyph::FontArc;
use image::{RgbImage, RgbaImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  capture::LiveFeed,
  display::Display,
  frame::CaptureGeometry,
  geometry::{self, BoundingBox, LabelAnchor},
  predict::{PredictionCell, PredictionState},
  status::StatusLine,
};

mod clock;
pub mod draw;

pub use self::clock::{DEFAULT_FPS, FrameClock};
pub use self::draw::{FontError, OverlayStyle, load_font};

/// 跳过本次渲染的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSkip {
  #[error("采集画面尚未就绪")]
  CaptureNotReady,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
  pub text: String,
  pub anchor: LabelAnchor,
}

/// 一帧叠加层的绘制计划，全部来自同一个预测结果
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlan {
  pub surface: CaptureGeometry,
  /// 屏幕坐标下的矩形
  pub rect: Option<BoundingBox>,
  pub label: Option<LabelPlacement>,
}

impl OverlayPlan {
  pub fn is_blank(&self) -> bool {
    self.rect.is_none() && self.label.is_none()
  }
}

pub fn plan_overlay(state: &PredictionState, surface: CaptureGeometry) -> OverlayPlan {
  let width = surface.width as f32;
  let placed = state
    .result()
    .and_then(|result| result.bbox.map(|bbox| (result, bbox)));

  match placed {
    Some((result, bbox)) => OverlayPlan {
      surface,
      rect: Some(geometry::mirror(&bbox, width)),
      label: Some(LabelPlacement {
        text: result.label(),
        anchor: geometry::label_anchor(&bbox, width),
      }),
    },
    None => OverlayPlan {
      surface,
      rect: None,
      label: None,
    },
  }
}

/// 一次渲染的产物
#[derive(Debug, Clone)]
pub struct OverlayFrame {
  pub plan: OverlayPlan,
  /// 已翻转并叠加后的画面
  pub composed: RgbImage,
  /// 绘制时使用的预测状态版本
  pub version: u64,
  pub status: StatusLine,
}

pub struct OverlayRenderer {
  feed: LiveFeed,
  cell: PredictionCell,
  style: OverlayStyle,
  font: Option<FontArc>,
  surface: RgbaImage,
  font_warned: bool,
}

impl OverlayRenderer {
  pub fn new(feed: LiveFeed, cell: PredictionCell) -> Self {
    Self {
      feed,
      cell,
      style: OverlayStyle::default(),
      font: None,
      surface: RgbaImage::new(0, 0),
      font_warned: false,
    }
  }

  pub fn with_font(mut self, font: Option<FontArc>) -> Self {
    self.font = font;
    self
  }

  pub fn with_style(mut self, style: OverlayStyle) -> Self {
    self.style = style;
    self
  }

  pub fn surface(&self) -> &RgbaImage {
    &self.surface
  }

  /// 当前状态行，与画面是否就绪无关
  pub fn status(&self) -> StatusLine {
    StatusLine::from(&self.cell.state())
  }

  pub fn tick(&mut self) -> Result<OverlayFrame, RenderSkip> {
    let frame = self.feed.latest().ok_or(RenderSkip::CaptureNotReady)?;
    let geometry = CaptureGeometry::of(&frame);
    if !geometry.is_ready() {
      return Err(RenderSkip::CaptureNotReady);
    }

    if self.surface.dimensions() != (geometry.width, geometry.height) {
      debug!("叠加层尺寸调整为 {}x{}", geometry.width, geometry.height);
      self.surface = RgbaImage::new(geometry.width, geometry.height);
    } else {
      draw::clear(&mut self.surface);
    }

    // 只读一次，框和标签出自同一个结果
    let (version, state) = self.cell.snapshot();
    let plan = plan_overlay(&state, geometry);

    if let Some(rect) = &plan.rect {
      draw::stroke_rect(&mut self.surface, rect, &self.style);
    }
    if let Some(label) = &plan.label {
      match &self.font {
        Some(font) => draw::draw_label(
          &mut self.surface,
          font,
          &label.text,
          label.anchor.x,
          label.anchor.y,
          &self.style,
        ),
        None if !self.font_warned => {
          warn!("没有可用字体，标签只显示在状态行");
          self.font_warned = true;
        }
        None => {}
      }
    }

    let composed = draw::composite(&frame, &self.surface);
    Ok(OverlayFrame {
      plan,
      composed,
      version,
      status: StatusLine::from(&state),
    })
  }
}

/// 渲染线程
pub struct RenderLoop {
  stop: Arc<AtomicBool>,
  rendered: Arc<AtomicU64>,
  handle: Option<thread::JoinHandle<()>>,
}

impl RenderLoop {
  pub fn spawn(
    mut renderer: OverlayRenderer,
    mut displays: Vec<Box<dyn Display>>,
    mut clock: FrameClock,
    stop: Arc<AtomicBool>,
  ) -> std::io::Result<Self> {
    let rendered = Arc::new(AtomicU64::new(0));

    let handle = {
      let stop = stop.clone();
      let rendered = rendered.clone();
      thread::Builder::new()
        .name("render".to_string())
        .spawn(move || {
          info!("渲染循环启动，周期 {:?}", clock.period());
          let mut last_status: Option<StatusLine> = None;
          let mut last_skip: Option<RenderSkip> = None;

          while !stop.load(Ordering::SeqCst) {
            let status = renderer.status();
            if last_status.as_ref() != Some(&status) {
              println!("{}", status.to_ansi());
              info!("状态: {}", status);
              last_status = Some(status);
            }

            match renderer.tick() {
              Ok(frame) => {
                last_skip = None;
                for display in displays.iter_mut() {
                  if let Err(e) = display.present(&frame) {
                    warn!("显示输出失败: {}", e);
                  }
                }
                rendered.fetch_add(1, Ordering::SeqCst);
              }
              Err(skip) => {
                if last_skip != Some(skip) {
                  debug!("跳过渲染: {}", skip);
                  last_skip = Some(skip);
                }
              }
            }

            clock.wait_next();
          }
          info!(
            "渲染循环停止，共渲染 {} 帧",
            rendered.load(Ordering::SeqCst)
          );
        })?
    };

    Ok(Self {
      stop,
      rendered,
      handle: Some(handle),
    })
  }

  pub fn rendered(&self) -> u64 {
    self.rendered.load(Ordering::SeqCst)
  }

  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }

  pub fn stop(&mut self) {
    self.stop.store(true, Ordering::SeqCst);
    if let Some(handle) = self.handle.take()
      && handle.join().is_err()
    {
      warn!("渲染线程异常结束");
    }
  }
}

impl Drop for RenderLoop {
  fn drop(&mut self) {
    self.stop();
  }
}
