// 该文件是 Kanxiang （看相） 项目的一部分。
// src/overlay/draw.rs - 叠加层绘制
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

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage, Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::info;

use crate::geometry::BoundingBox;

// 绘制常量
const BOX_COLOR: [u8; 4] = [255, 255, 0, 255]; // 黄色
const BOX_LINE_WIDTH: u32 = 2;
const LABEL_COLOR: [u8; 4] = [0, 255, 0, 255]; // 绿色
const LABEL_FONT_SIZE: f32 = 16.0;

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {}: {}", .path.display(), .source)]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("无效的字体文件 {}", .path.display())]
  Invalid { path: PathBuf },
}

/// 加载标签字体；显式指定的路径失败时报错，系统字体都不存在时返回 `None`
pub fn load_font(path: Option<&Path>) -> Result<Option<FontArc>, FontError> {
  if let Some(path) = path {
    return read_font(path).map(Some);
  }

  for candidate in SYSTEM_FONTS.iter().map(Path::new) {
    if candidate.exists()
      && let Ok(font) = read_font(candidate)
    {
      info!("使用系统字体: {}", candidate.display());
      return Ok(Some(font));
    }
  }
  Ok(None)
}

fn read_font(path: &Path) -> Result<FontArc, FontError> {
  let data = std::fs::read(path).map_err(|source| FontError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  FontArc::try_from_vec(data).map_err(|_| FontError::Invalid {
    path: path.to_path_buf(),
  })
}

/// 叠加层样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
  pub box_color: Rgba<u8>,
  pub box_line_width: u32,
  pub label_color: Rgba<u8>,
  pub label_font_size: f32,
}

impl Default for OverlayStyle {
  fn default() -> Self {
    Self {
      box_color: Rgba(BOX_COLOR),
      box_line_width: BOX_LINE_WIDTH,
      label_color: Rgba(LABEL_COLOR),
      label_font_size: LABEL_FONT_SIZE,
    }
  }
}

/// 清空为全透明
pub fn clear(surface: &mut RgbaImage) {
  surface.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
}

/// 离开画布超过该距离的标签原点直接截断
const LABEL_ORIGIN_SLACK: i64 = 1 << 16;

/// 以屏幕坐标描边矩形，线宽向内加粗；画布外的部分被裁掉
pub fn stroke_rect(surface: &mut RgbaImage, rect: &BoundingBox, style: &OverlayStyle) {
  // f32 -> i64 饱和转换，NaN 视为 0
  let left = rect.x.round() as i64;
  let top = rect.y.round() as i64;
  let right = left.saturating_add(rect.w.round().max(0.0) as i64);
  let bottom = top.saturating_add(rect.h.round().max(0.0) as i64);

  for inset in 0..i64::from(style.box_line_width) {
    let (l, t) = (left.saturating_add(inset), top.saturating_add(inset));
    let (r, b) = (right.saturating_sub(inset), bottom.saturating_sub(inset));
    if r <= l || b <= t {
      break;
    }
    fill_clipped(surface, (l, t), (r, t + 1), style.box_color);
    fill_clipped(surface, (l, b - 1), (r, b), style.box_color);
    fill_clipped(surface, (l, t), (l + 1, b), style.box_color);
    fill_clipped(surface, (r - 1, t), (r, b), style.box_color);
  }
}

/// 填充半开区间 `[x0, x1) x [y0, y1)` 与画布的交集
fn fill_clipped(
  surface: &mut RgbaImage,
  (x0, y0): (i64, i64),
  (x1, y1): (i64, i64),
  color: Rgba<u8>,
) {
  let (width, height) = surface.dimensions();
  let (x0, y0) = (x0.max(0), y0.max(0));
  let (x1, y1) = (x1.min(i64::from(width)), y1.min(i64::from(height)));
  if x1 <= x0 || y1 <= y0 {
    return;
  }
  // 交集落在画布内，转换不会溢出
  let r = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32);
  draw_filled_rect_mut(surface, r, color);
}

/// 以基线为锚点书写标签；原点在画布右侧或下方时不绘制
pub fn draw_label(
  surface: &mut RgbaImage,
  font: &FontArc,
  text: &str,
  x: f32,
  baseline: f32,
  style: &OverlayStyle,
) {
  let scale = PxScale::from(style.label_font_size);
  let ascent = font.as_scaled(scale).ascent();
  let (width, height) = surface.dimensions();
  let left = x.round() as i64;
  let top = (baseline - ascent).round() as i64;
  if left >= i64::from(width) || top >= i64::from(height) {
    return;
  }

  draw_text_mut(
    surface,
    style.label_color,
    left.max(-LABEL_ORIGIN_SLACK) as i32,
    top.max(-LABEL_ORIGIN_SLACK) as i32,
    scale,
    font,
    text,
  );
}

/// 把叠加层合成到水平翻转后的视频帧上
pub fn composite(frame: &RgbImage, overlay: &RgbaImage) -> RgbImage {
  let mut out = imageops::flip_horizontal(frame);
  blend(&mut out, overlay);
  out
}

/// 按 alpha 把叠加层混合到底图上，尺寸不一致时不做任何事
pub fn blend(base: &mut RgbImage, overlay: &RgbaImage) {
  if base.dimensions() != overlay.dimensions() {
    return;
  }

  for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
    let alpha = src[3] as u32;
    if alpha == 0 {
      continue;
    }
    let mix = |over: u8, under: u8| -> u8 {
      ((over as u32 * alpha + under as u32 * (255 - alpha)) / 255) as u8
    };
    *dst = Rgb([mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2])]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stroke_is_two_pixels_wide_and_hollow() {
    let mut surface = RgbaImage::new(64, 64);
    let style = OverlayStyle::default();
    stroke_rect(&mut surface, &BoundingBox::new(10.0, 10.0, 20.0, 20.0), &style);

    assert_eq!(*surface.get_pixel(10, 15), style.box_color);
    assert_eq!(*surface.get_pixel(11, 15), style.box_color);
    assert_eq!(surface.get_pixel(12, 15)[3], 0);
    assert_eq!(*surface.get_pixel(29, 15), style.box_color);
    assert_eq!(surface.get_pixel(20, 20)[3], 0);
  }

  #[test]
  fn degenerate_rect_draws_nothing() {
    let mut surface = RgbaImage::new(16, 16);
    stroke_rect(
      &mut surface,
      &BoundingBox::new(4.0, 4.0, 0.0, 8.0),
      &OverlayStyle::default(),
    );
    assert!(surface.pixels().all(|p| p[3] == 0));
  }

  #[test]
  fn huge_box_is_clipped_to_the_canvas() {
    let mut surface = RgbaImage::new(64, 48);
    let style = OverlayStyle::default();
    stroke_rect(
      &mut surface,
      &BoundingBox::new(-3.0e9, 2.0, 5.0e9, 4.0),
      &style,
    );

    assert_eq!(*surface.get_pixel(0, 2), style.box_color);
    assert_eq!(*surface.get_pixel(63, 5), style.box_color);
    assert_eq!(surface.get_pixel(30, 20)[3], 0);

    let mut surface = RgbaImage::new(16, 16);
    stroke_rect(
      &mut surface,
      &BoundingBox::new(f32::NAN, f32::NEG_INFINITY, f32::INFINITY, 8.0),
      &style,
    );
  }

  #[test]
  fn box_partly_left_of_the_canvas_keeps_only_visible_edges() {
    let mut surface = RgbaImage::new(64, 64);
    let style = OverlayStyle::default();
    stroke_rect(&mut surface, &BoundingBox::new(-5.0, 10.0, 20.0, 20.0), &style);

    // 左边在画布外，不应在 x = 0 处出现假边
    assert_eq!(surface.get_pixel(0, 15)[3], 0);
    assert_eq!(*surface.get_pixel(0, 10), style.box_color);
    assert_eq!(*surface.get_pixel(14, 15), style.box_color);
    assert_eq!(*surface.get_pixel(13, 15), style.box_color);
    assert_eq!(surface.get_pixel(12, 15)[3], 0);
  }

  #[test]
  fn far_away_label_origin_does_not_panic() {
    let Ok(Some(font)) = load_font(None) else {
      return;
    };
    let mut surface = RgbaImage::new(32, 32);
    let style = OverlayStyle::default();
    draw_label(&mut surface, &font, "Male, 30-34", -4.0e9, 2.0e9, &style);
    draw_label(&mut surface, &font, "Male, 30-34", 4.0e9, 10.0, &style);
    draw_label(&mut surface, &font, "Male, 30-34", -4.0e9, -4.0e9, &style);
    assert!(surface.pixels().all(|p| p[3] == 0));
  }

  #[test]
  fn composite_flips_the_video_and_keeps_opaque_overlay() {
    let mut frame = RgbImage::new(4, 1);
    frame.put_pixel(0, 0, Rgb([255, 0, 0]));
    frame.put_pixel(3, 0, Rgb([0, 0, 255]));

    let mut overlay = RgbaImage::new(4, 1);
    overlay.put_pixel(1, 0, Rgba([255, 255, 0, 255]));

    let out = composite(&frame, &overlay);
    assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 255]));
    assert_eq!(*out.get_pixel(3, 0), Rgb([255, 0, 0]));
    assert_eq!(*out.get_pixel(1, 0), Rgb([255, 255, 0]));
    assert_eq!(*out.get_pixel(2, 0), Rgb([0, 0, 0]));
  }

  #[test]
  fn clear_resets_alpha() {
    let mut surface = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]));
    clear(&mut surface);
    assert!(surface.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
  }

  #[test]
  fn explicit_missing_font_is_an_error() {
    assert!(matches!(
      load_font(Some(Path::new("/no/such/font.ttf"))),
      Err(FontError::Io { .. })
    ));
  }
}
