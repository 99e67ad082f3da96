// 该文件是 Kanxiang （看相） 项目的一部分。
// src/geometry.rs - 镜像坐标变换
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

//! 画面以镜像方式呈现，而预测框位于未镜像的源帧坐标系中。
//! 所有翻转逻辑集中在这里，绘制代码只调用这些纯函数。

use serde::Deserialize;

/// 标签基线相对框顶部的偏移（像素）
pub const LABEL_BASELINE_OFFSET: f32 = 10.0;

/// 源帧坐标系中的矩形 (x, y, w, h)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

impl BoundingBox {
  pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
    Self { x, y, w, h }
  }

  pub fn is_empty(&self) -> bool {
    !(self.w > 0.0 && self.h > 0.0)
  }
}

/// 水平方向的仿射变换 x' = scale * x + offset，纵轴保持不变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalTransform {
  scale: f32,
  offset: f32,
}

impl Default for HorizontalTransform {
  fn default() -> Self {
    Self::identity()
  }
}

impl HorizontalTransform {
  pub fn identity() -> Self {
    Self {
      scale: 1.0,
      offset: 0.0,
    }
  }

  /// 相当于 translate(width, 0) 后 scale(-1, 1)
  pub fn mirror(width: f32) -> Self {
    Self {
      scale: -1.0,
      offset: width,
    }
  }

  /// 在当前变换之内再叠加 `inner`，即先应用 `inner` 再应用 `self`
  pub fn then(&self, inner: &HorizontalTransform) -> Self {
    Self {
      scale: self.scale * inner.scale,
      offset: self.scale * inner.offset + self.offset,
    }
  }

  pub fn apply_x(&self, x: f32) -> f32 {
    self.scale * x + self.offset
  }

  pub fn is_mirrored(&self) -> bool {
    self.scale < 0.0
  }

  /// 变换矩形并重新规范化为左上角 + 正尺寸
  pub fn apply_rect(&self, rect: &BoundingBox) -> BoundingBox {
    let a = self.apply_x(rect.x);
    let b = self.apply_x(rect.x + rect.w);
    BoundingBox {
      x: a.min(b),
      y: rect.y,
      w: (b - a).abs(),
      h: rect.h,
    }
  }
}

/// 矩形在镜像画面上的位置: (canvas_width - x - w, y, w, h)
pub fn mirror(rect: &BoundingBox, canvas_width: f32) -> BoundingBox {
  HorizontalTransform::mirror(canvas_width).apply_rect(rect)
}

/// 标签的放置信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelAnchor {
  /// 屏幕坐标下文字左端
  pub x: f32,
  /// 屏幕坐标下文字基线
  pub y: f32,
  /// 文字是否按正常方向（从左到右）书写
  pub reads_left_to_right: bool,
}

/// 在镜像变换下再次镜像（双重取反）后计算标签位置
pub fn label_anchor(rect: &BoundingBox, canvas_width: f32) -> LabelAnchor {
  let box_transform = HorizontalTransform::mirror(canvas_width);
  let text_transform = box_transform.then(&HorizontalTransform::mirror(canvas_width));
  LabelAnchor {
    x: text_transform.apply_x(canvas_width - rect.x),
    y: rect.y - LABEL_BASELINE_OFFSET,
    reads_left_to_right: !text_transform.is_mirrored(),
  }
}
