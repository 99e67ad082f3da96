// 该文件是 Kanxiang （看相） 项目的一部分。
// src/overlay/clock.rs - 渲染帧时钟
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

use std::time::{Duration, Instant};

pub const DEFAULT_FPS: u32 = 30;

/// 按固定刷新率推进的时钟，代替显示器的刷新信号
///
/// 落后时直接跳到当前时刻，不补帧。
#[derive(Debug, Clone)]
pub struct FrameClock {
  period: Duration,
  next: Instant,
}

impl Default for FrameClock {
  fn default() -> Self {
    Self::with_fps(DEFAULT_FPS)
  }
}

impl FrameClock {
  pub fn with_fps(fps: u32) -> Self {
    Self {
      period: Duration::from_secs(1) / fps.max(1),
      next: Instant::now(),
    }
  }

  pub fn period(&self) -> Duration {
    self.period
  }

  /// 阻塞到下一帧，返回实际等待时长
  pub fn wait_next(&mut self) -> Duration {
    self.next += self.period;
    let now = Instant::now();
    if self.next > now {
      let wait = self.next - now;
      std::thread::sleep(wait);
      wait
    } else {
      self.next = now;
      Duration::ZERO
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paces_ticks_at_the_period() {
    let mut clock = FrameClock::with_fps(100);
    assert_eq!(clock.period(), Duration::from_millis(10));
    let start = Instant::now();
    for _ in 0..5 {
      clock.wait_next();
    }
    assert!(start.elapsed() >= Duration::from_millis(40));
  }

  #[test]
  fn does_not_burst_after_a_stall() {
    let mut clock = FrameClock::with_fps(100);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(clock.wait_next(), Duration::ZERO);
    assert!(clock.wait_next() > Duration::ZERO);
  }
}
