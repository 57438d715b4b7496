// 该文件是 Shanan （山南西风） 项目的一部分。
// src/kernel.rs - 激活与重采样基础算子
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

use std::str::FromStr;

#[inline]
pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 四舍五入后夹到 [0, len - 1]
#[inline]
pub fn round_clamp(value: f32, len: usize) -> usize {
  if len == 0 {
    return 0;
  }
  let max = (len - 1) as f32;
  value.round().clamp(0.0, max) as usize
}

/// 最近邻映射：目标下标对应的源下标
#[inline]
pub fn nearest_index(dst: usize, src_len: usize, dst_len: usize) -> usize {
  (dst * src_len / dst_len.max(1)).min(src_len.saturating_sub(1))
}

/// 整条轴的最近邻映射表
pub fn nearest_index_map(src_len: usize, dst_len: usize) -> Vec<usize> {
  (0..dst_len)
    .map(|dst| nearest_index(dst, src_len, dst_len))
    .collect()
}

/// 上采样策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
  Nearest,
  #[default]
  Bilinear,
}

impl FromStr for Interpolation {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nearest" => Ok(Interpolation::Nearest),
      "bilinear" | "linear" => Ok(Interpolation::Bilinear),
      other => Err(format!("未知的插值方式: {}", other)),
    }
  }
}

/// 行优先的二维浮点网格
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl Grid {
  pub fn new(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
    (data.len() == width * height).then(|| Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn filled(width: usize, height: usize, value: f32) -> Self {
    Self {
      width,
      height,
      data: vec![value; width * height].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize) -> f32 {
    self.data[y * self.width + x]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
    for v in self.data.iter_mut() {
      *v = f(*v);
    }
  }
}

/// 单轴的坐标映射
#[derive(Debug, Clone, Copy)]
struct AxisMap {
  src_len: usize,
  dst_len: usize,
  scale: f32,
}

impl AxisMap {
  fn new(src_len: usize, dst_len: usize) -> Self {
    // 双线性按角点对齐: scale = (in - 1) / (out - 1)
    let scale = if dst_len > 1 {
      (src_len.saturating_sub(1)) as f32 / (dst_len - 1) as f32
    } else {
      0.0
    };
    Self {
      src_len,
      dst_len,
      scale,
    }
  }

  #[inline]
  fn nearest(&self, dst: usize) -> usize {
    nearest_index(dst, self.src_len, self.dst_len)
  }

  #[inline]
  fn linear(&self, dst: usize) -> (usize, usize, f32) {
    let pos = dst as f32 * self.scale;
    let last = self.src_len.saturating_sub(1);
    let lo = (pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    (lo, hi, pos - lo as f32)
  }
}

/// 低分辨率网格到目标分辨率的映射。
/// 可只对目标中的某个区域逐点采样，几何关系与整图重采样一致。
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
  x: AxisMap,
  y: AxisMap,
  interpolation: Interpolation,
}

impl Resampler {
  pub fn new(
    src: (usize, usize),
    dst: (usize, usize),
    interpolation: Interpolation,
  ) -> Self {
    Self {
      x: AxisMap::new(src.0, dst.0),
      y: AxisMap::new(src.1, dst.1),
      interpolation,
    }
  }

  /// 目标坐标 (x, y) 处的值
  pub fn sample(&self, grid: &Grid, x: usize, y: usize) -> f32 {
    match self.interpolation {
      Interpolation::Nearest => grid.get(self.x.nearest(x), self.y.nearest(y)),
      Interpolation::Bilinear => {
        let (x0, x1, tx) = self.x.linear(x);
        let (y0, y1, ty) = self.y.linear(y);
        let top = lerp(grid.get(x0, y0), grid.get(x1, y0), tx);
        let bottom = lerp(grid.get(x0, y1), grid.get(x1, y1), tx);
        lerp(top, bottom, ty)
      }
    }
  }

  pub fn resample(&self, grid: &Grid) -> Grid {
    let (width, height) = (self.x.dst_len, self.y.dst_len);
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
      for x in 0..width {
        data.push(self.sample(grid, x, y));
      }
    }
    Grid {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }
}

// a + (b - a) * t，两端相等时结果严格等于端点
#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a + (b - a) * t
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sigmoid_values() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert!((sigmoid(10.0) - 0.999_954_6).abs() < 1e-6);
    assert!(sigmoid(-100.0) < 1e-6);
  }

  #[test]
  fn round_clamp_bounds() {
    assert_eq!(round_clamp(-3.2, 100), 0);
    assert_eq!(round_clamp(40.4, 100), 40);
    assert_eq!(round_clamp(40.5, 100), 41);
    assert_eq!(round_clamp(250.0, 100), 99);
    assert_eq!(round_clamp(f32::NAN, 100), 0);
    assert_eq!(round_clamp(5.0, 0), 0);
  }

  #[test]
  fn bilinear_aligns_corners() {
    let grid = Grid::new(2, 1, vec![0.0, 1.0]).unwrap();
    let resampler = Resampler::new((2, 1), (5, 1), Interpolation::Bilinear);
    let out = resampler.resample(&grid);
    assert_eq!(out.as_slice(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
  }

  #[test]
  fn nearest_replicates_cells() {
    let grid = Grid::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let resampler = Resampler::new((2, 2), (4, 4), Interpolation::Nearest);
    let out = resampler.resample(&grid);
    assert_eq!(out.get(0, 0), 1.0);
    assert_eq!(out.get(1, 1), 1.0);
    assert_eq!(out.get(2, 0), 2.0);
    assert_eq!(out.get(0, 3), 3.0);
    assert_eq!(out.get(3, 3), 4.0);
  }

  #[test]
  fn single_pixel_target() {
    let grid = Grid::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let out = Resampler::new((2, 2), (1, 1), Interpolation::Bilinear).resample(&grid);
    assert_eq!(out.as_slice(), &[1.0]);
  }

  #[test]
  fn parses_interpolation() {
    assert_eq!("Nearest".parse(), Ok(Interpolation::Nearest));
    assert_eq!("bilinear".parse(), Ok(Interpolation::Bilinear));
    assert!("cubic".parse::<Interpolation>().is_err());
  }
}
