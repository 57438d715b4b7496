// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/compositor.rs - 原型掩码合成与上采样
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

use tracing::error;

use crate::{
  kernel::{Grid, Interpolation, Resampler, sigmoid},
  model::{BoundingBox, Detection},
  tensor::{OutputTensor, TensorError},
  topology::PrototypeLayout,
};

/// K 张低分辨率原型，按 (k, y, x) 连续存放
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeBank {
  channels: usize,
  height: usize,
  width: usize,
  data: Box<[f32]>,
}

impl PrototypeBank {
  pub fn new(
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
  ) -> Result<Self, TensorError> {
    let expected = channels * height * width;
    if data.len() != expected {
      return Err(TensorError::ShapeMismatch {
        shape: vec![channels, height, width],
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      channels,
      height,
      width,
      data: data.into_boxed_slice(),
    })
  }

  /// 按识别出的布局从原型张量中取出，统一为通道优先
  pub fn from_tensor(tensor: &OutputTensor, layout: &PrototypeLayout) -> Result<Self, TensorError> {
    let expected = layout.channels * layout.height * layout.width;
    if expected == 0 || layout.offset(layout.channels - 1, layout.height - 1, layout.width - 1)
      >= tensor.len()
    {
      return Err(TensorError::ShapeMismatch {
        shape: tensor.shape().to_vec(),
        expected,
        actual: tensor.len(),
      });
    }

    let mut data = Vec::with_capacity(expected);
    for k in 0..layout.channels {
      for y in 0..layout.height {
        for x in 0..layout.width {
          data.push(tensor.value_at(layout.offset(k, y, x)));
        }
      }
    }
    Self::new(layout.channels, layout.height, layout.width, data)
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  fn plane(&self, k: usize) -> &[f32] {
    let size = self.height * self.width;
    &self.data[k * size..(k + 1) * size]
  }

  /// sigmoid(Σ_k coefficients[k] * proto[k])，系数个数必须等于 K
  pub fn compose(&self, coefficients: &[f32]) -> Option<Grid> {
    if coefficients.len() != self.channels {
      error!(
        "掩码系数个数 {} 与原型通道数 {} 不一致",
        coefficients.len(),
        self.channels
      );
      return None;
    }

    let mut sum = vec![0.0f32; self.height * self.width];
    for (k, &coefficient) in coefficients.iter().enumerate() {
      for (acc, &p) in sum.iter_mut().zip(self.plane(k)) {
        *acc += coefficient * p;
      }
    }
    let mut grid = Grid::new(self.width, self.height, sum)?;
    grid.map_in_place(sigmoid);
    Some(grid)
  }
}

/// 框内按输入分辨率采样得到的概率
#[derive(Debug, Clone, PartialEq)]
pub struct BoxProbabilities {
  pub bbox: BoundingBox,
  /// 尺寸为框的宽高，(0, 0) 对应 (x1, y1)
  pub grid: Grid,
}

/// 将检测的掩码系数与原型合成，并映射到输入分辨率
pub struct MaskCompositor<'a> {
  bank: &'a PrototypeBank,
  resampler: Resampler,
}

impl<'a> MaskCompositor<'a> {
  pub fn new(
    bank: &'a PrototypeBank,
    input_width: usize,
    input_height: usize,
    interpolation: Interpolation,
  ) -> Self {
    let resampler = Resampler::new(
      (bank.width(), bank.height()),
      (input_width, input_height),
      interpolation,
    );
    Self { bank, resampler }
  }

  /// 只在框内逐点采样，几何映射与整图上采样一致
  pub fn render(&self, detection: &Detection) -> Option<BoxProbabilities> {
    let low = self.bank.compose(&detection.mask_coefficients)?;
    let bbox = detection.bbox;

    let mut values = Vec::with_capacity(bbox.area());
    for y in bbox.y1..=bbox.y2 {
      for x in bbox.x1..=bbox.x2 {
        values.push(self.resampler.sample(&low, x, y));
      }
    }
    let grid = Grid::new(bbox.width(), bbox.height(), values)?;
    Some(BoxProbabilities { bbox, grid })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::topology::AxisLayout;

  #[test]
  fn channels_last_prototypes_are_reordered() {
    // (H=1, W=2, K=2)
    let tensor = OutputTensor::from_f32(&[1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let layout = PrototypeLayout {
      layout: AxisLayout::ChannelsLast,
      channels: 2,
      height: 1,
      width: 2,
      strides: [1, 4, 2],
    };
    let bank = PrototypeBank::from_tensor(&tensor, &layout).unwrap();
    assert_eq!(bank.plane(0), &[1.0, 3.0]);
    assert_eq!(bank.plane(1), &[2.0, 4.0]);
  }

  #[test]
  fn compose_is_weighted_sum() {
    let bank = PrototypeBank::new(2, 1, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
    let grid = bank.compose(&[2.0, -2.0]).unwrap();
    assert!((grid.get(0, 0) - sigmoid(2.0)).abs() < 1e-6);
    assert!((grid.get(1, 0) - sigmoid(-2.0)).abs() < 1e-6);
  }

  #[test]
  fn compose_rejects_wrong_length() {
    let bank = PrototypeBank::new(2, 1, 1, vec![1.0, 1.0]).unwrap();
    assert!(bank.compose(&[1.0]).is_none());
  }

  #[test]
  fn render_covers_box_only() {
    let bank = PrototypeBank::new(1, 4, 4, vec![1.0; 16]).unwrap();
    let compositor = MaskCompositor::new(&bank, 32, 32, Interpolation::Bilinear);
    let detection = Detection {
      class_index: 0,
      score: 0.9,
      bbox: BoundingBox { x1: 2, y1: 3, x2: 9, y2: 5 },
      mask_coefficients: vec![4.0].into_boxed_slice(),
    };
    let probabilities = compositor.render(&detection).unwrap();
    assert_eq!(probabilities.grid.width(), 8);
    assert_eq!(probabilities.grid.height(), 3);
    assert!(
      probabilities
        .grid
        .as_slice()
        .iter()
        .all(|&v| v == sigmoid(4.0))
    );
  }
}
