// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 归一化输入张量定义
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

use crate::tensor::TensorError;

pub const RGB_CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameLayout {
  #[default]
  Nchw,
  Nhwc,
}

impl FromStr for FrameLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nchw" => Ok(FrameLayout::Nchw),
      "nhwc" => Ok(FrameLayout::Nhwc),
      other => Err(format!("未知的输入布局: {}", other)),
    }
  }
}

/// 送入推理运行时的 4 维输入张量，数值已归一化到 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
  layout: FrameLayout,
  width: usize,
  height: usize,
  channels: usize,
  data: Box<[f32]>,
}

impl InputTensor {
  pub fn new(
    layout: FrameLayout,
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
  ) -> Result<Self, TensorError> {
    let expected = width * height * channels;
    if data.len() != expected {
      let shape = match layout {
        FrameLayout::Nchw => vec![1, channels, height, width],
        FrameLayout::Nhwc => vec![1, height, width, channels],
      };
      return Err(TensorError::ShapeMismatch {
        shape,
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      layout,
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  /// 全零 RGB 输入，常用于只关心分辨率的场合
  pub fn zeros(layout: FrameLayout, width: usize, height: usize) -> Self {
    Self {
      layout,
      width,
      height,
      channels: RGB_CHANNELS,
      data: vec![0.0; width * height * RGB_CHANNELS].into_boxed_slice(),
    }
  }

  pub fn layout(&self) -> FrameLayout {
    self.layout
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn shape(&self) -> [usize; 4] {
    match self.layout {
      FrameLayout::Nchw => [1, self.channels, self.height, self.width],
      FrameLayout::Nhwc => [1, self.height, self.width, self.channels],
    }
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn pixel(&self, x: usize, y: usize, c: usize) -> f32 {
    let index = match self.layout {
      FrameLayout::Nchw => c * self.height * self.width + y * self.width + x,
      FrameLayout::Nhwc => (y * self.width + x) * self.channels + c,
    };
    self.data[index]
  }
}
