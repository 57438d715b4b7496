// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型与分割结果
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 输入分辨率下的像素框，四个边界均为闭区间内的像素下标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
  pub x1: usize,
  pub y1: usize,
  pub x2: usize,
  pub y2: usize,
}

impl BoundingBox {
  pub fn width(&self) -> usize {
    self.x2 - self.x1 + 1
  }

  pub fn height(&self) -> usize {
    self.y2 - self.y1 + 1
  }

  pub fn area(&self) -> usize {
    self.width() * self.height()
  }

  pub fn contains(&self, x: usize, y: usize) -> bool {
    (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
  }
}

/// 单个锚点解码出的候选检测
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_index: usize,
  pub score: f32,
  pub bbox: BoundingBox,
  pub mask_coefficients: Box<[f32]>,
}

/// 与输入同分辨率的二值掩码，取值 {0, 1}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl Mask {
  pub fn empty(width: usize, height: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0u8; width * height].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize) -> u8 {
    self.data[y * self.width + x]
  }

  #[inline]
  pub fn set(&mut self, x: usize, y: usize) {
    self.data[y * self.width + x] = 1;
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  pub fn foreground_count(&self) -> usize {
    self.data.iter().filter(|&&v| v != 0).count()
  }

  pub fn pixel_count(&self) -> usize {
    self.data.len()
  }

  /// {0, 255} 形式，便于保存为灰度图
  pub fn to_byte_scale(&self) -> Vec<u8> {
    self.data.iter().map(|&v| v * 255).collect()
  }
}

/// 一个带标签的分割结果
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
  pub id: usize,
  pub label: String,
  pub confidence: f32,
  pub mask: Mask,
  /// 检测族的框，逐像素族为 None
  pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentResult {
  pub items: Box<[SegmentationResult]>,
}

impl SegmentResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, SegmentationResult> {
    self.items.iter()
  }
}

impl From<Vec<SegmentationResult>> for SegmentResult {
  fn from(items: Vec<SegmentationResult>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 置信度降序，稳定排序保持并列项的原有次序
pub fn rank(results: &mut [SegmentationResult]) {
  results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

mod assembler;
mod compositor;
mod dense;
mod detection;
mod segment;
mod segment_model;

pub use self::assembler::assemble_detections;
pub use self::compositor::{BoxProbabilities, MaskCompositor, PrototypeBank};
pub use self::dense::{
  DENSE_FLOAT_THRESHOLD, DENSE_INTEGER_THRESHOLD, FOREGROUND_LABEL, decode_dense,
};
pub use self::detection::decode_detections;
pub use self::segment::{SegmentError, Segmenter, segment};
pub use self::segment_model::{SegmentModel, SegmentModelBuilder, SegmentModelError};
