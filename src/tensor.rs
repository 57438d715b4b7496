// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - 推理输出张量
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

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
  #[error("形状 {shape:?} 需要 {expected} 个元素, 实际为 {actual}")]
  ShapeMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 张量元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
  Float32,
  UInt8,
  Int32,
}

impl ElementKind {
  /// 整数（量化）输出使用 0-255 的阈值语义
  pub fn is_integer(self) -> bool {
    !matches!(self, ElementKind::Float32)
  }
}

/// 连续存储的张量数据
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
  Float32(Box<[f32]>),
  UInt8(Box<[u8]>),
  Int32(Box<[i32]>),
}

impl TensorData {
  pub fn len(&self) -> usize {
    match self {
      TensorData::Float32(data) => data.len(),
      TensorData::UInt8(data) => data.len(),
      TensorData::Int32(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn kind(&self) -> ElementKind {
    match self {
      TensorData::Float32(_) => ElementKind::Float32,
      TensorData::UInt8(_) => ElementKind::UInt8,
      TensorData::Int32(_) => ElementKind::Int32,
    }
  }
}

/// 推理运行时返回的一个输出张量：扁平缓冲区 + 形状 + 行优先步长
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  shape: Box<[usize]>,
  strides: Box<[usize]>,
  data: TensorData,
}

/// 行优先（C 顺序）步长
pub fn row_major_strides(shape: &[usize]) -> Box<[usize]> {
  let mut strides = vec![1usize; shape.len()];
  for axis in (0..shape.len().saturating_sub(1)).rev() {
    strides[axis] = strides[axis + 1] * shape[axis + 1];
  }
  strides.into_boxed_slice()
}

impl OutputTensor {
  pub fn new(shape: &[usize], data: TensorData) -> Result<Self, TensorError> {
    let expected = shape.iter().product::<usize>();
    if expected != data.len() {
      return Err(TensorError::ShapeMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape: shape.into(),
      strides: row_major_strides(shape),
      data,
    })
  }

  pub fn from_f32(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
    Self::new(shape, TensorData::Float32(data.into_boxed_slice()))
  }

  pub fn from_u8(shape: &[usize], data: Vec<u8>) -> Result<Self, TensorError> {
    Self::new(shape, TensorData::UInt8(data.into_boxed_slice()))
  }

  pub fn from_i32(shape: &[usize], data: Vec<i32>) -> Result<Self, TensorError> {
    Self::new(shape, TensorData::Int32(data.into_boxed_slice()))
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn rank(&self) -> usize {
    self.shape.len()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn kind(&self) -> ElementKind {
    self.data.kind()
  }

  pub fn data(&self) -> &TensorData {
    &self.data
  }

  /// 多维下标换算为扁平偏移，下标个数必须等于秩
  pub fn offset(&self, index: &[usize]) -> usize {
    debug_assert_eq!(index.len(), self.shape.len());
    index
      .iter()
      .zip(self.strides.iter())
      .map(|(i, s)| i * s)
      .sum()
  }

  /// 按扁平偏移读取，统一转为 f32
  #[inline]
  pub fn value_at(&self, offset: usize) -> f32 {
    match &self.data {
      TensorData::Float32(data) => data[offset],
      TensorData::UInt8(data) => data[offset] as f32,
      TensorData::Int32(data) => data[offset] as f32,
    }
  }

  pub fn get(&self, index: &[usize]) -> f32 {
    self.value_at(self.offset(index))
  }
}
