// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/dense.rs - 逐像素分割输出解码
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

use tracing::{debug, error};

use crate::{
  kernel::nearest_index_map,
  label::LabelTable,
  model::{Mask, SegmentationResult, rank},
  tensor::OutputTensor,
  topology::DenseLayout,
};

/// 浮点输出的前景阈值
pub const DENSE_FLOAT_THRESHOLD: f32 = 0.5;
/// 整数（量化）输出的前景阈值
pub const DENSE_INTEGER_THRESHOLD: f32 = 128.0;
/// 标签表不足两项时单通道结果使用的标签
pub const FOREGROUND_LABEL: &str = "foreground";

/// 单通道结果的类别编号
const FOREGROUND_CLASS: usize = 1;

/// 逐像素输出解码为掩码列表。
///
/// 输出分辨率与输入 (`width`, `height`) 不同时按最近邻映射取源像素，
/// 掩码始终为输入分辨率。
pub fn decode_dense<L: LabelTable + ?Sized>(
  tensor: &OutputTensor,
  layout: &DenseLayout,
  width: usize,
  height: usize,
  labels: &L,
) -> Vec<SegmentationResult> {
  if layout.channels == 0 || layout.height == 0 || layout.width == 0 || width == 0 || height == 0
  {
    debug!("逐像素输出或输入为空, 跳过解码");
    return Vec::new();
  }

  let last = layout.offset(layout.height - 1, layout.width - 1, layout.channels - 1);
  if last >= tensor.len() {
    error!(
      "逐像素布局 {:?} 超出张量长度 {}",
      layout,
      tensor.len()
    );
    return Vec::new();
  }

  let xs = nearest_index_map(layout.width, width);
  let ys = nearest_index_map(layout.height, height);

  let results = if layout.channels == 1 {
    vec![decode_binary(tensor, layout, &xs, &ys, labels)]
  } else {
    decode_multiclass(tensor, layout, &xs, &ys, labels)
  };

  debug!("逐像素解码得到 {} 个结果", results.len());
  results
}

fn decode_binary<L: LabelTable + ?Sized>(
  tensor: &OutputTensor,
  layout: &DenseLayout,
  xs: &[usize],
  ys: &[usize],
  labels: &L,
) -> SegmentationResult {
  let threshold = if tensor.kind().is_integer() {
    DENSE_INTEGER_THRESHOLD
  } else {
    DENSE_FLOAT_THRESHOLD
  };

  let mut mask = Mask::empty(xs.len(), ys.len());
  for (y, &sy) in ys.iter().enumerate() {
    for (x, &sx) in xs.iter().enumerate() {
      if tensor.value_at(layout.offset(sy, sx, 0)) >= threshold {
        mask.set(x, y);
      }
    }
  }

  let label = if labels.label_count() >= 2 {
    labels.label_or_fallback(FOREGROUND_CLASS)
  } else {
    FOREGROUND_LABEL.to_string()
  };

  SegmentationResult {
    id: FOREGROUND_CLASS,
    label,
    confidence: mask.foreground_count() as f32 / mask.pixel_count() as f32,
    mask,
    bbox: None,
  }
}

fn decode_multiclass<L: LabelTable + ?Sized>(
  tensor: &OutputTensor,
  layout: &DenseLayout,
  xs: &[usize],
  ys: &[usize],
  labels: &L,
) -> Vec<SegmentationResult> {
  let (width, height) = (xs.len(), ys.len());
  let mut assignment = Vec::with_capacity(width * height);
  let mut counts = vec![0usize; layout.channels];

  for &sy in ys {
    for &sx in xs {
      let class = argmax_channel(tensor, layout, sy, sx);
      counts[class] += 1;
      assignment.push(class);
    }
  }

  let total = (width * height) as f32;
  let mut results: Vec<SegmentationResult> = counts
    .iter()
    .enumerate()
    .filter(|&(_, &count)| count > 0)
    .map(|(class, &count)| {
      let mut mask = Mask::empty(width, height);
      for (i, _) in assignment.iter().enumerate().filter(|&(_, &c)| c == class) {
        mask.set(i % width, i / width);
      }
      SegmentationResult {
        id: class,
        label: labels.label_or_fallback(class),
        confidence: count as f32 / total,
        mask,
        bbox: None,
      }
    })
    .collect();

  // 类别已按升序生成，稳定排序后并列项仍按类别升序
  rank(&mut results);
  results
}

// 并列时取最小的通道
fn argmax_channel(tensor: &OutputTensor, layout: &DenseLayout, y: usize, x: usize) -> usize {
  let mut best = 0;
  let mut best_value = tensor.value_at(layout.offset(y, x, 0));
  for c in 1..layout.channels {
    let value = tensor.value_at(layout.offset(y, x, c));
    if value > best_value {
      best = c;
      best_value = value;
    }
  }
  best
}
