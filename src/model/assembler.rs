// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/assembler.rs - 分割结果组装
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

use tracing::debug;

use crate::{
  config::{ConfidencePolicy, SegmentConfig},
  label::LabelTable,
  model::{
    Detection, Mask, SegmentationResult,
    compositor::{BoxProbabilities, MaskCompositor},
    rank,
  },
};

/// 合成、二值化、命名并排序检测结果。
///
/// 框内没有前景像素的检测不产生结果。
pub fn assemble_detections<L: LabelTable + ?Sized>(
  detections: &[Detection],
  compositor: &MaskCompositor<'_>,
  input_width: usize,
  input_height: usize,
  labels: &L,
  config: &SegmentConfig,
) -> Vec<SegmentationResult> {
  let mut results: Vec<SegmentationResult> = detections
    .iter()
    .filter_map(|detection| {
      let probabilities = compositor.render(detection)?;
      binarize(detection, &probabilities, input_width, input_height, labels, config)
    })
    .collect();

  rank(&mut results);
  debug!(
    "{} 个检测组装为 {} 个分割结果",
    detections.len(),
    results.len()
  );
  results
}

fn binarize<L: LabelTable + ?Sized>(
  detection: &Detection,
  probabilities: &BoxProbabilities,
  input_width: usize,
  input_height: usize,
  labels: &L,
  config: &SegmentConfig,
) -> Option<SegmentationResult> {
  let BoxProbabilities { bbox, grid } = probabilities;
  let mut mask = Mask::empty(input_width, input_height);
  let mut on_pixels = 0usize;

  for dy in 0..grid.height() {
    for dx in 0..grid.width() {
      if grid.get(dx, dy) >= config.mask_threshold {
        mask.set(bbox.x1 + dx, bbox.y1 + dy);
        on_pixels += 1;
      }
    }
  }

  if on_pixels == 0 {
    debug!(
      "类别 {} 的检测 {:?} 二值化后为空, 丢弃",
      detection.class_index, bbox
    );
    return None;
  }

  let confidence = match config.confidence_policy {
    ConfidencePolicy::DetectionScore => detection.score,
    ConfidencePolicy::MaskCoverage => on_pixels as f32 / bbox.area() as f32,
  }
  .clamp(0.0, 1.0);

  Some(SegmentationResult {
    id: detection.class_index,
    label: labels.label_or_fallback(detection.class_index),
    confidence,
    mask,
    bbox: Some(*bbox),
  })
}
