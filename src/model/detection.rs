// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/detection.rs - 检测张量解码
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
  config::{SegmentConfig, SelectionPolicy},
  kernel::{round_clamp, sigmoid},
  model::{BoundingBox, Detection},
  tensor::OutputTensor,
  topology::{BOX_COMPONENTS, DetectionHead},
};

/// 框分量的最大绝对值不超过该值时视为归一化坐标
const NORMALIZED_BOX_LIMIT: f32 = 1.5;

/// 逐锚点解码检测张量 (1, features, anchors)。
///
/// 不做 NMS，重叠的检测会同时保留。数量上限见 [`SelectionPolicy`]。
pub fn decode_detections(
  tensor: &OutputTensor,
  head: &DetectionHead,
  input_width: usize,
  input_height: usize,
  config: &SegmentConfig,
) -> Vec<Detection> {
  let partition = BOX_COMPONENTS
    .checked_add(head.num_classes)
    .and_then(|n| n.checked_add(head.mask_dims));
  if partition != Some(head.features) || head.num_classes == 0 {
    error!("检测头划分无效: {:?}", head);
    return Vec::new();
  }
  if head.anchors == 0 || head.offset(head.features - 1, head.anchors - 1) >= tensor.len() {
    debug!("检测张量长度 {} 与检测头 {:?} 不符", tensor.len(), head);
    return Vec::new();
  }
  if input_width == 0 || input_height == 0 || config.max_detections == 0 {
    return Vec::new();
  }

  let mut detections = Vec::new();
  for anchor in 0..head.anchors {
    let Some(detection) = decode_anchor(tensor, head, anchor, input_width, input_height, config)
    else {
      continue;
    };

    detections.push(detection);
    if config.selection == SelectionPolicy::ScanOrder && detections.len() >= config.max_detections
    {
      debug!("检测数量达到上限 {}, 在锚点 {} 处停止扫描", config.max_detections, anchor);
      break;
    }
  }

  if config.selection == SelectionPolicy::TopScore {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections.truncate(config.max_detections);
  }

  debug!("解码得到 {} 个检测", detections.len());
  detections
}

fn decode_anchor(
  tensor: &OutputTensor,
  head: &DetectionHead,
  anchor: usize,
  input_width: usize,
  input_height: usize,
  config: &SegmentConfig,
) -> Option<Detection> {
  let read = |feature: usize| tensor.value_at(head.offset(feature, anchor));

  // sigmoid 单调，先取最大 logit 再激活
  let (class_index, max_logit) = (0..head.num_classes)
    .map(|c| (c, read(BOX_COMPONENTS + c)))
    .fold((0usize, f32::NEG_INFINITY), |best, cur| {
      if cur.1 > best.1 { cur } else { best }
    });
  let score = sigmoid(max_logit);
  if score.is_nan() || score < config.confidence_threshold {
    return None;
  }

  let (mut cx, mut cy, mut w, mut h) = (read(0), read(1), read(2), read(3));
  let extent = cx.abs().max(cy.abs()).max(w.abs()).max(h.abs());
  if extent <= NORMALIZED_BOX_LIMIT {
    cx *= input_width as f32;
    w *= input_width as f32;
    cy *= input_height as f32;
    h *= input_height as f32;
  }

  let bbox = BoundingBox {
    x1: round_clamp(cx - w / 2.0, input_width),
    y1: round_clamp(cy - h / 2.0, input_height),
    x2: round_clamp(cx + w / 2.0, input_width),
    y2: round_clamp(cy + h / 2.0, input_height),
  };
  if bbox.x2 <= bbox.x1 || bbox.y2 <= bbox.y1 {
    debug!("锚点 {} 的框 {:?} 退化, 跳过", anchor, bbox);
    return None;
  }

  let coefficient_base = BOX_COMPONENTS + head.num_classes;
  let mask_coefficients = (0..head.mask_dims)
    .map(|k| read(coefficient_base + k))
    .collect();

  Some(Detection {
    class_index,
    score,
    bbox,
    mask_coefficients,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  // feats = 4 + 2 + 1, 两个锚点
  fn two_anchor_tensor() -> (OutputTensor, DetectionHead) {
    let head = DetectionHead::new(7, 2, 2).unwrap();
    #[rustfmt::skip]
    let data = vec![
      // cx       cy       w        h
      0.5, 60.0,  0.5, 60.0,  0.2, 10.0,  0.2, 10.0,
      // class 0, class 1
      -4.0, 2.0,  3.0, -5.0,
      // coefficient
      1.0, -1.0,
    ];
    (OutputTensor::from_f32(&[1, 7, 2], data).unwrap(), head)
  }

  #[test]
  fn normalized_and_pixel_boxes() {
    let (tensor, head) = two_anchor_tensor();
    let detections = decode_detections(&tensor, &head, 100, 100, &SegmentConfig::default());
    assert_eq!(detections.len(), 2);

    assert_eq!(detections[0].class_index, 1);
    assert_eq!(
      detections[0].bbox,
      BoundingBox { x1: 40, y1: 40, x2: 60, y2: 60 }
    );
    assert_eq!(&*detections[0].mask_coefficients, &[1.0]);

    assert_eq!(detections[1].class_index, 0);
    assert_eq!(
      detections[1].bbox,
      BoundingBox { x1: 55, y1: 55, x2: 65, y2: 65 }
    );
    assert_eq!(&*detections[1].mask_coefficients, &[-1.0]);
  }

  #[test]
  fn scan_order_cap_stops_early() {
    let (tensor, head) = two_anchor_tensor();
    let config = SegmentConfig::default().with_max_detections(1);
    let detections = decode_detections(&tensor, &head, 100, 100, &config);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_index, 1);
  }

  #[test]
  fn top_score_cap_keeps_best() {
    let (tensor, head) = two_anchor_tensor();
    let config = SegmentConfig::default()
      .with_max_detections(1)
      .with_selection(SelectionPolicy::TopScore);
    let detections = decode_detections(&tensor, &head, 100, 100, &config);
    assert_eq!(detections.len(), 1);
    // sigmoid(3.0) > sigmoid(2.0)
    assert_eq!(detections[0].class_index, 1);
    assert!((detections[0].score - sigmoid(3.0)).abs() < 1e-6);
  }

  #[test]
  fn threshold_filters_anchors() {
    let (tensor, head) = two_anchor_tensor();
    let config = SegmentConfig::default().with_confidence_threshold(0.9);
    let detections = decode_detections(&tensor, &head, 100, 100, &config);
    // sigmoid(3.0) ≈ 0.953, sigmoid(2.0) ≈ 0.881
    assert_eq!(detections.len(), 1);
    assert!(detections[0].score >= 0.9);
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let head = DetectionHead::new(7, 1, 2).unwrap();
    // 宽度为 0
    let data = vec![0.5, 0.5, 0.0, 0.2, 5.0, -5.0, 0.0];
    let tensor = OutputTensor::from_f32(&[1, 7, 1], data).unwrap();
    assert!(decode_detections(&tensor, &head, 100, 100, &SegmentConfig::default()).is_empty());
  }
}
