// 该文件是 Shanan （山南西风） 项目的一部分。
// src/topology.rs - 输出张量拓扑识别
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

//! 根据所有输出张量的形状判定模型族与轴布局。
//!
//! 解码代码只认 [`ModelFamily`]，不再自行检查形状。

use tracing::{debug, warn};

use crate::tensor::row_major_strides;

/// 检测 + 原型族中特征轴的最小长度
pub const DETECTION_MIN_FEATURES: usize = 100;
/// 检测 + 原型族中锚点轴的最小长度
pub const DETECTION_MIN_ANCHORS: usize = 1000;
/// 特征轴开头的框分量 (cx, cy, w, h)
pub const BOX_COMPONENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisLayout {
  /// (…, H, W, C)
  ChannelsLast,
  /// (…, C, H, W)
  ChannelsFirst,
  /// (batch, features, anchors)
  FlatFeature,
}

/// 逐像素输出的几何信息，步长以元素计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseLayout {
  pub layout: AxisLayout,
  pub height: usize,
  pub width: usize,
  pub channels: usize,
  /// (y, x, c) 三个方向的步长
  pub strides: [usize; 3],
}

impl DenseLayout {
  #[inline]
  pub fn offset(&self, y: usize, x: usize, c: usize) -> usize {
    y * self.strides[0] + x * self.strides[1] + c * self.strides[2]
  }
}

/// 检测张量 (1, features, anchors) 的特征划分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionHead {
  pub features: usize,
  pub anchors: usize,
  pub num_classes: usize,
  pub mask_dims: usize,
  /// (feature, anchor) 两个方向的步长
  pub strides: [usize; 2],
}

impl DetectionHead {
  /// 由类别数推出掩码系数个数，特征数不足时返回 None
  pub fn new(features: usize, anchors: usize, num_classes: usize) -> Option<Self> {
    let mask_dims = BOX_COMPONENTS
      .checked_add(num_classes)
      .and_then(|n| features.checked_sub(n))?;
    Some(Self {
      features,
      anchors,
      num_classes,
      mask_dims,
      strides: [anchors, 1],
    })
  }

  #[inline]
  pub fn offset(&self, feature: usize, anchor: usize) -> usize {
    feature * self.strides[0] + anchor * self.strides[1]
  }
}

/// 原型张量的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrototypeLayout {
  pub layout: AxisLayout,
  pub channels: usize,
  pub height: usize,
  pub width: usize,
  /// (k, y, x) 三个方向的步长
  pub strides: [usize; 3],
}

impl PrototypeLayout {
  #[inline]
  pub fn offset(&self, k: usize, y: usize, x: usize) -> usize {
    k * self.strides[0] + y * self.strides[1] + x * self.strides[2]
  }
}

/// 识别结果，三者必居其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFamily {
  Dense(DenseLayout),
  DetectionPrototype {
    head: DetectionHead,
    prototype: PrototypeLayout,
  },
  Unsupported(String),
}

impl ModelFamily {
  pub fn is_supported(&self) -> bool {
    !matches!(self, ModelFamily::Unsupported(_))
  }
}

/// 输出张量拓扑识别。
///
/// `label_count` 为标签表条目数，0 表示未知；`default_classes` 为标签表缺失时
/// 检测族使用的类别数。
pub fn resolve(shapes: &[&[usize]], label_count: usize, default_classes: usize) -> ModelFamily {
  let family = match shapes {
    [] => ModelFamily::Unsupported("没有输出张量".to_string()),
    [single] => resolve_dense(single, label_count),
    [first, second, ..] => resolve_detection(first, second, label_count, default_classes),
  };

  match &family {
    ModelFamily::Unsupported(reason) => warn!("不支持的输出拓扑 {:?}: {}", shapes, reason),
    family => debug!("输出拓扑 {:?} 识别为 {:?}", shapes, family),
  }
  family
}

fn resolve_dense(shape: &[usize], label_count: usize) -> ModelFamily {
  let strides = row_major_strides(shape);
  match *shape {
    [h, w, c] => ModelFamily::Dense(DenseLayout {
      layout: AxisLayout::ChannelsLast,
      height: h,
      width: w,
      channels: c,
      strides: [strides[0], strides[1], strides[2]],
    }),
    [_, a, b, c] => {
      let layout = dense_channel_axis(a, b, c, label_count);
      let dense = match layout {
        AxisLayout::ChannelsFirst => DenseLayout {
          layout,
          height: b,
          width: c,
          channels: a,
          strides: [strides[2], strides[3], strides[1]],
        },
        _ => DenseLayout {
          layout,
          height: a,
          width: b,
          channels: c,
          strides: [strides[1], strides[2], strides[3]],
        },
      };
      ModelFamily::Dense(dense)
    }
    _ => ModelFamily::Unsupported(format!("单输出张量的秩为 {}, 需要 3 或 4", shape.len())),
  }
}

// (1, a, b, c) 中哪一轴是通道
fn dense_channel_axis(a: usize, b: usize, c: usize, label_count: usize) -> AxisLayout {
  if label_count > 0 {
    match (a == label_count, c == label_count) {
      (true, false) => return AxisLayout::ChannelsFirst,
      (false, true) => return AxisLayout::ChannelsLast,
      _ => {}
    }
  }
  // 两个最大的轴为空间轴
  if a < b.min(c) {
    AxisLayout::ChannelsFirst
  } else {
    AxisLayout::ChannelsLast
  }
}

fn resolve_detection(
  first: &[usize],
  second: &[usize],
  label_count: usize,
  default_classes: usize,
) -> ModelFamily {
  let (features, anchors) = match *first {
    [1, features, anchors]
      if features >= DETECTION_MIN_FEATURES && anchors >= DETECTION_MIN_ANCHORS =>
    {
      (features, anchors)
    }
    _ => {
      return ModelFamily::Unsupported(format!(
        "首个输出 {:?} 不符合 (1, >={}, >={}) 的检测张量形状",
        first, DETECTION_MIN_FEATURES, DETECTION_MIN_ANCHORS
      ));
    }
  };

  let num_classes = if label_count > 0 {
    label_count
  } else {
    default_classes
  };
  let head = match DetectionHead::new(features, anchors, num_classes) {
    Some(head) if head.mask_dims > 0 => head,
    _ => {
      return ModelFamily::Unsupported(format!(
        "特征数 {} 不足以容纳 4 个框分量、{} 个类别和掩码系数",
        features, num_classes
      ));
    }
  };

  match resolve_prototype(second, head.mask_dims) {
    Some(prototype) => ModelFamily::DetectionPrototype { head, prototype },
    None => ModelFamily::Unsupported(format!(
      "原型张量 {:?} 中没有长度为 {} 的通道轴",
      second, head.mask_dims
    )),
  }
}

fn resolve_prototype(shape: &[usize], mask_dims: usize) -> Option<PrototypeLayout> {
  let strides = row_major_strides(shape);
  // 秩为 4 时去掉批次轴
  let (dims, strides) = match shape.len() {
    3 => (shape, &strides[..]),
    4 => (&shape[1..], &strides[1..]),
    _ => return None,
  };

  if dims[0] == mask_dims {
    Some(PrototypeLayout {
      layout: AxisLayout::ChannelsFirst,
      channels: dims[0],
      height: dims[1],
      width: dims[2],
      strides: [strides[0], strides[1], strides[2]],
    })
  } else if dims[2] == mask_dims {
    Some(PrototypeLayout {
      layout: AxisLayout::ChannelsLast,
      channels: dims[2],
      height: dims[0],
      width: dims[1],
      strides: [strides[2], strides[0], strides[1]],
    })
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channels_last_strides() {
    let ModelFamily::Dense(dense) = resolve(&[&[1, 4, 6, 3]], 3, 80) else {
      panic!("应识别为逐像素族");
    };
    assert_eq!(dense.layout, AxisLayout::ChannelsLast);
    assert_eq!(dense.offset(1, 2, 1), 6 * 3 + 2 * 3 + 1);
  }

  #[test]
  fn channels_first_strides() {
    let ModelFamily::Dense(dense) = resolve(&[&[1, 3, 4, 6]], 3, 80) else {
      panic!("应识别为逐像素族");
    };
    assert_eq!(dense.layout, AxisLayout::ChannelsFirst);
    assert_eq!((dense.height, dense.width, dense.channels), (4, 6, 3));
    assert_eq!(dense.offset(1, 2, 1), 24 + 6 + 2);
  }

  #[test]
  fn head_rejects_too_few_features() {
    assert!(DetectionHead::new(50, 2000, 80).is_none());
    assert_eq!(DetectionHead::new(116, 8400, 80).map(|h| h.mask_dims), Some(32));
  }

  #[test]
  fn huge_class_count_is_unsupported() {
    assert!(DetectionHead::new(116, 8400, usize::MAX).is_none());
    let family = resolve(&[&[1, 116, 8400], &[1, 32, 160, 160]], 0, usize::MAX);
    assert!(matches!(family, ModelFamily::Unsupported(_)));
  }
}
