// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/segment.rs - 分割后处理入口
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
use tracing::{debug, warn};

use crate::{
  config::SegmentConfig,
  frame::InputTensor,
  label::LabelTable,
  model::{
    SegmentationResult, assemble_detections,
    compositor::{MaskCompositor, PrototypeBank},
    decode_dense, decode_detections,
  },
  tensor::{OutputTensor, TensorError},
  topology::{ModelFamily, resolve},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
  #[error("不支持的输出拓扑: {0}")]
  TopologyUnsupported(String),
  #[error("原型张量错误: {0}")]
  Prototype(#[from] TensorError),
}

/// 纯计算的分割后处理，不持有任何跨调用状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmenter {
  config: SegmentConfig,
}

impl Segmenter {
  pub fn new(config: SegmentConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SegmentConfig {
    &self.config
  }

  /// 出错时记录日志并返回空列表
  pub fn segment<L: LabelTable + ?Sized>(
    &self,
    input: &InputTensor,
    outputs: &[OutputTensor],
    labels: &L,
  ) -> Vec<SegmentationResult> {
    self
      .try_segment(input, outputs, labels)
      .unwrap_or_else(|e| {
        warn!("分割解码中止, 返回空结果: {}", e);
        Vec::new()
      })
  }

  pub fn try_segment<L: LabelTable + ?Sized>(
    &self,
    input: &InputTensor,
    outputs: &[OutputTensor],
    labels: &L,
  ) -> Result<Vec<SegmentationResult>, SegmentError> {
    let (width, height) = (input.width(), input.height());
    let shapes: Vec<&[usize]> = outputs.iter().map(OutputTensor::shape).collect();

    let results = match resolve(&shapes, labels.label_count(), self.config.default_num_classes) {
      ModelFamily::Unsupported(reason) => return Err(SegmentError::TopologyUnsupported(reason)),
      ModelFamily::Dense(layout) => decode_dense(&outputs[0], &layout, width, height, labels),
      ModelFamily::DetectionPrototype { head, prototype } => {
        let detections = decode_detections(&outputs[0], &head, width, height, &self.config);
        if detections.is_empty() {
          return Ok(Vec::new());
        }
        let bank = PrototypeBank::from_tensor(&outputs[1], &prototype)?;
        let compositor = MaskCompositor::new(&bank, width, height, self.config.interpolation);
        assemble_detections(&detections, &compositor, width, height, labels, &self.config)
      }
    };

    debug!("分割完成, 共 {} 个结果", results.len());
    Ok(results)
  }
}

/// 使用默认配置的分割入口
pub fn segment<L: LabelTable + ?Sized>(
  input: &InputTensor,
  outputs: &[OutputTensor],
  labels: &L,
) -> Vec<SegmentationResult> {
  Segmenter::default().segment(input, outputs, labels)
}
