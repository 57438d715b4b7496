// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/segment_model.rs - 运行时 + 分割后处理
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  config::{ConfigError, SegmentConfig},
  frame::InputTensor,
  label::{LabelTable, Labels},
  model::{Model, SegmentResult, Segmenter},
  runtime::{InferenceRuntime, ReplayError, ReplayRuntime, execute, output_tensor_count},
};

#[derive(Error, Debug)]
pub enum SegmentModelError {
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("回放运行时错误: {0}")]
  ReplayError(#[from] ReplayError),
}

/// 持有运行时、模型句柄与标签表；推理失败直接向上传递
pub struct SegmentModel<R: InferenceRuntime, L: LabelTable> {
  runtime: R,
  handle: R::Handle,
  labels: L,
  segmenter: Segmenter,
}

impl<R: InferenceRuntime, L: LabelTable> SegmentModel<R, L> {
  pub fn new(runtime: R, labels: L, config: SegmentConfig) -> Result<Self, R::Error> {
    let handle = runtime.load_model()?;
    let outputs = output_tensor_count(&runtime, &handle);
    info!(
      "模型加载完成, 输出数量 {}, 标签数量 {}",
      outputs,
      labels.label_count()
    );
    debug!("后处理配置: {:?}", config);

    Ok(Self {
      runtime,
      handle,
      labels,
      segmenter: Segmenter::new(config),
    })
  }

  pub fn segmenter(&self) -> &Segmenter {
    &self.segmenter
  }
}

impl<R: InferenceRuntime, L: LabelTable> Model for SegmentModel<R, L> {
  type Input = InputTensor;
  type Output = SegmentResult;
  type Error = R::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("执行模型推理");
    let outputs = execute(&self.runtime, &self.handle, input)?;
    debug!("后处理 {} 个模型输出", outputs.len());
    let results = self.segmenter.segment(input, &outputs, &self.labels);
    Ok(results.into())
  }
}

/// 由模型 URL 构造回放模型，查询参数作为后处理配置
pub struct SegmentModelBuilder {
  runtime: ReplayRuntime,
  config: SegmentConfig,
  labels: Labels,
}

impl FromUrl for SegmentModelBuilder {
  type Error = SegmentModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Ok(Self {
      runtime: ReplayRuntime::from_url(url)?,
      config: SegmentConfig::from_url(url)?,
      labels: Labels::coco(),
    })
  }
}

impl SegmentModelBuilder {
  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  pub fn config(mut self, config: SegmentConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build(self) -> Result<SegmentModel<ReplayRuntime, Labels>, SegmentModelError> {
    Ok(SegmentModel::new(self.runtime, self.labels, self.config)?)
  }
}
