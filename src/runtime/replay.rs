// 该文件是 Shanan （山南西风） 项目的一部分。
// src/runtime/replay.rs - 回放录制的推理输出
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

//! 录制文件格式:
//!
//! ```json
//! { "outputs": [ { "shape": [1, 116, 8400], "dtype": "f32", "data": [0.1, ...] } ] }
//! ```

use std::{
  path::{Path, PathBuf},
  sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputTensor,
  runtime::InferenceRuntime,
  tensor::{OutputTensor, TensorData, TensorError},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("录制文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("录制的张量无效: {0}")]
  TensorError(#[from] TensorError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出 {0} 不存在")]
  NoSuchOutput(usize),
  #[error("录制值 {value} 不能表示为 {dtype}")]
  InvalidValue { dtype: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RecordedKind {
  #[default]
  F32,
  U8,
  I32,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordedTensor {
  shape: Vec<usize>,
  #[serde(default)]
  dtype: RecordedKind,
  data: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Recording {
  outputs: Vec<RecordedTensor>,
}

// 整数类型只接受落在取值范围内的整数值
fn to_integer<T: TryFrom<i64>>(
  values: &[f64],
  dtype: &'static str,
) -> Result<Box<[T]>, ReplayError> {
  values
    .iter()
    .map(|&v| {
      let invalid = || ReplayError::InvalidValue { dtype, value: v };
      if !v.is_finite() || v.fract() != 0.0 {
        return Err(invalid());
      }
      T::try_from(v as i64).map_err(|_| invalid())
    })
    .collect()
}

impl TryFrom<RecordedTensor> for OutputTensor {
  type Error = ReplayError;

  fn try_from(recorded: RecordedTensor) -> Result<Self, Self::Error> {
    let data = match recorded.dtype {
      RecordedKind::F32 => TensorData::Float32(recorded.data.iter().map(|&v| v as f32).collect()),
      RecordedKind::U8 => TensorData::UInt8(to_integer(&recorded.data, "u8")?),
      RecordedKind::I32 => TensorData::Int32(to_integer(&recorded.data, "i32")?),
    };
    Ok(OutputTensor::new(&recorded.shape, data)?)
  }
}

impl From<&OutputTensor> for RecordedTensor {
  fn from(tensor: &OutputTensor) -> Self {
    let (dtype, data) = match tensor.data() {
      TensorData::Float32(d) => (RecordedKind::F32, d.iter().map(|&v| v as f64).collect()),
      TensorData::UInt8(d) => (RecordedKind::U8, d.iter().map(|&v| v as f64).collect()),
      TensorData::Int32(d) => (RecordedKind::I32, d.iter().map(|&v| v as f64).collect()),
    };
    Self {
      shape: tensor.shape().to_vec(),
      dtype,
      data,
    }
  }
}

/// 一次录制的全部输出
#[derive(Debug)]
pub struct ReplayModel {
  outputs: Box<[OutputTensor]>,
}

impl ReplayModel {
  pub fn outputs(&self) -> &[OutputTensor] {
    &self.outputs
  }

  fn output(&self, index: usize) -> Result<&OutputTensor, ReplayError> {
    self
      .outputs
      .get(index)
      .ok_or(ReplayError::NoSuchOutput(index))
  }
}

/// 将录制的输出张量当作推理结果返回的运行时，输入内容不参与计算
pub struct ReplayRuntime {
  path: PathBuf,
  model: OnceLock<Arc<ReplayModel>>,
}

impl FromUrlWithScheme for ReplayRuntime {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayRuntime {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(Self::new(url.path()))
  }
}

impl ReplayRuntime {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      model: OnceLock::new(),
    }
  }

  /// 将输出张量写成录制文件
  pub fn record(outputs: &[OutputTensor], path: impl AsRef<Path>) -> Result<(), ReplayError> {
    let recording = Recording {
      outputs: outputs.iter().map(RecordedTensor::from).collect(),
    };
    std::fs::write(path.as_ref(), serde_json::to_vec(&recording)?)?;
    Ok(())
  }

  fn read(&self) -> Result<ReplayModel, ReplayError> {
    info!("加载录制文件: {}", self.path.display());
    let content = std::fs::read(&self.path)?;
    debug!(
      "录制文件大小: {:.2} MB",
      content.len() as f64 / (1024.0 * 1024.0)
    );
    let recording: Recording = serde_json::from_slice(&content)?;
    let outputs = recording
      .outputs
      .into_iter()
      .map(OutputTensor::try_from)
      .collect::<Result<Vec<_>, _>>()?;
    info!("录制文件加载完成, 共 {} 个输出", outputs.len());
    Ok(ReplayModel {
      outputs: outputs.into_boxed_slice(),
    })
  }
}

impl InferenceRuntime for ReplayRuntime {
  type Handle = Arc<ReplayModel>;
  type Error = ReplayError;

  fn load_model(&self) -> Result<Self::Handle, Self::Error> {
    if let Some(model) = self.model.get() {
      return Ok(model.clone());
    }
    let model = Arc::new(self.read()?);
    Ok(self.model.get_or_init(|| model).clone())
  }

  fn output_shape(&self, handle: &Self::Handle, index: usize) -> Result<Box<[usize]>, Self::Error> {
    Ok(handle.output(index)?.shape().into())
  }

  fn run_single(
    &self,
    handle: &Self::Handle,
    input: &InputTensor,
  ) -> Result<OutputTensor, Self::Error> {
    debug!("回放单输出, 输入形状 {:?}", input.shape());
    Ok(handle.output(0)?.clone())
  }

  fn run_multi(
    &self,
    handle: &Self::Handle,
    input: &InputTensor,
  ) -> Result<Vec<OutputTensor>, Self::Error> {
    debug!("回放 {} 个输出, 输入形状 {:?}", handle.outputs.len(), input.shape());
    Ok(handle.outputs.to_vec())
  }
}
