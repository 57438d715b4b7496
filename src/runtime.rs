// 该文件是 Shanan （山南西风） 项目的一部分。
// src/runtime.rs - 推理运行时接口
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

use tracing::{debug, warn};

use crate::{frame::InputTensor, tensor::OutputTensor};

/// 输出数量探测的上限
pub const MAX_OUTPUT_QUERIES: usize = 64;

/// 推理运行时。模型句柄由运行时持有并显式传入每次调用。
pub trait InferenceRuntime {
  type Handle;
  type Error: std::error::Error + Send + Sync + 'static;

  /// 已加载时直接返回同一模型的句柄
  fn load_model(&self) -> Result<Self::Handle, Self::Error>;

  /// 第 `index` 个输出的形状，不存在时返回错误
  fn output_shape(&self, handle: &Self::Handle, index: usize) -> Result<Box<[usize]>, Self::Error>;

  fn run_single(&self, handle: &Self::Handle, input: &InputTensor)
  -> Result<OutputTensor, Self::Error>;

  fn run_multi(
    &self,
    handle: &Self::Handle,
    input: &InputTensor,
  ) -> Result<Vec<OutputTensor>, Self::Error>;
}

/// 从 0 开始递增探测，直到取不到输出为止
pub fn output_tensor_count<R: InferenceRuntime>(runtime: &R, handle: &R::Handle) -> usize {
  let mut count = 0;
  while count < MAX_OUTPUT_QUERIES {
    match runtime.output_shape(handle, count) {
      Ok(shape) => {
        debug!("输出 {} 的形状: {:?}", count, shape);
        count += 1;
      }
      Err(e) => {
        debug!("探测输出 {} 结束: {}", count, e);
        return count;
      }
    }
  }
  warn!("输出数量达到探测上限 {}", MAX_OUTPUT_QUERIES);
  count
}

/// 按输出数量选择单输出或多输出执行
pub fn execute<R: InferenceRuntime>(
  runtime: &R,
  handle: &R::Handle,
  input: &InputTensor,
) -> Result<Vec<OutputTensor>, R::Error> {
  if output_tensor_count(runtime, handle) > 1 {
    runtime.run_multi(handle, input)
  } else {
    Ok(vec![runtime.run_single(handle, input)?])
  }
}

mod replay;
pub use self::replay::{ReplayError, ReplayModel, ReplayRuntime};
