// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{DynamicImage, ImageReader, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameLayout, InputTensor, RGB_CHANNELS},
  input::ImagePreprocessor,
  tensor::TensorError,
};

const DEFAULT_INPUT_SIZE: usize = 640;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("输入张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("参数 {0} 无效: {1}")]
  InvalidQuery(String, String),
}

/// 缩放到 (width, height) 并按像素类型的最大值归一化到 [0, 1]
pub fn normalize_image(
  image: &DynamicImage,
  width: usize,
  height: usize,
  layout: FrameLayout,
) -> Result<InputTensor, TensorError> {
  let rgb = image.to_rgb32f();
  let resized = image::imageops::resize(&rgb, width as u32, height as u32, FilterType::Triangle);

  let plane = width * height;
  let mut data = vec![0.0f32; plane * RGB_CHANNELS];
  for (x, y, pixel) in resized.enumerate_pixels() {
    let (x, y) = (x as usize, y as usize);
    for c in 0..RGB_CHANNELS {
      let index = match layout {
        FrameLayout::Nchw => c * plane + y * width + x,
        FrameLayout::Nhwc => (y * width + x) * RGB_CHANNELS + c,
      };
      data[index] = pixel[c].clamp(0.0, 1.0);
    }
  }

  InputTensor::new(layout, width, height, RGB_CHANNELS, data)
}

/// 按路径读取图像的预处理器
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFilePreprocessor {
  pub layout: FrameLayout,
}

impl ImagePreprocessor for ImageFilePreprocessor {
  type Error = ImageFileInputError;

  fn to_input_tensor(
    &self,
    path: &Path,
    width: usize,
    height: usize,
  ) -> Result<InputTensor, Self::Error> {
    let image = ImageReader::open(path)?.decode()?;
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );
    Ok(normalize_image(&image, width, height, self.layout)?)
  }
}

/// `image:///path/to/file.jpg?width=640&height=640&layout=nchw`
pub struct ImageFileInput {
  tensor: Option<InputTensor>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let mut width = DEFAULT_INPUT_SIZE;
    let mut height = DEFAULT_INPUT_SIZE;
    let mut preprocessor = ImageFilePreprocessor::default();
    for (k, v) in url.query_pairs() {
      let invalid = |reason: String| ImageFileInputError::InvalidQuery(k.to_string(), reason);
      match &*k {
        "width" => width = v.parse().map_err(|e| invalid(format!("{}", e)))?,
        "height" => height = v.parse().map_err(|e| invalid(format!("{}", e)))?,
        "layout" => preprocessor.layout = v.parse().map_err(invalid)?,
        _ => {}
      }
    }

    let tensor = preprocessor.to_input_tensor(Path::new(url.path()), width, height)?;
    Ok(ImageFileInput {
      tensor: Some(tensor),
    })
  }
}

impl ImageFileInput {
  pub fn from_tensor(tensor: InputTensor) -> Self {
    Self {
      tensor: Some(tensor),
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = InputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}
