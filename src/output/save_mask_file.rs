// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_mask_file.rs - 保存叠加图与掩码文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputTensor,
  model::{SegmentResult, SegmentationResult},
  output::{
    Render,
    draw::{Draw, mask_to_gray_image},
  },
};

/// `image:///path/to/overlay.png`
///
/// 叠加图写到给定路径，每个掩码另存为 `<stem>-<序号>-<标签>.png`。
pub struct SaveMaskFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveMaskFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("掩码尺寸与数据长度不一致: {0}x{1}")]
  MaskSizeMismatch(usize, usize),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveMaskFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveMaskFileOutput {
  type Error = SaveMaskFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveMaskFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveMaskFileOutput::new(uri.path()))
  }
}

impl SaveMaskFileOutput {
  pub fn new<P: AsRef<Path>>(path: P) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      draw: Draw::default(),
    }
  }

  pub fn mask_path(&self, index: usize, item: &SegmentationResult) -> PathBuf {
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "mask".to_string());
    let label: String = item
      .label
      .chars()
      .map(|c| if c.is_alphanumeric() { c } else { '_' })
      .collect();
    self
      .path
      .with_file_name(format!("{}-{}-{}.png", stem, index, label))
  }

  fn save(&self, frame: &InputTensor, result: &SegmentResult) -> Result<(), SaveMaskFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    self.draw.draw_segmentation(frame, result).save(&self.path)?;
    warn!("保存叠加图像到文件: {}", self.path.display());

    for (index, item) in result.iter().enumerate() {
      let mask = mask_to_gray_image(&item.mask)
        .ok_or(SaveMaskFileError::MaskSizeMismatch(item.mask.width(), item.mask.height()))?;
      let path = self.mask_path(index, item);
      mask.save(&path)?;
      debug!("保存掩码 {} ({}) 到 {}", index, item.label, path.display());
    }

    Ok(())
  }
}

impl Render<InputTensor, SegmentResult> for SaveMaskFileOutput {
  type Error = SaveMaskFileError;

  fn render_result(&self, frame: &InputTensor, result: &SegmentResult) -> Result<(), Self::Error> {
    self.save(frame, result)
  }
}
