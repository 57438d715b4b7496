// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputTensor,
  model::SegmentResult,
  output::{
    Render,
    draw::{Draw, Record, ToRgbImage},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧计数器锁已失效")]
  CounterPoisoned,
}

/// `folder:///path/to/records?record=name&always&plain`
///
/// 每帧写入 `<年>/<月>/<日>/<时-分-秒>-<帧号>.png` 及同名 JSON 记录。
/// `record=id` 时记录中省略标签名，`plain` 时保存原图而非叠加图。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Option<Draw>,
  record: Record,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut output = DirectoryRecordOutput::new(uri.path());
    for (k, v) in uri.query_pairs() {
      match &*k {
        "record" => output.record.label_with_name = v != "id",
        "always" => output.always = true,
        "plain" => output.draw = None,
        _ => {}
      }
    }
    Ok(output)
  }
}

impl DirectoryRecordOutput {
  pub fn new<P: AsRef<Path>>(directory: P) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      draw: Some(Draw::default()),
      record: Record {
        label_with_name: true,
      },
      frame_counter: Mutex::new(0),
      always: false,
    }
  }

  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&self) -> Result<u16, DirectoryRecordOutputError> {
    let mut counter = self
      .frame_counter
      .lock()
      .map_err(|_| DirectoryRecordOutputError::CounterPoisoned)?;
    *counter = counter.wrapping_add(1);
    Ok(*counter)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()?
    )))
  }
}

impl Render<InputTensor, SegmentResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &InputTensor, result: &SegmentResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("无分割结果, 跳过记录");
      return Ok(());
    }

    let path = self.frame_path()?;
    let image = match &self.draw {
      Some(draw) => draw.draw_segmentation(frame, result),
      None => frame.to_rgb_image(),
    };
    image.save(&path)?;
    self.record.record(result, &path)?;
    debug!("记录 {} 个分割结果到 {}", result.len(), path.display());
    Ok(())
  }
}
