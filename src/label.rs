// 该文件是 Shanan （山南西风） 项目的一部分。
// src/label.rs - 标签表
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

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub trait LabelTable {
  fn label_count(&self) -> usize;
  fn label_at(&self, index: usize) -> Option<&str>;

  /// 超出标签表时回退为 `Class <index>`
  fn label_or_fallback(&self, index: usize) -> String {
    self
      .label_at(index)
      .map(str::to_string)
      .unwrap_or_else(|| format!("Class {}", index))
  }
}

impl LabelTable for [String] {
  fn label_count(&self) -> usize {
    self.len()
  }

  fn label_at(&self, index: usize) -> Option<&str> {
    self.get(index).map(String::as_str)
  }
}

impl LabelTable for Vec<String> {
  fn label_count(&self) -> usize {
    self.len()
  }

  fn label_at(&self, index: usize) -> Option<&str> {
    self.get(index).map(String::as_str)
  }
}

impl LabelTable for [&str] {
  fn label_count(&self) -> usize {
    self.len()
  }

  fn label_at(&self, index: usize) -> Option<&str> {
    self.get(index).copied()
  }
}

impl<T: LabelTable + ?Sized> LabelTable for &T {
  fn label_count(&self) -> usize {
    (**self).label_count()
  }

  fn label_at(&self, index: usize) -> Option<&str> {
    (**self).label_at(index)
  }
}

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
}

/// TOML 标签文件，格式为 `labels = ["background", "person", ...]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Labels {
  labels: Vec<String>,
}

impl Labels {
  pub fn new(labels: Vec<String>) -> Self {
    Self { labels }
  }

  pub fn coco() -> Self {
    Self::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
  }

  pub fn from_toml_str(content: &str) -> Result<Self, LabelError> {
    Ok(toml::from_str(content)?)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let labels = Self::from_toml_str(&content)?;
    debug!(
      "从 {} 读取 {} 个标签",
      path.as_ref().display(),
      labels.label_count()
    );
    Ok(labels)
  }
}

impl LabelTable for Labels {
  fn label_count(&self) -> usize {
    self.labels.len()
  }

  fn label_at(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }
}
