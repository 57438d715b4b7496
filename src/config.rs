// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 分割后处理参数
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

use std::str::FromStr;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::kernel::Interpolation;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_DETECTIONS: usize = 100;
/// 标签表缺失时检测族的类别数（COCO）
pub const DEFAULT_NUM_CLASSES: usize = 80;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("参数 {key} 的值 '{value}' 无效: {reason}")]
  InvalidValue {
    key: String,
    value: String,
    reason: String,
  },
}

/// 检测结果置信度的定义
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfidencePolicy {
  /// 检测分数（sigmoid 后的最大类别分数）
  #[default]
  DetectionScore,
  /// 框内前景像素占比
  MaskCoverage,
}

impl FromStr for ConfidencePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "box" | "score" => Ok(ConfidencePolicy::DetectionScore),
      "coverage" | "mask" => Ok(ConfidencePolicy::MaskCoverage),
      other => Err(format!("未知的置信度定义: {}", other)),
    }
  }
}

/// 检测数量达到上限时的取舍方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
  /// 按锚点扫描顺序保留最先通过阈值的 N 个，达到上限即停止扫描。
  /// 这是近似做法，不是按分数排序的前 N 个。
  #[default]
  ScanOrder,
  /// 扫描全部锚点后按分数保留前 N 个
  TopScore,
}

impl FromStr for SelectionPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "scan" => Ok(SelectionPolicy::ScanOrder),
      "top" => Ok(SelectionPolicy::TopScore),
      other => Err(format!("未知的选择方式: {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentConfig {
  pub confidence_threshold: f32,
  pub mask_threshold: f32,
  pub max_detections: usize,
  pub interpolation: Interpolation,
  pub confidence_policy: ConfidencePolicy,
  pub selection: SelectionPolicy,
  pub default_num_classes: usize,
}

impl Default for SegmentConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      mask_threshold: DEFAULT_MASK_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
      interpolation: Interpolation::default(),
      confidence_policy: ConfidencePolicy::default(),
      selection: SelectionPolicy::default(),
      default_num_classes: DEFAULT_NUM_CLASSES,
    }
  }
}

impl SegmentConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_mask_threshold(mut self, threshold: f32) -> Self {
    self.mask_threshold = threshold;
    self
  }

  pub fn with_max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
    self.interpolation = interpolation;
    self
  }

  pub fn with_confidence_policy(mut self, policy: ConfidencePolicy) -> Self {
    self.confidence_policy = policy;
    self
  }

  pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
    self.selection = selection;
    self
  }

  pub fn with_default_num_classes(mut self, num_classes: usize) -> Self {
    self.default_num_classes = num_classes;
    self
  }

  /// 从模型 URL 的查询参数读取配置，未出现的参数取默认值，
  /// 例如 `replay:///tmp/out.json?conf=0.2&mask=0.4&interp=nearest`
  pub fn from_url(url: &Url) -> Result<Self, ConfigError> {
    let mut config = Self::default();
    for (key, value) in url.query_pairs() {
      match &*key {
        "conf" => config.confidence_threshold = parse_unit(&key, &value)?,
        "mask" => config.mask_threshold = parse_unit(&key, &value)?,
        "max_det" => config.max_detections = parse(&key, &value)?,
        "interp" => config.interpolation = parse(&key, &value)?,
        "score" => config.confidence_policy = parse(&key, &value)?,
        "select" => config.selection = parse(&key, &value)?,
        "classes" => config.default_num_classes = parse_class_count(&key, &value)?,
        other => warn!("忽略未知参数: {}={}", other, value),
      }
    }
    Ok(config)
  }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: ToString,
{
  value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
    key: key.to_string(),
    value: value.to_string(),
    reason: e.to_string(),
  })
}

// 阈值必须落在 [0, 1]
fn parse_unit(key: &str, value: &str) -> Result<f32, ConfigError> {
  let parsed: f32 = parse(key, value)?;
  if !(0.0..=1.0).contains(&parsed) {
    return Err(ConfigError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
      reason: "必须位于 [0, 1]".to_string(),
    });
  }
  Ok(parsed)
}

// 类别数至少为 1
fn parse_class_count(key: &str, value: &str) -> Result<usize, ConfigError> {
  let parsed: usize = parse(key, value)?;
  if parsed == 0 {
    return Err(ConfigError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
      reason: "类别数必须大于 0".to_string(),
    });
  }
  Ok(parsed)
}
