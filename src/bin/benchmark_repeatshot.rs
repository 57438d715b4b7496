// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复分割推理基准
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_seg::{
  FromUrl,
  input::ImageFileInput,
  label::Labels,
  model::SegmentModelBuilder,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// 分割推理基准参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出回放文件，查询参数为后处理配置
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// TOML 标签文件，缺省为 COCO 类别
  #[arg(long, value_name = "LABELS")]
  pub labels: Option<PathBuf>,
  /// 模型输入宽度
  #[arg(long)]
  pub width: Option<usize>,
  /// 模型输入高度
  #[arg(long)]
  pub height: Option<usize>,
  /// 重复次数，前两次为预热
  #[arg(long, default_value_t = 1000)]
  pub repeat: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut input_url = args.input.clone();
  if let Some(width) = args.width {
    input_url
      .query_pairs_mut()
      .append_pair("width", &width.to_string());
  }
  if let Some(height) = args.height {
    input_url
      .query_pairs_mut()
      .append_pair("height", &height.to_string());
  }

  let labels = match &args.labels {
    Some(path) => Labels::from_path(path)?,
    None => Labels::coco(),
  };

  let input = ImageFileInput::from_url(&input_url)?;
  let model = SegmentModelBuilder::from_url(&args.model)?
    .labels(labels)
    .build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_repeat(args.repeat)
    .run_task(input, model, output)?;

  Ok(())
}
