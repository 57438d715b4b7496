// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/replay_runtime.rs - 回放运行时测试
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

use shanan_seg::{
  FromUrl,
  config::SegmentConfig,
  frame::{FrameLayout, InputTensor},
  label::Labels,
  model::{Model, SegmentModel, SegmentModelBuilder},
  runtime::{
    InferenceRuntime, ReplayError, ReplayRuntime, execute, output_tensor_count,
  },
  tensor::OutputTensor,
};
use url::Url;

fn replay_url(path: &Path, query: &str) -> Url {
  Url::parse(&format!("replay://{}{}", path.display(), query)).unwrap()
}

fn dense_outputs() -> Vec<OutputTensor> {
  vec![OutputTensor::from_f32(&[2, 2, 1], vec![0.9, 0.1, 0.2, 0.8]).unwrap()]
}

#[test]
fn recorded_outputs_replay_unchanged() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  let outputs = vec![
    OutputTensor::from_f32(&[1, 3], vec![0.25, -1.5, 3.0]).unwrap(),
    OutputTensor::from_u8(&[2, 2], vec![0, 1, 128, 255]).unwrap(),
    OutputTensor::from_i32(&[1], vec![-7]).unwrap(),
  ];
  ReplayRuntime::record(&outputs, &path).unwrap();

  let runtime = ReplayRuntime::new(&path);
  let handle = runtime.load_model().unwrap();
  assert_eq!(output_tensor_count(&runtime, &handle), 3);
  assert_eq!(&*runtime.output_shape(&handle, 1).unwrap(), &[2, 2]);
  assert!(matches!(
    runtime.output_shape(&handle, 3),
    Err(ReplayError::NoSuchOutput(3))
  ));

  let input = InputTensor::zeros(FrameLayout::Nchw, 2, 2);
  assert_eq!(execute(&runtime, &handle, &input).unwrap(), outputs);
}

#[test]
fn load_model_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  ReplayRuntime::record(&dense_outputs(), &path).unwrap();

  let runtime = ReplayRuntime::new(&path);
  let first = runtime.load_model().unwrap();
  // 删除文件后再次加载仍返回已加载的模型
  std::fs::remove_file(&path).unwrap();
  let second = runtime.load_model().unwrap();
  assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn single_output_runs_single() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  ReplayRuntime::record(&dense_outputs(), &path).unwrap();

  let runtime = ReplayRuntime::new(&path);
  let handle = runtime.load_model().unwrap();
  let input = InputTensor::zeros(FrameLayout::Nhwc, 2, 2);
  let outputs = execute(&runtime, &handle, &input).unwrap();
  assert_eq!(outputs, dense_outputs());
}

#[test]
fn hand_written_recording_defaults_to_f32() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  std::fs::write(
    &path,
    r#"{"outputs": [{"shape": [1, 1, 1], "data": [0.7]}]}"#,
  )
  .unwrap();

  let runtime = ReplayRuntime::new(&path);
  let handle = runtime.load_model().unwrap();
  let outputs = handle.outputs();
  assert_eq!(outputs.len(), 1);
  assert_eq!(outputs[0].shape(), &[1, 1, 1]);
  assert!((outputs[0].value_at(0) - 0.7).abs() < 1e-6);
}

#[test]
fn malformed_recordings_are_errors() {
  let dir = tempfile::tempdir().unwrap();

  let missing = ReplayRuntime::new(dir.path().join("missing.json"));
  assert!(matches!(missing.load_model(), Err(ReplayError::IoError(_))));

  let broken = dir.path().join("broken.json");
  std::fs::write(&broken, "not json").unwrap();
  assert!(matches!(
    ReplayRuntime::new(&broken).load_model(),
    Err(ReplayError::JsonError(_))
  ));

  let mismatch = dir.path().join("mismatch.json");
  std::fs::write(&mismatch, r#"{"outputs": [{"shape": [2, 2], "data": [1.0]}]}"#).unwrap();
  assert!(matches!(
    ReplayRuntime::new(&mismatch).load_model(),
    Err(ReplayError::TensorError(_))
  ));
}

#[test]
fn integer_recordings_reject_unrepresentable_values() {
  let dir = tempfile::tempdir().unwrap();
  let cases = [
    ("u8", "300"),
    ("u8", "-1"),
    ("u8", "0.5"),
    ("i32", "1.25"),
    ("i32", "3000000000"),
  ];
  for (index, (dtype, value)) in cases.into_iter().enumerate() {
    let path = dir.path().join(format!("invalid-{}.json", index));
    std::fs::write(
      &path,
      format!(r#"{{"outputs": [{{"shape": [1], "dtype": "{}", "data": [{}]}}]}}"#, dtype, value),
    )
    .unwrap();
    assert!(
      matches!(
        ReplayRuntime::new(&path).load_model(),
        Err(ReplayError::InvalidValue { .. })
      ),
      "{} {}",
      dtype,
      value
    );
  }
}

#[test]
fn integer_recordings_keep_boundary_values() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("bounds.json");
  std::fs::write(
    &path,
    r#"{"outputs": [
      {"shape": [2], "dtype": "u8", "data": [0, 255]},
      {"shape": [2], "dtype": "i32", "data": [-2147483648, 2147483647]}
    ]}"#,
  )
  .unwrap();

  let handle = ReplayRuntime::new(&path).load_model().unwrap();
  let outputs = handle.outputs();
  assert_eq!(outputs[0], OutputTensor::from_u8(&[2], vec![0, 255]).unwrap());
  assert_eq!(
    outputs[1],
    OutputTensor::from_i32(&[2], vec![i32::MIN, i32::MAX]).unwrap()
  );
}

#[test]
fn scheme_must_be_replay() {
  let url = Url::parse("rknn:///models/seg.rknn").unwrap();
  assert!(matches!(
    ReplayRuntime::from_url(&url),
    Err(ReplayError::SchemeMismatch(_))
  ));
}

#[test]
fn segment_model_infers_from_recording() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  ReplayRuntime::record(&dense_outputs(), &path).unwrap();

  let model = SegmentModel::new(
    ReplayRuntime::new(&path),
    Vec::<String>::new(),
    SegmentConfig::default(),
  )
  .unwrap();
  let input = InputTensor::zeros(FrameLayout::Nchw, 2, 2);
  let result = model.infer(&input).unwrap();

  assert_eq!(result.len(), 1);
  let item = result.iter().next().unwrap();
  assert_eq!(item.label, "foreground");
  assert_eq!(item.mask.as_slice(), &[1, 0, 0, 1]);
  assert_eq!(item.confidence, 0.5);
}

#[test]
fn segment_model_propagates_runtime_errors() {
  let dir = tempfile::tempdir().unwrap();
  let result = SegmentModel::new(
    ReplayRuntime::new(dir.path().join("missing.json")),
    Labels::coco(),
    SegmentConfig::default(),
  );
  assert!(matches!(result, Err(ReplayError::IoError(_))));
}

#[test]
fn builder_reads_config_from_query() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("outputs.json");
  ReplayRuntime::record(&dense_outputs(), &path).unwrap();

  let url = replay_url(&path, "?conf=0.4&mask=0.6&max_det=7&interp=nearest");
  let model = SegmentModelBuilder::from_url(&url)
    .unwrap()
    .labels(Labels::new(vec!["bg".into(), "leaf".into()]))
    .build()
    .unwrap();

  let config = model.segmenter().config();
  assert_eq!(config.confidence_threshold, 0.4);
  assert_eq!(config.mask_threshold, 0.6);
  assert_eq!(config.max_detections, 7);

  let input = InputTensor::zeros(FrameLayout::Nchw, 2, 2);
  let result = model.infer(&input).unwrap();
  assert_eq!(result.iter().next().unwrap().label, "leaf");
}

#[test]
fn builder_rejects_invalid_config() {
  let dir = tempfile::tempdir().unwrap();
  let url = replay_url(&dir.path().join("outputs.json"), "?conf=2.0");
  assert!(SegmentModelBuilder::from_url(&url).is_err());
}
