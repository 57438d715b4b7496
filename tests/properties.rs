// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/properties.rs - 分割后处理性质测试
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

use proptest::prelude::*;
use shanan_seg::{
  config::SegmentConfig,
  frame::{FrameLayout, InputTensor},
  kernel::{Grid, Interpolation, Resampler},
  model::PrototypeBank,
  model::decode_detections,
  segment,
  tensor::OutputTensor,
  topology::DetectionHead,
};

fn grid_strategy() -> impl Strategy<Value = Grid> {
  (1usize..12, 1usize..12).prop_flat_map(|(w, h)| {
    prop::collection::vec(-10.0f32..10.0, w * h)
      .prop_map(move |data| Grid::new(w, h, data).unwrap())
  })
}

proptest! {
  #[test]
  fn same_size_resampling_is_identity(grid in grid_strategy()) {
    for interpolation in [Interpolation::Nearest, Interpolation::Bilinear] {
      let size = (grid.width(), grid.height());
      let resampled = Resampler::new(size, size, interpolation).resample(&grid);
      prop_assert_eq!(resampled.as_slice(), grid.as_slice());
    }
  }

  #[test]
  fn constant_grid_stays_constant(
    value in -10.0f32..10.0,
    src in (1usize..10, 1usize..10),
    dst in (1usize..40, 1usize..40),
  ) {
    let grid = Grid::filled(src.0, src.1, value);
    for interpolation in [Interpolation::Nearest, Interpolation::Bilinear] {
      let resampled = Resampler::new(src, dst, interpolation).resample(&grid);
      prop_assert_eq!((resampled.width(), resampled.height()), dst);
      prop_assert!(resampled.as_slice().iter().all(|&v| v == value));
    }
  }

  #[test]
  fn binary_dense_mask_matches_confidence(
    (w, h, data) in (1usize..16, 1usize..16).prop_flat_map(|(w, h)| {
      (Just(w), Just(h), prop::collection::vec(0.0f32..1.0, w * h))
    })
  ) {
    let input = InputTensor::zeros(FrameLayout::Nchw, w, h);
    let outputs = [OutputTensor::from_f32(&[h, w, 1], data.clone()).unwrap()];
    let results = segment(&input, &outputs, &Vec::<String>::new());

    prop_assert_eq!(results.len(), 1);
    let mask = &results[0].mask;
    prop_assert!(mask.as_slice().iter().all(|&v| v <= 1));
    for (bit, value) in mask.as_slice().iter().zip(&data) {
      prop_assert_eq!(*bit == 1, *value >= 0.5);
    }
    let expected = mask.foreground_count() as f32 / (w * h) as f32;
    prop_assert_eq!(results[0].confidence, expected);
  }

  #[test]
  fn multiclass_masks_partition_the_image(
    (w, h, data) in (1usize..12, 1usize..12).prop_flat_map(|(w, h)| {
      (Just(w), Just(h), prop::collection::vec(-5.0f32..5.0, w * h * 3))
    })
  ) {
    let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let input = InputTensor::zeros(FrameLayout::Nchw, w, h);
    let outputs = [OutputTensor::from_f32(&[1, h, w, 3], data).unwrap()];
    let results = segment(&input, &outputs, &labels);

    let mut coverage = vec![0u32; w * h];
    for result in &results {
      prop_assert!(result.mask.foreground_count() > 0);
      for (sum, &bit) in coverage.iter_mut().zip(result.mask.as_slice()) {
        *sum += bit as u32;
      }
    }
    prop_assert!(coverage.iter().all(|&n| n == 1));

    let total: f32 = results.iter().map(|r| r.confidence).sum();
    prop_assert!((total - 1.0).abs() < 1e-4);
    prop_assert!(results.windows(2).all(|p| p[0].confidence >= p[1].confidence));
  }

  #[test]
  fn detections_respect_threshold_and_bounds(
    data in prop::collection::vec(-3.0f32..3.0, 8 * 16),
    threshold in 0.05f32..0.95,
    (w, h) in (1usize..200, 1usize..200),
  ) {
    // 4 个框分量, 3 个类别, 1 个系数, 16 个锚点
    let head = DetectionHead::new(8, 16, 3).unwrap();
    let tensor = OutputTensor::from_f32(&[1, 8, 16], data).unwrap();
    let config = SegmentConfig::default().with_confidence_threshold(threshold);

    for detection in decode_detections(&tensor, &head, w, h, &config) {
      prop_assert!(detection.score >= threshold);
      prop_assert!(detection.class_index < 3);
      prop_assert!(detection.bbox.x1 < detection.bbox.x2);
      prop_assert!(detection.bbox.y1 < detection.bbox.y2);
      prop_assert!(detection.bbox.x2 < w && detection.bbox.y2 < h);
      prop_assert_eq!(detection.mask_coefficients.len(), 1);
    }
  }

  #[test]
  fn zero_coefficients_give_half_probability(
    (k, w, h, data) in (1usize..6, 1usize..8, 1usize..8).prop_flat_map(|(k, w, h)| {
      (Just(k), Just(w), Just(h), prop::collection::vec(-10.0f32..10.0, k * w * h))
    })
  ) {
    let bank = PrototypeBank::new(k, h, w, data).unwrap();
    let grid = bank.compose(&vec![0.0; k]).unwrap();
    prop_assert!(grid.as_slice().iter().all(|&v| v == 0.5));
  }
}
