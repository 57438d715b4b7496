// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 分割结果可视化与记录
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

use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use serde::Serialize;

use crate::{
  frame::InputTensor,
  model::{Mask, SegmentResult},
};

const MASK_ALPHA: f32 = 0.45;
const PALETTE_SIZE: usize = 80;

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for InputTensor {
  fn to_rgb_image(&self) -> RgbImage {
    let channels = self.channels();
    ImageBuffer::from_fn(self.width() as u32, self.height() as u32, |x, y| {
      let (x, y) = (x as usize, y as usize);
      let mut rgb = [0u8; 3];
      if channels == 0 {
        return Rgb(rgb);
      }
      for (c, value) in rgb.iter_mut().enumerate() {
        // 单通道输入复制到三个通道
        let v = self.pixel(x, y, c.min(channels - 1));
        *value = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
      }
      Rgb(rgb)
    })
  }
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

/// {0, 255} 灰度图
pub fn mask_to_gray_image(mask: &Mask) -> Option<GrayImage> {
  GrayImage::from_raw(
    mask.width() as u32,
    mask.height() as u32,
    mask.to_byte_scale(),
  )
}

pub struct Draw {
  alpha: f32,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    // 80 种色相，按类别取色
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      alpha: MASK_ALPHA,
      colors,
    }
  }
}

impl Draw {
  pub fn class_color(&self, class: usize) -> Rgb<u8> {
    self.colors[class % self.colors.len()]
  }

  /// 半透明叠加掩码并描出检测框
  pub fn draw_segmentation<F: ToRgbImage>(&self, frame: &F, result: &SegmentResult) -> RgbImage {
    let mut image = frame.to_rgb_image();
    for item in result.iter() {
      let color = self.class_color(item.id);
      self.blend_mask(&mut image, &item.mask, color);

      if let Some(bbox) = item.bbox {
        let rect = Rect::at(bbox.x1 as i32, bbox.y1 as i32)
          .of_size(bbox.width() as u32, bbox.height() as u32);
        draw_hollow_rect_mut(&mut image, rect, color);
        // 第二道边框以增加可见度
        if bbox.width() > 2 && bbox.height() > 2 {
          let inner = Rect::at(bbox.x1 as i32 + 1, bbox.y1 as i32 + 1)
            .of_size(bbox.width() as u32 - 2, bbox.height() as u32 - 2);
          draw_hollow_rect_mut(&mut image, inner, color);
        }
      }
    }
    image
  }

  fn blend_mask(&self, image: &mut RgbImage, mask: &Mask, color: Rgb<u8>) {
    let width = mask.width().min(image.width() as usize);
    let height = mask.height().min(image.height() as usize);
    for y in 0..height {
      for x in 0..width {
        if mask.get(x, y) == 0 {
          continue;
        }
        let pixel = image.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
          let blended = pixel[c] as f32 * (1.0 - self.alpha) + color[c] as f32 * self.alpha;
          pixel[c] = blended.round() as u8;
        }
      }
    }
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[derive(Debug, Serialize)]
struct ResultRecord {
  id: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  label: Option<String>,
  confidence: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  bbox: Option<[usize; 4]>,
  area: usize,
}

/// 将分割结果写为 JSON 记录
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn record(&self, result: &SegmentResult, path: &std::path::Path) -> Result<(), std::io::Error> {
    let records: Vec<ResultRecord> = result
      .iter()
      .map(|item| ResultRecord {
        id: item.id,
        label: self.label_with_name.then(|| item.label.clone()),
        confidence: item.confidence,
        bbox: item.bbox.map(|b| [b.x1, b.y1, b.x2, b.y2]),
        area: item.mask.foreground_count(),
      })
      .collect();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path.with_extension("json"), json)?;
    Ok(())
  }
}
