// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/mask.rs - 全景掩码到 one-hot 标签的转换
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, trace};

use crate::frame::{ClassIdGrid, OneHotLabel};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LabelError {
  #[error("类别数必须大于 0")]
  ZeroClasses,
  #[error("类别编号 {class_id} 超出范围 [0, {num_classes})")]
  OutOfRange { class_id: u32, num_classes: u32 },
}

/// 将 RGB 三通道拼成 24 位段编号，再对类别数取模
///
/// 编号不同的段可能映射到同一类别，这一行为需要保持不变。
pub fn pixel_to_class_id(mask: &RgbImage, num_classes: u32) -> Result<ClassIdGrid, LabelError> {
  if num_classes == 0 {
    return Err(LabelError::ZeroClasses);
  }

  let (width, height) = mask.dimensions();
  let mut grid = ClassIdGrid::with_shape(height, width);
  let slice = grid.as_mut();
  for (x, y, pixel) in mask.enumerate_pixels() {
    let [r, g, b] = pixel.0;
    let segment_id = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
    slice[y as usize * width as usize + x as usize] = segment_id % num_classes;
  }

  trace!("类别网格: {:?}", grid);
  Ok(grid)
}

/// 展开为 `target_channels` 个通道的 one-hot 张量
///
/// 先按 `num_classes` 构造通道；`target_channels` 更大时补零通道，
/// 更小时只保留前 `target_channels` 个通道，被截掉类别的像素全为 0。
pub fn expand_one_hot(
  grid: &ClassIdGrid,
  num_classes: u32,
  target_channels: u32,
) -> Result<OneHotLabel, LabelError> {
  if let Some(&class_id) = grid.as_slice().iter().find(|&&id| id >= num_classes) {
    return Err(LabelError::OutOfRange {
      class_id,
      num_classes,
    });
  }

  debug!("类别数量: {}", grid.unique_count());

  let (height, width) = (grid.height(), grid.width());
  let plane = height as usize * width as usize;
  let mut label = OneHotLabel::with_shape(target_channels, height, width);
  let slice = label.as_mut();
  for (pixel, &class_id) in grid.as_slice().iter().enumerate() {
    // 截断后的类别没有对应通道
    if class_id < target_channels {
      slice[class_id as usize * plane + pixel] = 1.0;
    }
  }

  if target_channels < num_classes {
    debug!("截断 one-hot 通道: {} -> {}", num_classes, target_channels);
  } else if target_channels > num_classes {
    debug!("补齐 one-hot 通道: {} -> {}", num_classes, target_channels);
  }

  Ok(label)
}

/// 最近邻缩放，保证不会混合出新的颜色
pub fn resize_nearest(mask: &RgbImage, width: u32, height: u32) -> RgbImage {
  if mask.dimensions() == (width, height) {
    return mask.clone();
  }
  image::imageops::resize(mask, width, height, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;
  use std::collections::HashSet;

  fn single(r: u8, g: u8, b: u8, num_classes: u32) -> u32 {
    let mask = RgbImage::from_pixel(1, 1, Rgb([r, g, b]));
    pixel_to_class_id(&mask, num_classes).unwrap().get(0, 0)
  }

  #[test]
  fn packs_rgb_then_wraps() {
    assert_eq!(single(0, 0, 0, 201), 0);
    assert_eq!(single(0, 0, 201, 201), 0);
    assert_eq!(single(0, 0, 200, 201), 200);
    assert_eq!(single(1, 0, 0, 201), 10);
    assert_eq!(single(0, 1, 0, 201), 256 % 201);
    assert_eq!(single(255, 255, 255, 201), 0xFF_FFFF % 201);
  }

  #[test]
  fn distinct_segments_can_collide() {
    assert_eq!(single(0, 0, 5, 201), single(0, 0, 206, 201));
  }

  #[test]
  fn class_ids_are_deterministic() {
    let mut mask = RgbImage::new(3, 2);
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
      *pixel = Rgb([x as u8 * 40, y as u8 * 90, 17]);
    }
    let a = pixel_to_class_id(&mask, 201).unwrap();
    let b = pixel_to_class_id(&mask, 201).unwrap();
    assert_eq!(a, b);
    assert!(a.as_slice().iter().all(|&id| id < 201));
  }

  #[test]
  fn zero_classes_is_rejected() {
    let mask = RgbImage::new(1, 1);
    assert_eq!(pixel_to_class_id(&mask, 0), Err(LabelError::ZeroClasses));
  }

  #[test]
  fn one_hot_shape_follows_target_channels() {
    let grid = ClassIdGrid::from_vec(2, 3, vec![0, 1, 2, 3, 4, 0]).unwrap();
    for target in [1, 3, 5, 8] {
      let label = expand_one_hot(&grid, 5, target).unwrap();
      assert_eq!(label.shape(), [target as usize, 2, 3]);
      assert!(label.as_slice().iter().all(|&v| v == 0.0 || v == 1.0));
    }
  }

  #[test]
  fn channel_sum_is_one_below_target_and_zero_above() {
    let grid = ClassIdGrid::from_vec(1, 5, vec![0, 1, 2, 3, 4]).unwrap();
    let label = expand_one_hot(&grid, 5, 3).unwrap();
    for x in 0..5 {
      let expected = if grid.get(x, 0) < 3 { 1.0 } else { 0.0 };
      assert_eq!(label.channel_sum(x, 0), expected);
    }
  }

  #[test]
  fn padded_channels_are_zero() {
    let grid = ClassIdGrid::from_vec(1, 2, vec![0, 1]).unwrap();
    let label = expand_one_hot(&grid, 2, 4).unwrap();
    assert!(label.channel(2).iter().all(|&v| v == 0.0));
    assert!(label.channel(3).iter().all(|&v| v == 0.0));
    assert_eq!(label.channel(1), &[0.0, 1.0]);
  }

  #[test]
  fn argmax_restores_grid() {
    let ids: Vec<u32> = (0..12).map(|i| (i * 7) % 5).collect();
    let grid = ClassIdGrid::from_vec(3, 4, ids).unwrap();
    let label = expand_one_hot(&grid, 5, 5).unwrap();
    assert_eq!(label.argmax(), Some(grid));
  }

  #[test]
  fn out_of_range_class_id_fails() {
    let grid = ClassIdGrid::from_vec(1, 2, vec![1, 9]).unwrap();
    assert_eq!(
      expand_one_hot(&grid, 5, 5),
      Err(LabelError::OutOfRange {
        class_id: 9,
        num_classes: 5
      })
    );
  }

  #[test]
  fn nearest_resize_keeps_original_colours() {
    let palette = [Rgb([1, 2, 3]), Rgb([0, 0, 201]), Rgb([250, 10, 99])];
    let mut mask = RgbImage::new(5, 3);
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
      *pixel = palette[((x + y) % 3) as usize];
    }

    let original: HashSet<_> = palette.iter().map(|p| p.0).collect();
    for (w, h) in [(11, 7), (2, 2), (256, 256)] {
      let resized = resize_nearest(&mask, w, h);
      assert_eq!(resized.dimensions(), (w, h));
      assert!(resized.pixels().all(|p| original.contains(&p.0)));

      let before: HashSet<u32> = pixel_to_class_id(&mask, 201)
        .unwrap()
        .as_slice()
        .iter()
        .copied()
        .collect();
      let after = pixel_to_class_id(&resized, 201).unwrap();
      assert!(after.as_slice().iter().all(|id| before.contains(id)));
    }
  }
}
