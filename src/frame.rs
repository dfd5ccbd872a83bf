// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/frame.rs - CHW 张量定义
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

use image::RgbImage;
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct ShapeMismatch {
  pub expected: usize,
  pub actual: usize,
}

fn check_len(expected: usize, actual: usize) -> Result<(), ShapeMismatch> {
  if expected != actual {
    return Err(ShapeMismatch { expected, actual });
  }
  Ok(())
}

/// 每像素一个类别编号的二维网格，按行存储
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIdGrid {
  width: u32,
  height: u32,
  data: Box<[u32]>,
}

impl ClassIdGrid {
  pub fn with_shape(height: u32, width: u32) -> Self {
    let data = vec![0u32; height as usize * width as usize].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn from_vec(height: u32, width: u32, data: Vec<u32>) -> Result<Self, ShapeMismatch> {
    check_len(height as usize * width as usize, data.len())?;
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn get(&self, x: u32, y: u32) -> u32 {
    self.data[y as usize * self.width as usize + x as usize]
  }

  pub fn as_slice(&self) -> &[u32] {
    &self.data
  }

  /// 各类别的像素数，超出 `num_classes` 的编号不计入
  pub fn histogram(&self, num_classes: u32) -> Vec<u64> {
    let mut counts = vec![0u64; num_classes as usize];
    for &id in self.data.iter() {
      if let Some(count) = counts.get_mut(id as usize) {
        *count += 1;
      }
    }
    counts
  }

  pub fn unique_count(&self) -> usize {
    let mut ids = self.data.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
  }
}

impl AsMut<[u32]> for ClassIdGrid {
  fn as_mut(&mut self) -> &mut [u32] {
    &mut self.data
  }
}

/// One-hot 标签张量，形状为 (channels, height, width)
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotLabel {
  channels: u32,
  height: u32,
  width: u32,
  data: Box<[f32]>,
}

impl OneHotLabel {
  pub fn with_shape(channels: u32, height: u32, width: u32) -> Self {
    let size = channels as usize * height as usize * width as usize;
    Self {
      channels,
      height,
      width,
      data: vec![0.0f32; size].into_boxed_slice(),
    }
  }

  pub fn channels(&self) -> u32 {
    self.channels
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  /// (channels, height, width)
  pub fn shape(&self) -> [usize; 3] {
    [
      self.channels as usize,
      self.height as usize,
      self.width as usize,
    ]
  }

  fn plane(&self) -> usize {
    self.height as usize * self.width as usize
  }

  pub fn get(&self, channel: u32, x: u32, y: u32) -> f32 {
    let index =
      channel as usize * self.plane() + y as usize * self.width as usize + x as usize;
    self.data[index]
  }

  pub fn channel(&self, channel: u32) -> &[f32] {
    let plane = self.plane();
    let start = channel as usize * plane;
    &self.data[start..start + plane]
  }

  pub fn channel_sum(&self, x: u32, y: u32) -> f32 {
    (0..self.channels).map(|c| self.get(c, x, y)).sum()
  }

  /// 像素处置 1 的通道；没有通道被置位时返回 `None`
  pub fn argmax_at(&self, x: u32, y: u32) -> Option<u32> {
    (0..self.channels).find(|&c| self.get(c, x, y) > 0.5)
  }

  /// 还原类别网格；任一像素没有通道被置位时返回 `None`
  pub fn argmax(&self) -> Option<ClassIdGrid> {
    let mut grid = ClassIdGrid::with_shape(self.height, self.width);
    let width = self.width as usize;
    let slice = grid.as_mut();
    for y in 0..self.height {
      for x in 0..self.width {
        slice[y as usize * width + x as usize] = self.argmax_at(x, y)?;
      }
    }
    Some(grid)
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for OneHotLabel {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

/// RGB 图像张量，形状为 (3, height, width)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
  height: u32,
  width: u32,
  data: Box<[f32]>,
}

impl ImageTensor {
  pub fn with_shape(height: u32, width: u32) -> Self {
    let size = RGB_CHANNELS * height as usize * width as usize;
    Self {
      height,
      width,
      data: vec![0.0f32; size].into_boxed_slice(),
    }
  }

  pub fn from_vec(height: u32, width: u32, data: Vec<f32>) -> Result<Self, ShapeMismatch> {
    check_len(RGB_CHANNELS * height as usize * width as usize, data.len())?;
    Ok(Self {
      height,
      width,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 3] {
    [RGB_CHANNELS, self.height as usize, self.width as usize]
  }

  pub fn get(&self, channel: usize, x: u32, y: u32) -> f32 {
    let index = channel * self.height as usize * self.width as usize
      + y as usize * self.width as usize
      + x as usize;
    self.data[index]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for ImageTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

/// 像素值缩放到 [0, 1]
impl From<&RgbImage> for ImageTensor {
  fn from(image: &RgbImage) -> Self {
    let mut tensor = {
      let (width, height) = image.dimensions();
      ImageTensor::with_shape(height, width)
    };

    let channels = tensor.channels();
    let height = tensor.height() as usize;
    let width = tensor.width() as usize;
    let slice = tensor.as_mut();

    for c in 0..channels {
      for h in 0..height {
        for w in 0..width {
          let pixel = image.get_pixel(w as u32, h as u32);
          let index = c * height * width + h * width + w;
          slice[index] = pixel[c] as f32 / 255.0;
        }
      }
    }
    tensor
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn grid_rejects_wrong_length() {
    let err = ClassIdGrid::from_vec(2, 2, vec![0, 1, 2]).unwrap_err();
    assert_eq!(
      err,
      ShapeMismatch {
        expected: 4,
        actual: 3
      }
    );
  }

  #[test]
  fn grid_histogram_ignores_out_of_range_ids() {
    let grid = ClassIdGrid::from_vec(1, 4, vec![0, 2, 2, 7]).unwrap();
    assert_eq!(grid.histogram(3), vec![1, 0, 2]);
    assert_eq!(grid.unique_count(), 3);
  }

  #[test]
  fn image_tensor_is_channel_major() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 51]));
    image.put_pixel(1, 0, Rgb([0, 255, 0]));

    let tensor = ImageTensor::from(&image);
    assert_eq!(tensor.shape(), [3, 1, 2]);
    assert_eq!(tensor.as_slice(), &[1.0, 0.0, 0.0, 1.0, 0.2, 0.0]);
  }

  #[test]
  fn argmax_of_empty_pixel_is_none() {
    let mut label = OneHotLabel::with_shape(2, 1, 2);
    label.as_mut()[0] = 1.0;
    assert_eq!(label.argmax_at(0, 0), Some(0));
    assert_eq!(label.argmax_at(1, 0), None);
    assert!(label.argmax().is_none());
  }
}
