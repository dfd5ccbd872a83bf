// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/transform.rs - 样本变换
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

use crate::frame::ImageTensor;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (480, 480);

/// 作用于单个样本的变换
pub trait Transform<In> {
  type Output;
  fn apply(&self, input: In) -> Self::Output;
}

/// 不做任何处理
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T> Transform<T> for Identity {
  type Output = T;

  fn apply(&self, input: T) -> T {
    input
  }
}

impl<In, Out, F> Transform<In> for F
where
  F: Fn(In) -> Out,
{
  type Output = Out;

  fn apply(&self, input: In) -> Out {
    self(input)
  }
}

/// 缩放、转为 [0, 1] 的 CHW 张量，再按通道做均值方差归一化
#[derive(Debug, Clone)]
pub struct Normalize {
  width: u32,
  height: u32,
  mean: [f32; 3],
  std: [f32; 3],
  filter: FilterType,
}

impl Default for Normalize {
  fn default() -> Self {
    let (width, height) = DEFAULT_IMAGE_SIZE;
    Self {
      width,
      height,
      mean: IMAGENET_MEAN,
      std: IMAGENET_STD,
      filter: FilterType::Triangle,
    }
  }
}

impl Normalize {
  pub fn size(mut self, width: u32, height: u32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  pub fn mean_std(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
    self.mean = mean;
    self.std = std;
    self
  }

  pub fn filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }
}

impl Transform<RgbImage> for Normalize {
  type Output = ImageTensor;

  fn apply(&self, image: RgbImage) -> ImageTensor {
    let image = if image.dimensions() == (self.width, self.height) {
      image
    } else {
      image::imageops::resize(&image, self.width, self.height, self.filter)
    };

    let mut tensor = ImageTensor::from(&image);
    let plane = self.width as usize * self.height as usize;
    for (c, channel) in tensor.as_mut().chunks_mut(plane).enumerate() {
      let (mean, std) = (self.mean[c], self.std[c]);
      for value in channel.iter_mut() {
        *value = (*value - mean) / std;
      }
    }
    tensor
  }
}
