// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/dataset.rs - COCO 全景分割数据集
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  annotation::{AnnotationError, AnnotationIndex},
  config::{DEFAULT_MASK_SIZE, DEFAULT_NUM_CLASSES, DatasetConfig, Split},
  frame::OneHotLabel,
  mask::{LabelError, expand_one_hot, pixel_to_class_id, resize_nearest},
  transform::{Identity, Normalize, Transform},
};

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("标注错误: {0}")]
  Annotation(#[from] AnnotationError),
  #[error("索引 {index} 超出数据集长度 {len}")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("图像 {image_id} 没有对应的全景标注")]
  Lookup { image_id: u64 },
  #[error("全景掩码不存在: {0}")]
  NotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("标签错误: {0}")]
  Label(#[from] LabelError),
}

/// 按下标取样本的数据集
pub trait Dataset {
  type Item;
  type Error;

  fn get(&self, index: usize) -> Result<Self::Item, Self::Error>;
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn iter(&self) -> DatasetIter<'_, Self>
  where
    Self: Sized,
  {
    DatasetIter {
      dataset: self,
      index: 0,
    }
  }
}

pub struct DatasetIter<'a, D> {
  dataset: &'a D,
  index: usize,
}

impl<D: Dataset> Iterator for DatasetIter<'_, D> {
  type Item = Result<D::Item, D::Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.index >= self.dataset.len() {
      return None;
    }
    let item = self.dataset.get(self.index);
    self.index += 1;
    Some(item)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.dataset.len().saturating_sub(self.index);
    (remaining, Some(remaining))
  }
}

fn decode_rgb(path: &Path) -> Result<RgbImage, DatasetError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  Ok(image.to_rgb8())
}

pub struct PanopticDatasetBuilder<I = Identity, L = Identity> {
  images_dir: PathBuf,
  panoptic_dir: PathBuf,
  annotations_file: PathBuf,
  num_classes: u32,
  mask_size: (u32, u32),
  image_transform: I,
  label_transform: L,
}

impl PanopticDatasetBuilder {
  pub fn new<A, B, C>(images_dir: A, panoptic_dir: B, annotations_file: C) -> Self
  where
    A: Into<PathBuf>,
    B: Into<PathBuf>,
    C: Into<PathBuf>,
  {
    PanopticDatasetBuilder {
      images_dir: images_dir.into(),
      panoptic_dir: panoptic_dir.into(),
      annotations_file: annotations_file.into(),
      num_classes: DEFAULT_NUM_CLASSES,
      mask_size: DEFAULT_MASK_SIZE,
      image_transform: Identity,
      label_transform: Identity,
    }
  }

  pub fn from_config(config: &DatasetConfig) -> Self {
    let paths = &config.paths;
    PanopticDatasetBuilder::new(
      &paths.images_dir,
      &paths.panoptic_dir,
      &paths.annotations_file,
    )
    .num_classes(config.num_classes)
    .mask_size(config.mask_size.0, config.mask_size.1)
  }
}

impl<I, L> PanopticDatasetBuilder<I, L> {
  pub fn num_classes(mut self, num_classes: u32) -> Self {
    self.num_classes = num_classes;
    self
  }

  /// 掩码缩放的目标分辨率，与图像变换的尺寸相互独立
  pub fn mask_size(mut self, width: u32, height: u32) -> Self {
    self.mask_size = (width, height);
    self
  }

  pub fn image_transform<T>(self, transform: T) -> PanopticDatasetBuilder<T, L>
  where
    T: Transform<RgbImage>,
  {
    PanopticDatasetBuilder {
      images_dir: self.images_dir,
      panoptic_dir: self.panoptic_dir,
      annotations_file: self.annotations_file,
      num_classes: self.num_classes,
      mask_size: self.mask_size,
      image_transform: transform,
      label_transform: self.label_transform,
    }
  }

  pub fn label_transform<T>(self, transform: T) -> PanopticDatasetBuilder<I, T>
  where
    T: Transform<OneHotLabel>,
  {
    PanopticDatasetBuilder {
      images_dir: self.images_dir,
      panoptic_dir: self.panoptic_dir,
      annotations_file: self.annotations_file,
      num_classes: self.num_classes,
      mask_size: self.mask_size,
      image_transform: self.image_transform,
      label_transform: transform,
    }
  }

  pub fn build(self) -> Result<PanopticDataset<I, L>, DatasetError> {
    if self.num_classes == 0 {
      return Err(LabelError::ZeroClasses.into());
    }

    let index = AnnotationIndex::load(&self.annotations_file)?;
    info!(
      "数据集就绪: {} 个样本, 图像目录 {}, 掩码目录 {}",
      index.len(),
      self.images_dir.display(),
      self.panoptic_dir.display()
    );

    Ok(PanopticDataset {
      images_dir: self.images_dir,
      panoptic_dir: self.panoptic_dir,
      num_classes: self.num_classes,
      mask_size: self.mask_size,
      index,
      image_transform: self.image_transform,
      label_transform: self.label_transform,
    })
  }
}

/// COCO 全景分割数据集，样本为 (图像, one-hot 标签)
pub struct PanopticDataset<I = Identity, L = Identity> {
  images_dir: PathBuf,
  panoptic_dir: PathBuf,
  num_classes: u32,
  mask_size: (u32, u32),
  index: AnnotationIndex,
  image_transform: I,
  label_transform: L,
}

impl<I, L> PanopticDataset<I, L> {
  pub fn index(&self) -> &AnnotationIndex {
    &self.index
  }

  pub fn num_classes(&self) -> u32 {
    self.num_classes
  }

  pub fn mask_size(&self) -> (u32, u32) {
    self.mask_size
  }

  /// 读取掩码并生成 one-hot 标签，不经过用户变换
  pub fn load_label(&self, index: usize) -> Result<OneHotLabel, DatasetError> {
    let (_, mask_path) = self.resolve(index)?;
    self.label_from_mask(&mask_path)
  }

  fn resolve(&self, index: usize) -> Result<(PathBuf, PathBuf), DatasetError> {
    let image = self.index.image(index).ok_or(DatasetError::IndexOutOfRange {
      index,
      len: self.index.len(),
    })?;
    let ann = self
      .index
      .get(image.id)
      .ok_or(DatasetError::Lookup { image_id: image.id })?;

    Ok((
      self.images_dir.join(&image.file_name),
      self.panoptic_dir.join(&ann.file_name),
    ))
  }

  fn label_from_mask(&self, mask_path: &Path) -> Result<OneHotLabel, DatasetError> {
    if !mask_path.exists() {
      return Err(DatasetError::NotFound(mask_path.to_path_buf()));
    }
    let mask = decode_rgb(mask_path)?;

    let (width, height) = self.mask_size;
    let mask = resize_nearest(&mask, width, height);
    debug!("掩码 {} 缩放到 {}x{}", mask_path.display(), width, height);
    let grid = pixel_to_class_id(&mask, self.num_classes)?;

    Ok(expand_one_hot(&grid, self.num_classes, self.num_classes)?)
  }
}

impl<I, L> Dataset for PanopticDataset<I, L>
where
  I: Transform<RgbImage>,
  L: Transform<OneHotLabel>,
{
  type Item = (I::Output, L::Output);
  type Error = DatasetError;

  fn get(&self, index: usize) -> Result<Self::Item, Self::Error> {
    let (image_path, mask_path) = self.resolve(index)?;
    debug!("读取样本 {}: {}", index, image_path.display());

    let image = decode_rgb(&image_path)?;
    let label = self.label_from_mask(&mask_path)?;

    Ok((
      self.image_transform.apply(image),
      self.label_transform.apply(label),
    ))
  }

  fn len(&self) -> usize {
    self.index.len()
  }
}

/// 默认数据集：图像缩放到 480x480 并按 ImageNet 均值方差归一化，类别数 201
pub fn load_coco_dataset<P: AsRef<Path>>(
  root: P,
  split: Split,
) -> Result<PanopticDataset<Normalize>, DatasetError> {
  let config = DatasetConfig::new(root, split);
  PanopticDatasetBuilder::from_config(&config)
    .image_transform(Normalize::default())
    .build()
}
