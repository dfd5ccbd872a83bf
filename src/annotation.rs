// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/annotation.rs - COCO 全景标注索引
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

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AnnotationError {
  #[error("无法打开标注文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("标注文件解析错误: {0}")]
  Parse(#[from] serde_json::Error),
}

/// 图像记录，决定数据集的顺序与长度
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRecord {
  pub id: u64,
  pub file_name: String,
  #[serde(default)]
  pub width: Option<u32>,
  #[serde(default)]
  pub height: Option<u32>,
}

/// 全景标注记录，`file_name` 指向全景掩码图像
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnnotationRecord {
  pub image_id: u64,
  pub file_name: String,
}

#[derive(Deserialize)]
struct PanopticMetadata {
  images: Vec<ImageRecord>,
  annotations: Vec<AnnotationRecord>,
}

/// 标注索引，构建后只读
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
  images: Vec<ImageRecord>,
  annotations: HashMap<u64, AnnotationRecord>,
}

impl AnnotationIndex {
  /// 从 JSON 标注文件加载索引
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnnotationError> {
    let path = path.as_ref();
    info!("加载标注文件: {}", path.display());
    let file = File::open(path)?;
    Self::from_reader(BufReader::new(file))
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self, AnnotationError> {
    let metadata: PanopticMetadata = serde_json::from_reader(reader)?;
    Ok(Self::from_records(metadata.images, metadata.annotations))
  }

  /// 同一 `image_id` 出现多次时，后出现的记录覆盖先前的记录
  pub fn from_records(images: Vec<ImageRecord>, annotations: Vec<AnnotationRecord>) -> Self {
    let mut map = HashMap::with_capacity(annotations.len());
    for ann in annotations {
      if let Some(previous) = map.insert(ann.image_id, ann) {
        warn!(
          "重复的标注 image_id {}，覆盖先前的掩码 {}",
          previous.image_id, previous.file_name
        );
      }
    }

    if images.len() != map.len() {
      debug!("图像数 {} 与标注数 {} 不一致", images.len(), map.len());
    }
    info!("标注索引构建完成: {} 张图像, {} 条标注", images.len(), map.len());

    AnnotationIndex {
      images,
      annotations: map,
    }
  }

  pub fn images(&self) -> &[ImageRecord] {
    &self.images
  }

  pub fn image(&self, position: usize) -> Option<&ImageRecord> {
    self.images.get(position)
  }

  pub fn get(&self, image_id: u64) -> Option<&AnnotationRecord> {
    self.annotations.get(&image_id)
  }

  pub fn len(&self) -> usize {
    self.images.len()
  }

  pub fn is_empty(&self) -> bool {
    self.images.is_empty()
  }
}
