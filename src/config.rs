// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/config.rs - 数据集配置
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
use std::str::FromStr;

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub const DEFAULT_NUM_CLASSES: u32 = 201;
pub const DEFAULT_MASK_SIZE: (u32, u32) = (256, 256);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("无效参数 {key}={value}")]
  InvalidParameter { key: String, value: String },
  #[error("未知数据划分: {0}")]
  UnknownSplit(String),
}

/// 数据集划分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
  #[default]
  Train,
  Valid,
}

impl Split {
  fn tag(self) -> &'static str {
    match self {
      Split::Train => "train2017",
      // 上游的验证集目录名未经确认，必要时通过参数覆盖
      Split::Valid => "valid2017",
    }
  }

  /// 相对数据根目录的默认路径
  pub fn paths<P: AsRef<Path>>(self, root: P) -> DatasetPaths {
    let root = root.as_ref();
    let tag = self.tag();
    DatasetPaths {
      images_dir: root.join("images").join(tag),
      panoptic_dir: root.join("annotations").join(format!("panoptic_{tag}")),
      annotations_file: root
        .join("annotations")
        .join(format!("panoptic_{tag}.json")),
    }
  }
}

impl FromStr for Split {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "train" | "train2017" => Ok(Split::Train),
      "valid" | "val" | "valid2017" => Ok(Split::Valid),
      other => Err(ConfigError::UnknownSplit(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
  pub images_dir: PathBuf,
  pub panoptic_dir: PathBuf,
  pub annotations_file: PathBuf,
}

/// 数据集配置，可由 `panoptic://` URL 构造
///
/// 例如 `panoptic:///data/COCOPanoptic?split=valid&num_classes=133&mask=128x128`。
/// `images`、`panoptic`、`annotations` 参数以根目录为基准覆盖默认路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
  pub paths: DatasetPaths,
  pub num_classes: u32,
  pub mask_size: (u32, u32),
  pub image_size: Option<(u32, u32)>,
}

impl DatasetConfig {
  pub fn new<P: AsRef<Path>>(root: P, split: Split) -> Self {
    DatasetConfig {
      paths: split.paths(root),
      num_classes: DEFAULT_NUM_CLASSES,
      mask_size: DEFAULT_MASK_SIZE,
      image_size: None,
    }
  }
}

fn invalid(key: &str, value: &str) -> ConfigError {
  ConfigError::InvalidParameter {
    key: key.to_string(),
    value: value.to_string(),
  }
}

fn parse_size(key: &str, value: &str) -> Result<(u32, u32), ConfigError> {
  let (w, h) = value.split_once(['x', 'X']).ok_or_else(|| invalid(key, value))?;
  let w: u32 = w.trim().parse().map_err(|_| invalid(key, value))?;
  let h: u32 = h.trim().parse().map_err(|_| invalid(key, value))?;
  if w == 0 || h == 0 {
    return Err(invalid(key, value));
  }
  Ok((w, h))
}

impl FromUrlWithScheme for DatasetConfig {
  const SCHEME: &'static str = "panoptic";
}

impl FromUrl for DatasetConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ConfigError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let root = PathBuf::from(url.path());
    let split = url
      .query_pairs()
      .find(|(k, _)| k == "split")
      .map(|(_, v)| v.parse::<Split>())
      .transpose()?
      .unwrap_or_default();

    let mut config = DatasetConfig::new(&root, split);
    for (key, value) in url.query_pairs() {
      match &*key {
        "split" => {}
        "num_classes" => {
          config.num_classes = value
            .parse()
            .ok()
            .filter(|&n: &u32| n > 0)
            .ok_or_else(|| invalid(&key, &value))?;
        }
        "mask" => config.mask_size = parse_size(&key, &value)?,
        "image" => config.image_size = Some(parse_size(&key, &value)?),
        "images" => config.paths.images_dir = root.join(&*value),
        "panoptic" => config.paths.panoptic_dir = root.join(&*value),
        "annotations" => config.paths.annotations_file = root.join(&*value),
        _ => return Err(invalid(&key, &value)),
      }
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn split_default_paths() {
    let paths = Split::Train.paths("/data/COCOPanoptic");
    assert_eq!(paths.images_dir, PathBuf::from("/data/COCOPanoptic/images/train2017"));
    assert_eq!(
      paths.panoptic_dir,
      PathBuf::from("/data/COCOPanoptic/annotations/panoptic_train2017")
    );
    assert_eq!(
      paths.annotations_file,
      PathBuf::from("/data/COCOPanoptic/annotations/panoptic_train2017.json")
    );

    let valid = Split::Valid.paths("/data");
    assert_eq!(valid.images_dir, PathBuf::from("/data/images/valid2017"));
  }

  #[test]
  fn url_defaults() {
    let url = Url::parse("panoptic:///data/coco").unwrap();
    let config = DatasetConfig::from_url(&url).unwrap();
    assert_eq!(config, DatasetConfig::new("/data/coco", Split::Train));
    assert_eq!(config.num_classes, 201);
    assert_eq!(config.mask_size, (256, 256));
    assert_eq!(config.image_size, None);
  }

  #[test]
  fn url_overrides() {
    let url = Url::parse(
      "panoptic:///data/coco?split=val&num_classes=133&mask=128x64&image=480x480&images=images/val2017",
    )
    .unwrap();
    let config = DatasetConfig::from_url(&url).unwrap();
    assert_eq!(config.num_classes, 133);
    assert_eq!(config.mask_size, (128, 64));
    assert_eq!(config.image_size, Some((480, 480)));
    assert_eq!(config.paths.images_dir, PathBuf::from("/data/coco/images/val2017"));
    assert_eq!(
      config.paths.panoptic_dir,
      PathBuf::from("/data/coco/annotations/panoptic_valid2017")
    );
  }

  #[test]
  fn url_rejects_bad_values() {
    for query in ["num_classes=0", "mask=12", "mask=0x4", "color=red"] {
      let url = Url::parse(&format!("panoptic:///data?{query}")).unwrap();
      assert!(matches!(
        DatasetConfig::from_url(&url),
        Err(ConfigError::InvalidParameter { .. })
      ));
    }

    let url = Url::parse("panoptic:///data?split=test").unwrap();
    assert_eq!(
      DatasetConfig::from_url(&url),
      Err(ConfigError::UnknownSplit("test".to_string()))
    );
  }

  #[test]
  fn url_rejects_other_scheme() {
    let url = Url::parse("image:///data").unwrap();
    assert!(matches!(
      DatasetConfig::from_url(&url),
      Err(ConfigError::SchemeMismatch { .. })
    ));
  }
}
