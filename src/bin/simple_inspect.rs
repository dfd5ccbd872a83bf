// 该文件是 Panoptic Loader （全景分割数据加载） 项目的一部分。
// src/bin/simple_inspect.rs - 数据集检查工具
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

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use panoptic_loader::{
  Dataset, FromUrl, PanopticDatasetBuilder,
  config::DatasetConfig,
  frame::OneHotLabel,
  transform::{DEFAULT_IMAGE_SIZE, Normalize},
};

/// 数据集检查参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集地址，例如 panoptic:///data/COCOPanoptic?split=train
  #[arg(long, value_name = "DATASET")]
  pub dataset: Url,
  /// 检查的样本数量
  #[arg(long, default_value = "4", value_name = "COUNT")]
  pub count: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("数据集地址: {}", args.dataset);

  let config = DatasetConfig::from_url(&args.dataset)?;
  let (width, height) = config.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
  let dataset = PanopticDatasetBuilder::from_config(&config)
    .image_transform(Normalize::default().size(width, height))
    .build()?;

  info!("样本总数: {}", dataset.len());
  if dataset.is_empty() {
    warn!("数据集为空");
    return Ok(());
  }

  let now = std::time::Instant::now();
  for (index, sample) in dataset.iter().take(args.count).enumerate() {
    let (image, label) = sample?;
    info!(
      "样本 {}: 图像 {:?}, 标签 {:?}",
      index,
      image.shape(),
      label.shape()
    );
    log_top_classes(&label);
  }
  info!("检查完成，耗时: {:.2?}", now.elapsed());

  Ok(())
}

fn log_top_classes(label: &OneHotLabel) {
  let mut classes: Vec<(u32, usize)> = (0..label.channels())
    .map(|c| (c, label.channel(c).iter().filter(|&&v| v > 0.5).count()))
    .filter(|&(_, count)| count > 0)
    .collect();
  classes.sort_by(|a, b| b.1.cmp(&a.1));
  for (class_id, count) in classes.iter().take(5) {
    info!("  - 类别 {}: {} 像素", class_id, count);
  }
}
