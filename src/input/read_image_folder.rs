// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/read_image_folder.rs - 图像目录输入
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

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{DEFAULT_MAX_SIZE, ImageFrame},
  input::{is_supported_image, load_image_frame},
  utils::{query_value, url_path},
};

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("无效的目录路径: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 目录输入，按文件名顺序逐张读取支持的图像
///
/// URL 形如 `folder:///path/to/dir?max_size=640`。单张图像读取或解码失败时
/// 记录错误并跳过，不中断整个目录。
pub struct ImageFolderInput {
  files: Vec<PathBuf>,
  max_size: u32,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemaMismatch);
    }

    let path = url_path(url)?;
    let max_size = query_value(url, "max_size").unwrap_or(DEFAULT_MAX_SIZE);
    Self::open(&path, max_size)
  }
}

impl ImageFolderInput {
  pub fn open(directory: &Path, max_size: u32) -> Result<Self, ImageFolderInputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_supported_image(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(ImageFolderInput { files, max_size })
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl IntoIterator for ImageFolderInput {
  type Item = ImageFrame;
  type IntoIter = ImageFolderInputIter;

  fn into_iter(self) -> Self::IntoIter {
    ImageFolderInputIter {
      files: self.files.into_iter(),
      max_size: self.max_size,
    }
  }
}

pub struct ImageFolderInputIter {
  files: std::vec::IntoIter<PathBuf>,
  max_size: u32,
}

impl Iterator for ImageFolderInputIter {
  type Item = ImageFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match load_image_frame(&path, self.max_size) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("处理图像 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn lists_supported_images_in_name_order_and_skips_broken_ones() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
      .save(dir.path().join("b.png"))
      .unwrap();
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
      .save(dir.path().join("a.png"))
      .unwrap();
    std::fs::write(dir.path().join("c.jpg"), b"broken").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let input = ImageFolderInput::open(dir.path(), DEFAULT_MAX_SIZE).unwrap();
    assert_eq!(input.len(), 3);

    let names: Vec<String> = input
      .into_iter()
      .map(|frame| frame.name().to_string())
      .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
  }

  #[test]
  fn missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageFolderInput::open(&dir.path().join("nope"), DEFAULT_MAX_SIZE),
      Err(ImageFolderInputError::IoError(_))
    ));
  }
}
