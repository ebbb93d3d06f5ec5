// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{DEFAULT_MAX_SIZE, ImageFrame},
  input::{LoadError, load_image_frame},
  utils::{query_value, url_path},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("无效的文件路径: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
  #[error("{0}")]
  LoadError(#[from] LoadError),
}

/// 单张图像输入，URL 形如 `image:///path/to/file.png?max_size=640`
pub struct ImageFileInput {
  frame: Option<ImageFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_path(url)?;
    let max_size = query_value(url, "max_size").unwrap_or(DEFAULT_MAX_SIZE);
    Self::open(&path, max_size)
  }
}

impl ImageFileInput {
  pub fn open(path: &Path, max_size: u32) -> Result<Self, ImageFileInputError> {
    let frame = load_image_frame(path, max_size)?;
    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl IntoIterator for ImageFileInput {
  type Item = ImageFrame;
  type IntoIter = ImageFileInputIter;

  fn into_iter(self) -> Self::IntoIter {
    ImageFileInputIter { inner: self }
  }
}

pub struct ImageFileInputIter {
  inner: ImageFileInput,
}

impl Iterator for ImageFileInputIter {
  type Item = ImageFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.frame.take()
  }
}
