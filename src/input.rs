// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input.rs - 图像输入
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
use tracing::{debug, info};

use crate::{
  FromUrl,
  frame::{FrameError, ImageFrame},
};

/// 允许上传的图像扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// 判断路径扩展名是否为支持的图像格式（不区分大小写）
pub fn is_supported_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
    })
    .unwrap_or(false)
}

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("不支持的图像格式: {0}")]
  UnsupportedFormat(String),
  #[error("读取文件失败: {0}")]
  ReadError(#[from] std::io::Error),
  #[error("图像解码失败: {0}")]
  DecodeError(#[from] image::ImageError),
  #[error("图像帧构建失败: {0}")]
  FrameError(#[from] FrameError),
}

/// 读取并解码一张图像，缩放到 `max_size` 以内
///
/// 文件读取失败与解码失败分别报告为 [`LoadError::ReadError`] 和
/// [`LoadError::DecodeError`]。
pub fn load_image_frame(path: &Path, max_size: u32) -> Result<ImageFrame, LoadError> {
  if !is_supported_image(path) {
    return Err(LoadError::UnsupportedFormat(path.display().to_string()));
  }

  let bytes = std::fs::read(path)?;
  info!(
    "开始处理文件: {}, 大小: {:.2}KB",
    path.display(),
    bytes.len() as f64 / 1024.0
  );

  let image = image::load_from_memory(&bytes)?;
  debug!("图像加载完成，原始尺寸: {}x{}", image.width(), image.height());

  let name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string());
  Ok(ImageFrame::from_dynamic(name, image, max_size)?)
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "read_image_folder")]
mod read_image_folder;
#[cfg(feature = "read_image_folder")]
pub use self::read_image_folder::{ImageFolderInput, ImageFolderInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_folder")]
  #[error("图像目录输入错误: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_image_folder")]
  ReadImageFolder(ImageFolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    #[cfg(feature = "read_image_folder")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFolderInput::SCHEME {
        let input = ImageFolderInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFolder(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl IntoIterator for InputWrapper {
  type Item = ImageFrame;
  type IntoIter = InputWrapperIter;

  fn into_iter(self) -> Self::IntoIter {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => InputWrapperIter::ReadImageFile(input.into_iter()),
      #[cfg(feature = "read_image_folder")]
      InputWrapper::ReadImageFolder(input) => {
        InputWrapperIter::ReadImageFolder(input.into_iter())
      }
    }
  }
}

pub enum InputWrapperIter {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(self::read_image_file::ImageFileInputIter),
  #[cfg(feature = "read_image_folder")]
  ReadImageFolder(self::read_image_folder::ImageFolderInputIter),
}

impl Iterator for InputWrapperIter {
  type Item = ImageFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapperIter::ReadImageFile(input) => input.next(),
      #[cfg(feature = "read_image_folder")]
      InputWrapperIter::ReadImageFolder(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn supported_extensions_ignore_case() {
    assert!(is_supported_image(Path::new("a/b/tower.JPG")));
    assert!(is_supported_image(Path::new("tower.webp")));
    assert!(is_supported_image(Path::new("tower.jpeg")));
    assert!(!is_supported_image(Path::new("tower.gif")));
    assert!(!is_supported_image(Path::new("tower")));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
