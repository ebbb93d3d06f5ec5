// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/frame.rs - 待标注图像帧定义
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

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

/// 发送给模型前图像最长边的默认上限
pub const DEFAULT_MAX_SIZE: u32 = 640;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
const BASE64_MARKER: &str = ";base64,";

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像编解码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("Base64 解码错误: {0}")]
  Base64Error(#[from] base64::DecodeError),
  #[error("无效的 data URL")]
  InvalidDataUrl,
}

/// 一帧待标注的图像：缩放后的像素数据以及可显示的 PNG data URL
#[derive(Debug, Clone)]
pub struct ImageFrame {
  name: String,
  image: RgbImage,
  data_url: String,
}

impl ImageFrame {
  /// 由解码后的图像构建帧，超过 `max_size` 的图像按比例缩小
  pub fn from_dynamic(
    name: impl Into<String>,
    image: DynamicImage,
    max_size: u32,
  ) -> Result<Self, FrameError> {
    let (width, height) = (image.width(), image.height());
    let image = downsample(image, max_size);
    debug!(
      "图像尺寸 {}x{} -> {}x{}",
      width,
      height,
      image.width(),
      image.height()
    );
    Self::from_image(name, image.into_rgb8())
  }

  /// 直接由 RGB 图像构建帧，不做缩放
  pub fn from_image(name: impl Into<String>, image: RgbImage) -> Result<Self, FrameError> {
    let data_url = encode_png_data_url(&image)?;
    Ok(Self {
      name: name.into(),
      image,
      data_url,
    })
  }

  /// 由 data URL 还原帧，用于历史记录恢复后的重新渲染
  pub fn from_data_url(name: impl Into<String>, src: &str) -> Result<Self, FrameError> {
    let (header, payload) = src
      .split_once(BASE64_MARKER)
      .ok_or(FrameError::InvalidDataUrl)?;
    if !header.starts_with("data:image/") {
      return Err(FrameError::InvalidDataUrl);
    }
    let bytes = STANDARD.decode(payload)?;
    let image = image::load_from_memory(&bytes)?.into_rgb8();
    Ok(Self {
      name: name.into(),
      image,
      data_url: src.to_string(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn data_url(&self) -> &str {
    &self.data_url
  }

  /// data URL 中的 base64 负载部分，直接作为内联数据发送给模型
  pub fn base64_payload(&self) -> &str {
    self
      .data_url
      .split_once(BASE64_MARKER)
      .map(|(_, payload)| payload)
      .unwrap_or_default()
  }

  pub fn mime_type(&self) -> &str {
    self
      .data_url
      .strip_prefix("data:")
      .and_then(|rest| rest.split_once(BASE64_MARKER))
      .map(|(mime, _)| mime)
      .unwrap_or("image/png")
  }
}

fn downsample(image: DynamicImage, max_size: u32) -> DynamicImage {
  if image.width() <= max_size && image.height() <= max_size {
    return image;
  }
  // resize 保持宽高比，结果落在 max_size x max_size 之内
  image.resize(max_size, max_size, FilterType::Triangle)
}

fn encode_png_data_url(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(format!(
    "{}{}",
    PNG_DATA_URL_PREFIX,
    STANDARD.encode(buffer.into_inner())
  ))
}
