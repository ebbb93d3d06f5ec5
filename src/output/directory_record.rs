// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::Annotations,
  output::{
    Render,
    draw::{Draw, DrawAnnotationsOnFrame, DrawError},
  },
  utils::{query_flag, url_path},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("字体错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("无效的目录路径: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

/// 与标注图像同名的 JSON 记录
#[derive(Serialize)]
struct Record<'a> {
  image: &'a str,
  width: u32,
  height: u32,
  #[serde(flatten)]
  annotations: &'a Annotations,
}

/// 按日期分目录保存标注图像和记录，地址形如 `folder:///dir?always&font=/path.ttf`
///
/// 没有检测结果的图像默认不保存，带上 `always` 时全部保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    Ok(DirectoryRecordOutput::new(
      url_path(uri)?,
      Draw::from_url(uri)?,
      query_flag(uri, "always"),
    ))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: PathBuf, draw: Draw, always: bool) -> Self {
    Self {
      directory,
      draw,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, std::io::Error> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(
    path: &Path,
    frame: &ImageFrame,
    result: &Annotations,
  ) -> Result<(), DirectoryRecordOutputError> {
    let record = Record {
      image: frame.name(),
      width: frame.width(),
      height: frame.height(),
      annotations: result,
    };
    std::fs::write(
      path.with_extension("json"),
      serde_json::to_string_pretty(&record)?,
    )?;
    Ok(())
  }
}

impl Render<ImageFrame, Annotations> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &Annotations) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("{} 没有检测结果，跳过保存", frame.name());
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.draw_annotations(frame, result).save(&path)?;
    Self::write_record(&path, frame, result)?;
    info!("记录标注结果: {}", path.display());
    Ok(())
  }
}
