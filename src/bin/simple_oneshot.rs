// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像标注
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
use url::Url;

use kuangxuan::{
  FromUrl,
  model::{DEFAULT_MAX_ITEMS, DEFAULT_TARGET, DetectType, Prompt},
  task::{OneShotTask, Task},
};
use tracing::info;

/// Kuangxuan 单张图像标注
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL", default_value = "gemini:///")]
  pub model: Url,
  /// 输入图像，如 image:///path/to/photo.jpg?max_size=640
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 image:///tmp/out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// API 密钥
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub api_key: String,
  /// 检测目标的描述
  #[arg(long, default_value = DEFAULT_TARGET)]
  pub target: String,
  /// 检测类型: 2d, 3d, points
  #[arg(long, default_value = "2d")]
  pub detect_type: DetectType,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input_image = kuangxuan::input::ImageFileInput::from_url(&args.input)?;
  let model = kuangxuan::model::GeminiBuilder::from_url(&args.model)?
    .api_key(args.api_key)
    .build()?;
  let output = kuangxuan::output::OutputWrapper::from_url(&args.output)?;

  let report = OneShotTask::default()
    .with_prompt(Prompt::new(args.detect_type, args.target, DEFAULT_MAX_ITEMS))
    .run_task(input_image.into_iter(), model, output)?;
  info!("标注 {} 项", report.annotations);

  Ok(())
}
