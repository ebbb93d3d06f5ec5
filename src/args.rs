// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use kuangxuan::{
  frame::DEFAULT_MAX_SIZE,
  model::{DEFAULT_MAX_ITEMS, DEFAULT_TARGET, DetectType, Prompt},
};

/// Kuangxuan 交互式图像标注
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，如 gemini://generativelanguage.googleapis.com/gemini-1.5-flash?temperature=0.5
  #[arg(long, value_name = "MODEL", default_value = "gemini:///")]
  pub model: Url,

  /// API 密钥
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub api_key: String,

  /// 检测目标的描述
  #[arg(long, default_value = DEFAULT_TARGET)]
  pub target: String,

  /// 每张图像最多标注的数量
  #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
  pub max_items: usize,

  /// 检测类型: 2d, 3d, points
  #[arg(long, default_value = "2d")]
  pub detect_type: DetectType,

  /// 图像最长边的上限（像素）
  #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
  pub max_size: u32,
}

impl Args {
  pub fn prompt(&self) -> Prompt {
    Prompt::new(self.detect_type, self.target.clone(), self.max_items)
  }
}
