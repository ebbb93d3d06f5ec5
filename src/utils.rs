// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/utils.rs - 通用工具函数
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

use std::{path::PathBuf, str::FromStr};

use tracing::warn;
use url::Url;

/// 解码 URL 路径中的百分号编码，得到本地文件路径
pub fn url_path(url: &Url) -> Result<PathBuf, std::string::FromUtf8Error> {
  let path = urlencoding::decode(url.path())?;
  Ok(PathBuf::from(path.into_owned()))
}

/// 读取查询参数并解析，缺失时返回 `None`，解析失败时记录警告并返回 `None`
pub fn query_value<T: FromStr>(url: &Url, key: &str) -> Option<T> {
  let (_, value) = url.query_pairs().find(|(k, _)| k == key)?;
  match value.parse() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!("查询参数 {} 的值无法解析: {}", key, value);
      None
    }
  }
}

/// 查询参数是否存在（不关心取值）
pub fn query_flag(url: &Url, key: &str) -> bool {
  url.query_pairs().any(|(k, _)| k == key)
}

/// 当前 UTC 时间的毫秒时间戳
pub fn epoch_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}
