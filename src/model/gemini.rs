// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/gemini.rs - Gemini 视觉模型客户端
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

use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Annotations, DetectionInput, Model, NormalizeError, normalize_response},
  utils::query_value,
};

const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_API_VERSION: &str = "v1beta";
const DEFAULT_TEMPERATURE: f32 = 0.5;
#[cfg(feature = "gemini")]
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum GeminiError {
  #[error("模型地址必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
  #[error("缺少 API 密钥")]
  MissingApiKey,
  #[cfg(feature = "gemini")]
  #[error("HTTP 请求失败: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("API 返回错误状态 {status}: {body}")]
  Status { status: u16, body: String },
  #[error("传输错误: {0}")]
  Transport(String),
  #[error("模型响应中没有文本内容")]
  EmptyResponse,
  #[error("响应解析失败: {0}")]
  NormalizeError(#[from] NormalizeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
  pub mime_type: String,
  pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  #[serde(default)]
  pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
  pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
  pub contents: Vec<Content>,
  pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
  /// 单轮请求：先是提示词文本，再是内联的 base64 图像
  pub fn single_image(prompt: String, mime_type: &str, data: &str, temperature: f32) -> Self {
    Self {
      contents: vec![Content {
        role: Some("user".to_string()),
        parts: vec![
          Part {
            text: Some(prompt),
            inline_data: None,
          },
          Part {
            text: None,
            inline_data: Some(InlineData {
              mime_type: mime_type.to_string(),
              data: data.to_string(),
            }),
          },
        ],
      }],
      generation_config: GenerationConfig { temperature },
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
  #[serde(default)]
  pub content: Option<Content>,
  #[serde(default)]
  pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentResponse {
  #[serde(default)]
  pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
  /// 第一个候选结果中所有文本片段的拼接
  pub fn text(&self) -> Option<String> {
    let content = self.candidates.first()?.content.as_ref()?;
    let text: String = content
      .parts
      .iter()
      .filter_map(|part| part.text.as_deref())
      .collect();
    if text.is_empty() { None } else { Some(text) }
  }
}

/// 请求的发送方式，整个请求要么完整返回要么失败
pub trait Transport {
  fn generate_content(
    &self,
    request: &GenerateContentRequest,
  ) -> Result<GenerateContentResponse, GeminiError>;
}

#[cfg(feature = "gemini")]
pub struct HttpTransport {
  client: reqwest::blocking::Client,
  endpoint: String,
  api_key: String,
}

#[cfg(feature = "gemini")]
impl HttpTransport {
  pub fn new(
    endpoint: String,
    api_key: String,
    timeout: std::time::Duration,
  ) -> Result<Self, GeminiError> {
    let client = reqwest::blocking::Client::builder()
      .timeout(timeout)
      .build()?;
    Ok(Self {
      client,
      endpoint,
      api_key,
    })
  }
}

#[cfg(feature = "gemini")]
impl Transport for HttpTransport {
  fn generate_content(
    &self,
    request: &GenerateContentRequest,
  ) -> Result<GenerateContentResponse, GeminiError> {
    debug!("发送图像识别请求: {}", self.endpoint);
    let response = self
      .client
      .post(&self.endpoint)
      .header("x-goog-api-key", &self.api_key)
      .json(request)
      .send()?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(GeminiError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response.json()?)
  }
}

/// Gemini 构建器，地址形如
/// `gemini://generativelanguage.googleapis.com/gemini-1.5-flash?api_version=v1beta&temperature=0.5`
#[derive(Debug, Clone)]
pub struct GeminiBuilder {
  host: String,
  model: String,
  api_version: String,
  temperature: f32,
  api_key: Option<String>,
  #[cfg(feature = "gemini")]
  timeout: std::time::Duration,
}

impl Default for GeminiBuilder {
  fn default() -> Self {
    Self {
      host: DEFAULT_HOST.to_string(),
      model: DEFAULT_MODEL.to_string(),
      api_version: DEFAULT_API_VERSION.to_string(),
      temperature: DEFAULT_TEMPERATURE,
      api_key: None,
      #[cfg(feature = "gemini")]
      timeout: std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }
}

impl FromUrlWithScheme for GeminiBuilder {
  const SCHEME: &'static str = "gemini";
}

impl FromUrl for GeminiBuilder {
  type Error = GeminiError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GeminiError::SchemeMismatch(Self::SCHEME));
    }

    let mut builder = GeminiBuilder::default();
    if let Some(host) = url.host_str().filter(|host| !host.is_empty()) {
      builder.host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
      };
    }

    let model = url.path().trim_matches('/');
    let model = model.strip_prefix("models/").unwrap_or(model);
    if !model.is_empty() {
      builder.model = model.to_string();
    }

    if let Some(api_version) = query_value(url, "api_version") {
      builder.api_version = api_version;
    }
    if let Some(temperature) = query_value(url, "temperature") {
      builder.temperature = temperature;
    }
    #[cfg(feature = "gemini")]
    {
      if let Some(timeout) = query_value(url, "timeout") {
        builder.timeout = std::time::Duration::from_secs(timeout);
      }
    }

    Ok(builder)
  }
}

impl GeminiBuilder {
  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  pub fn model_name(&self) -> &str {
    &self.model
  }

  pub fn endpoint(&self) -> String {
    format!(
      "https://{}/{}/models/{}:generateContent",
      self.host, self.api_version, self.model
    )
  }

  #[cfg(feature = "gemini")]
  pub fn build(self) -> Result<Gemini<HttpTransport>, GeminiError> {
    let api_key = self
      .api_key
      .clone()
      .filter(|key| !key.is_empty())
      .ok_or(GeminiError::MissingApiKey)?;
    info!("创建 API 客户端: {}", self.endpoint());
    let transport = HttpTransport::new(self.endpoint(), api_key, self.timeout)?;
    Ok(self.build_with(transport))
  }

  /// 使用自定义的传输方式构建模型
  pub fn build_with<T: Transport>(self, transport: T) -> Gemini<T> {
    Gemini {
      transport,
      model: self.model,
      temperature: self.temperature,
    }
  }
}

pub struct Gemini<T> {
  transport: T,
  model: String,
  temperature: f32,
}

impl<T> Gemini<T> {
  pub fn model_name(&self) -> &str {
    &self.model
  }
}

impl<T: Transport> Model for Gemini<T> {
  type Input = DetectionInput;
  type Output = Annotations;
  type Error = GeminiError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let request = GenerateContentRequest::single_image(
      input.prompt.render(),
      input.frame.mime_type(),
      input.frame.base64_payload(),
      self.temperature,
    );

    info!("开始调用 Gemini API, 模型: {}", self.model);
    let now = Instant::now();
    let response = self.transport.generate_content(&request)?;
    info!("收到 API 响应，耗时: {:.2?}", now.elapsed());

    let text = response.text().ok_or(GeminiError::EmptyResponse)?;
    debug!("模型响应: {}", text);
    self.postprocess(input, &text)
  }

  fn postprocess(&self, input: &Self::Input, output: &str) -> Result<Self::Output, Self::Error> {
    Ok(normalize_response(output, input.prompt.detect_type)?)
  }
}
