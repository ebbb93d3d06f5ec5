// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model.rs - 模型与检测结果定义
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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::ImageFrame;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
  fn postprocess(&self, input: &Self::Input, output: &str) -> Result<Self::Output, Self::Error>;
}

/// 检测类型，同时决定提示词与标注记录的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetectType {
  #[default]
  #[serde(rename = "2D bounding boxes")]
  BoundingBoxes2D,
  #[serde(rename = "3D bounding boxes")]
  BoundingBoxes3D,
  #[serde(rename = "Points")]
  Points,
}

impl DetectType {
  pub const ALL: [DetectType; 3] = [
    DetectType::BoundingBoxes2D,
    DetectType::BoundingBoxes3D,
    DetectType::Points,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      DetectType::BoundingBoxes2D => "2D bounding boxes",
      DetectType::BoundingBoxes3D => "3D bounding boxes",
      DetectType::Points => "Points",
    }
  }
}

impl fmt::Display for DetectType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的检测类型: {0}（可选 2d, 3d, points）")]
pub struct UnknownDetectType(pub String);

impl FromStr for DetectType {
  type Err = UnknownDetectType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "2d" | "box" | "boxes" | "2d bounding boxes" => Ok(DetectType::BoundingBoxes2D),
      "3d" | "3d bounding boxes" => Ok(DetectType::BoundingBoxes3D),
      "point" | "points" => Ok(DetectType::Points),
      _ => Err(UnknownDetectType(s.to_string())),
    }
  }
}

/// 二维边界框，坐标为相对图像宽高的 [0, 1] 小数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub label: String,
}

/// 三维边界框：中心、尺寸与弧度制的横滚/俯仰/偏航角
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox3D {
  pub center: [f32; 3],
  pub size: [f32; 3],
  pub rpy: [f32; 3],
  pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
  pub point: Point2D,
  pub label: String,
}

/// 一组同类型的标注，类型标签与内容分别序列化为 `type` 和 `annotations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "annotations")]
pub enum Annotations {
  #[serde(rename = "2D bounding boxes")]
  BoundingBoxes2D(Vec<BoundingBox2D>),
  #[serde(rename = "3D bounding boxes")]
  BoundingBoxes3D(Vec<BoundingBox3D>),
  #[serde(rename = "Points")]
  Points(Vec<LabeledPoint>),
}

impl Default for Annotations {
  fn default() -> Self {
    Annotations::empty(DetectType::default())
  }
}

impl Annotations {
  pub fn empty(detect_type: DetectType) -> Self {
    match detect_type {
      DetectType::BoundingBoxes2D => Annotations::BoundingBoxes2D(Vec::new()),
      DetectType::BoundingBoxes3D => Annotations::BoundingBoxes3D(Vec::new()),
      DetectType::Points => Annotations::Points(Vec::new()),
    }
  }

  pub fn detect_type(&self) -> DetectType {
    match self {
      Annotations::BoundingBoxes2D(_) => DetectType::BoundingBoxes2D,
      Annotations::BoundingBoxes3D(_) => DetectType::BoundingBoxes3D,
      Annotations::Points(_) => DetectType::Points,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Annotations::BoundingBoxes2D(items) => items.len(),
      Annotations::BoundingBoxes3D(items) => items.len(),
      Annotations::Points(items) => items.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn labels(&self) -> Vec<&str> {
    match self {
      Annotations::BoundingBoxes2D(items) => items.iter().map(|b| b.label.as_str()).collect(),
      Annotations::BoundingBoxes3D(items) => items.iter().map(|b| b.label.as_str()).collect(),
      Annotations::Points(items) => items.iter().map(|p| p.label.as_str()).collect(),
    }
  }
}

/// 一次检测请求：待标注的图像帧以及提示词
#[derive(Debug, Clone)]
pub struct DetectionInput {
  pub frame: ImageFrame,
  pub prompt: Prompt,
}

pub mod normalize;
pub use self::normalize::{GRID_SIZE, NormalizeError, extract_json, normalize_response};

mod prompt;
pub use self::prompt::{DEFAULT_MAX_ITEMS, DEFAULT_TARGET, Prompt};

mod gemini;
#[cfg(feature = "gemini")]
pub use self::gemini::HttpTransport;
pub use self::gemini::{
  Content, Gemini, GeminiBuilder, GeminiError, GenerateContentRequest, GenerateContentResponse,
  GenerationConfig, InlineData, Part, Transport,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detect_type_parses_short_and_full_names() {
    assert_eq!("2d".parse(), Ok(DetectType::BoundingBoxes2D));
    assert_eq!("3D bounding boxes".parse(), Ok(DetectType::BoundingBoxes3D));
    assert_eq!(" Points ".parse(), Ok(DetectType::Points));
    assert_eq!(
      "polygon".parse::<DetectType>(),
      Err(UnknownDetectType("polygon".to_string()))
    );
    assert_eq!(
      UnknownDetectType("polygon".to_string()).to_string(),
      "未知的检测类型: polygon（可选 2d, 3d, points）"
    );
  }

  #[test]
  fn annotations_serialize_with_type_tag() {
    let annotations = Annotations::Points(vec![LabeledPoint {
      point: Point2D { x: 0.5, y: 0.25 },
      label: "door".to_string(),
    }]);
    let value = serde_json::to_value(&annotations).unwrap();
    assert_eq!(value["type"], "Points");
    assert_eq!(value["annotations"][0]["label"], "door");
    assert_eq!(value["annotations"][0]["point"]["x"], 0.5);

    let back: Annotations = serde_json::from_value(value).unwrap();
    assert_eq!(back, annotations);
  }

  #[test]
  fn empty_annotations_keep_their_type() {
    for detect_type in DetectType::ALL {
      let empty = Annotations::empty(detect_type);
      assert_eq!(empty.detect_type(), detect_type);
      assert!(empty.is_empty());
    }
  }
}
