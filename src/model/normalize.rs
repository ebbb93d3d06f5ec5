// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/normalize.rs - 模型响应解析与坐标归一化
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

//! 模型以文本形式返回检测结果，内容是一个 JSON 数组，可能包裹在
//! Markdown 代码块中。坐标位于 0–1000 的整数网格上，这里统一换算为
//! 相对图像宽高的 [0, 1] 小数。

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{
  Annotations, BoundingBox2D, BoundingBox3D, DetectType, LabeledPoint, Point2D,
};

/// 模型坐标网格的边长
pub const GRID_SIZE: f32 = 1000.0;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("JSON 解析失败: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("{label} 的坐标 {value} 超出 0-1000 网格")]
  OutOfGrid { label: String, value: f32 },
  #[error("{0} 的边界框最小值大于最大值")]
  InvertedBox(String),
}

fn grid_fraction(value: f32, label: &str) -> Result<f32, NormalizeError> {
  if (0.0..=GRID_SIZE).contains(&value) {
    Ok(value / GRID_SIZE)
  } else {
    Err(NormalizeError::OutOfGrid {
      label: label.to_string(),
      value,
    })
  }
}

#[derive(Deserialize)]
struct RawBox2D {
  box_2d: [f32; 4], // [ymin, xmin, ymax, xmax]
  label: String,
}

#[derive(Deserialize)]
struct RawPoint {
  point: [f32; 2], // [y, x]
  label: String,
}

#[derive(Deserialize)]
struct RawBox3D {
  box_3d: [f32; 9], // [cx, cy, cz, w, h, l, roll, pitch, yaw]，角度为度
  label: String,
}

impl TryFrom<RawBox2D> for BoundingBox2D {
  type Error = NormalizeError;

  fn try_from(raw: RawBox2D) -> Result<Self, Self::Error> {
    let [ymin, xmin, ymax, xmax] = raw.box_2d;
    for value in raw.box_2d {
      grid_fraction(value, &raw.label)?;
    }
    if xmax < xmin || ymax < ymin {
      return Err(NormalizeError::InvertedBox(raw.label));
    }
    Ok(BoundingBox2D {
      x: xmin / GRID_SIZE,
      y: ymin / GRID_SIZE,
      width: (xmax - xmin) / GRID_SIZE,
      height: (ymax - ymin) / GRID_SIZE,
      label: raw.label,
    })
  }
}

impl TryFrom<RawPoint> for LabeledPoint {
  type Error = NormalizeError;

  fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
    let [y, x] = raw.point;
    Ok(LabeledPoint {
      point: Point2D {
        x: grid_fraction(x, &raw.label)?,
        y: grid_fraction(y, &raw.label)?,
      },
      label: raw.label,
    })
  }
}

impl From<RawBox3D> for BoundingBox3D {
  fn from(raw: RawBox3D) -> Self {
    let [cx, cy, cz, w, h, l, roll, pitch, yaw] = raw.box_3d;
    BoundingBox3D {
      center: [cx, cy, cz],
      size: [w, h, l],
      rpy: [roll.to_radians(), pitch.to_radians(), yaw.to_radians()],
      label: raw.label,
    }
  }
}

/// 取出响应中代码块包裹的内容
///
/// 优先匹配 ```` ```json ````，其次是不带语言标记的 ```` ``` ````；取第一个
/// 开始标记与其后第一个结束标记之间的文本。没有代码块时原样返回。
pub fn extract_json(text: &str) -> &str {
  for marker in [JSON_FENCE, FENCE] {
    if let Some((_, rest)) = text.split_once(marker) {
      let body = rest.split_once(FENCE).map(|(body, _)| body).unwrap_or(rest);
      return body.trim();
    }
  }
  text.trim()
}

/// 将模型响应解析为指定类型的标注，保持原有顺序
pub fn normalize_response(
  text: &str,
  detect_type: DetectType,
) -> Result<Annotations, NormalizeError> {
  let json = extract_json(text);
  let annotations = match detect_type {
    DetectType::BoundingBoxes2D => Annotations::BoundingBoxes2D(
      serde_json::from_str::<Vec<RawBox2D>>(json)?
        .into_iter()
        .map(BoundingBox2D::try_from)
        .collect::<Result<_, _>>()?,
    ),
    DetectType::BoundingBoxes3D => Annotations::BoundingBoxes3D(
      serde_json::from_str::<Vec<RawBox3D>>(json)?
        .into_iter()
        .map(BoundingBox3D::from)
        .collect(),
    ),
    DetectType::Points => Annotations::Points(
      serde_json::from_str::<Vec<RawPoint>>(json)?
        .into_iter()
        .map(LabeledPoint::try_from)
        .collect::<Result<_, _>>()?,
    ),
  };
  debug!("解析得到 {} 条 {} 记录", annotations.len(), detect_type);
  Ok(annotations)
}

#[cfg(test)]
mod tests {
  use super::*;

  const TOWER: &str = r#"[{"box_2d": [100, 200, 300, 400], "label": "tower"}]"#;

  fn boxes(annotations: Annotations) -> Vec<BoundingBox2D> {
    match annotations {
      Annotations::BoundingBoxes2D(boxes) => boxes,
      other => panic!("unexpected annotations: {:?}", other),
    }
  }

  #[test]
  fn converts_grid_box_to_fractions() {
    let boxes = boxes(normalize_response(TOWER, DetectType::BoundingBoxes2D).unwrap());
    assert_eq!(
      boxes,
      vec![BoundingBox2D {
        x: 0.2,
        y: 0.1,
        width: 0.2,
        height: 0.2,
        label: "tower".to_string(),
      }]
    );
  }

  #[test]
  fn fenced_and_bare_responses_agree() {
    let fenced = format!("Here you go:\n```json\n{}\n```\nDone.", TOWER);
    let plain_fence = format!("```\n{}\n```", TOWER);
    let expected = normalize_response(TOWER, DetectType::BoundingBoxes2D).unwrap();
    assert_eq!(
      normalize_response(&fenced, DetectType::BoundingBoxes2D).unwrap(),
      expected
    );
    assert_eq!(
      normalize_response(&plain_fence, DetectType::BoundingBoxes2D).unwrap(),
      expected
    );
  }

  #[test]
  fn only_first_fenced_block_is_used() {
    let text = "```json\n[]\n```\n```json\n[{\"box_2d\": [1, 2, 3, 4], \"label\": \"x\"}]\n```";
    assert_eq!(extract_json(text), "[]");
  }

  #[test]
  fn unterminated_fence_takes_the_rest() {
    assert_eq!(extract_json("```json\n[1, 2]\n"), "[1, 2]");
  }

  #[test]
  fn grid_round_trip_is_exact_after_rounding() {
    for v in 0..=1000u32 {
      let raw = RawBox2D {
        box_2d: [v as f32, 0.0, 1000.0, v as f32],
        label: String::new(),
      };
      let b = BoundingBox2D::try_from(raw).unwrap();
      assert_eq!((b.y * GRID_SIZE).round() as u32, v);
      assert_eq!(((b.y + b.height) * GRID_SIZE).round() as u32, 1000);
      assert_eq!(((b.x + b.width) * GRID_SIZE).round() as u32, v);
    }
  }

  #[test]
  fn preserves_order_and_duplicates() {
    let text = r#"[
      {"box_2d": [0, 0, 10, 10], "label": "b"},
      {"box_2d": [0, 0, 10, 10], "label": "b"},
      {"box_2d": [5, 5, 6, 6], "label": "a"}
    ]"#;
    let labels: Vec<String> = boxes(normalize_response(text, DetectType::BoundingBoxes2D).unwrap())
      .into_iter()
      .map(|b| b.label)
      .collect();
    assert_eq!(labels, vec!["b", "b", "a"]);
  }

  #[test]
  fn empty_list_is_not_an_error() {
    let annotations = normalize_response("```json\n[]\n```", DetectType::Points).unwrap();
    assert_eq!(annotations, Annotations::Points(Vec::new()));
  }

  #[test]
  fn malformed_responses_fail() {
    for text in [
      "not json at all",
      r#"[{"box_2d": [1, 2, 3], "label": "short"}]"#,
      r#"[{"box_2d": [1, 2, 3, 4]}]"#,
      r#"{"box_2d": [1, 2, 3, 4], "label": "object"}"#,
    ] {
      assert!(
        normalize_response(text, DetectType::BoundingBoxes2D).is_err(),
        "{}",
        text
      );
    }
  }

  #[test]
  fn coordinates_outside_the_grid_fail() {
    let text = r#"[{"box_2d": [1500, 0, 2000, 0], "label": "sky"}]"#;
    assert!(matches!(
      normalize_response(text, DetectType::BoundingBoxes2D),
      Err(NormalizeError::OutOfGrid { label, value }) if label == "sky" && value == 1500.0
    ));

    let text = r#"[{"point": [500, -1], "label": "edge"}]"#;
    assert!(matches!(
      normalize_response(text, DetectType::Points),
      Err(NormalizeError::OutOfGrid { .. })
    ));
  }

  #[test]
  fn inverted_boxes_fail_the_whole_response() {
    let text = r#"[
      {"box_2d": [0, 0, 10, 10], "label": "ok"},
      {"box_2d": [0, 400, 100, 300], "label": "flipped"}
    ]"#;
    assert!(matches!(
      normalize_response(text, DetectType::BoundingBoxes2D),
      Err(NormalizeError::InvertedBox(label)) if label == "flipped"
    ));
  }

  #[test]
  fn points_are_given_as_y_then_x() {
    let text = r#"[{"point": [250, 750], "label": "door"}]"#;
    assert_eq!(
      normalize_response(text, DetectType::Points).unwrap(),
      Annotations::Points(vec![LabeledPoint {
        point: Point2D { x: 0.75, y: 0.25 },
        label: "door".to_string(),
      }])
    );
  }

  #[test]
  fn box_3d_angles_become_radians() {
    let text = r#"[{"box_3d": [1, 2, 3, 4, 5, 6, 180, 90, 0], "label": "car"}]"#;
    match normalize_response(text, DetectType::BoundingBoxes3D).unwrap() {
      Annotations::BoundingBoxes3D(boxes) => {
        let b = &boxes[0];
        assert_eq!(b.center, [1.0, 2.0, 3.0]);
        assert_eq!(b.size, [4.0, 5.0, 6.0]);
        assert!((b.rpy[0] - std::f32::consts::PI).abs() < 1e-6);
        assert!((b.rpy[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(b.rpy[2], 0.0);
      }
      other => panic!("unexpected annotations: {:?}", other),
    }
  }
}
