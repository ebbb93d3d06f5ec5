// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/prompt.rs - 检测提示词模板
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

use crate::model::DetectType;

pub const DEFAULT_TARGET: &str = "建筑物";
pub const DEFAULT_MAX_ITEMS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
  pub detect_type: DetectType,
  pub target: String,
  pub max_items: usize,
}

impl Default for Prompt {
  fn default() -> Self {
    Self {
      detect_type: DetectType::default(),
      target: DEFAULT_TARGET.to_string(),
      max_items: DEFAULT_MAX_ITEMS,
    }
  }
}

impl Prompt {
  pub fn new(detect_type: DetectType, target: impl Into<String>, max_items: usize) -> Self {
    Self {
      detect_type,
      target: target.into(),
      max_items,
    }
  }

  pub fn with_detect_type(mut self, detect_type: DetectType) -> Self {
    self.detect_type = detect_type;
    self
  }

  pub fn render(&self) -> String {
    let Prompt {
      target, max_items, ..
    } = self;
    match self.detect_type {
      DetectType::BoundingBoxes2D if target == DEFAULT_TARGET => format!(
        "Detect only {target} in the image, ignoring reflections in water, shadows, or other \
         non-building elements. Focus on the main structures and architectural elements. Limit \
         to no more than {max_items} clear buildings. Output a json list where each entry \
         contains the 2D bounding box in \"box_2d\" and a text label in \"label\"."
      ),
      DetectType::BoundingBoxes2D => format!(
        "Detect only {target} in the image, ignoring reflections in water, shadows, or other \
         unrelated elements. Focus on the main structures. Limit to no more than {max_items} \
         clear items. Output a json list where each entry contains the 2D bounding box in \
         \"box_2d\" and a text label in \"label\"."
      ),
      DetectType::BoundingBoxes3D => format!(
        "Detect the 3D bounding boxes of {target}, output no more than {max_items} items. \
         Output a json list where each entry contains the object name in \"label\" and its \
         3D bounding box in \"box_3d\"."
      ),
      DetectType::Points => format!(
        "Point to the {target} with no more than {max_items} items. The answer should follow \
         the json format: [{{\"point\": <point>, \"label\": <label1>}}, ...]. The points are in \
         [y, x] format normalized to 0-1000."
      ),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_building_prompt_is_unchanged() {
    assert_eq!(
      Prompt::default().render(),
      "Detect only 建筑物 in the image, ignoring reflections in water, shadows, or other \
       non-building elements. Focus on the main structures and architectural elements. Limit to \
       no more than 10 clear buildings. Output a json list where each entry contains the 2D \
       bounding box in \"box_2d\" and a text label in \"label\"."
    );

    let text = Prompt::new(DetectType::BoundingBoxes2D, "cars", 4).render();
    assert!(text.starts_with("Detect only cars in the image"));
    assert!(!text.contains("buildings"));
  }

  #[test]
  fn each_type_names_its_coordinate_field() {
    let prompt = Prompt::default();
    assert!(prompt.render().contains("\"box_2d\""));
    assert!(prompt.render().contains(DEFAULT_TARGET));
    assert!(prompt.render().contains("no more than 10"));

    let prompt = prompt.with_detect_type(DetectType::BoundingBoxes3D);
    assert!(prompt.render().contains("\"box_3d\""));

    let prompt = Prompt::new(DetectType::Points, "windows", 3);
    let text = prompt.render();
    assert!(text.contains("{\"point\": <point>"));
    assert!(text.contains("windows"));
    assert!(text.contains("no more than 3"));
  }
}
