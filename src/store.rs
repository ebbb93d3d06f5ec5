// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/store.rs - 已标注图像列表
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  model::{Annotations, DetectType},
  state::ViewState,
  utils::epoch_millis,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
  #[error("图像 ID 重复: {0}")]
  DuplicateId(String),
}

/// 一张已标注的图像，入库后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedImage {
  id: String,
  src: String,
  timestamp: i64,
  #[serde(flatten)]
  annotations: Annotations,
}

impl AnnotatedImage {
  pub fn new(id: String, src: String, timestamp: i64, annotations: Annotations) -> Self {
    Self {
      id,
      src,
      timestamp,
      annotations,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn src(&self) -> &str {
    &self.src
  }

  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  pub fn detect_type(&self) -> DetectType {
    self.annotations.detect_type()
  }

  pub fn annotations(&self) -> &Annotations {
    &self.annotations
  }

  /// 本地时区的可读时间
  pub fn local_time(&self) -> String {
    chrono::DateTime::from_timestamp_millis(self.timestamp)
      .map(|time| {
        time
          .with_timezone(&chrono::Local)
          .format("%Y-%m-%d %H:%M:%S")
          .to_string()
      })
      .unwrap_or_else(|| self.timestamp.to_string())
  }
}

/// 待确认的删除请求，只有调用 [`AnnotationStore::confirm_remove`] 才会真正删除；
/// 直接丢弃即为取消。
#[derive(Debug, PartialEq, Eq)]
#[must_use = "删除请求需要确认后才会生效"]
pub struct PendingRemoval {
  id: String,
}

impl PendingRemoval {
  pub fn id(&self) -> &str {
    &self.id
  }
}

/// 会话内的已标注图像列表，最新的在最前
#[derive(Debug, Default)]
pub struct AnnotationStore {
  images: Vec<AnnotatedImage>,
  counter: u16,
}

impl AnnotationStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_id(&mut self, timestamp: i64) -> String {
    loop {
      self.counter = self.counter.wrapping_add(1);
      let id = format!("{}-{:04X}", timestamp, self.counter);
      if self.get(&id).is_none() {
        return id;
      }
    }
  }

  /// 以当前时间和新的 ID 记录一张图像，返回入库后的条目
  pub fn record(&mut self, src: String, annotations: Annotations) -> &AnnotatedImage {
    let timestamp = epoch_millis();
    let id = self.next_id(timestamp);
    info!(
      "创建新的标注图片记录, ID: {}, 标注数: {}",
      id,
      annotations.len()
    );
    self.images.insert(0, AnnotatedImage::new(id, src, timestamp, annotations));
    &self.images[0]
  }

  /// 插入到列表最前，ID 已存在时拒绝
  pub fn append(&mut self, image: AnnotatedImage) -> Result<(), StoreError> {
    if self.get(image.id()).is_some() {
      return Err(StoreError::DuplicateId(image.id.clone()));
    }
    debug!(
      "更新标注图片列表，当前列表长度: {}, 新长度: {}",
      self.images.len(),
      self.images.len() + 1
    );
    self.images.insert(0, image);
    Ok(())
  }

  /// 删除的第一步：ID 存在时返回待确认的请求，不修改列表
  pub fn request_remove(&self, id: &str) -> Option<PendingRemoval> {
    self.get(id).map(|image| PendingRemoval {
      id: image.id.clone(),
    })
  }

  /// 删除的第二步：至多删除一条，条目已不存在时什么也不做
  pub fn confirm_remove(&mut self, pending: PendingRemoval) -> Option<AnnotatedImage> {
    let index = self.images.iter().position(|image| image.id == pending.id)?;
    info!("删除标注图片: {}", pending.id);
    Some(self.images.remove(index))
  }

  /// 将一条记录恢复到视图中，记录本身保留在列表里
  pub fn restore(&self, id: &str, view: &mut ViewState) -> bool {
    match self.get(id) {
      Some(image) => {
        view.show_restored(image.src.clone(), image.annotations.clone());
        info!("恢复标注图片: {} ({})", image.id, image.detect_type());
        true
      }
      None => false,
    }
  }

  pub fn get(&self, id: &str) -> Option<&AnnotatedImage> {
    self.images.iter().find(|image| image.id == id)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, AnnotatedImage> {
    self.images.iter()
  }

  pub fn len(&self) -> usize {
    self.images.len()
  }

  pub fn is_empty(&self) -> bool {
    self.images.is_empty()
  }
}

impl<'a> IntoIterator for &'a AnnotationStore {
  type Item = &'a AnnotatedImage;
  type IntoIter = std::slice::Iter<'a, AnnotatedImage>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox2D, BoundingBox3D, LabeledPoint, Point2D};

  fn image(id: &str, annotations: Annotations) -> AnnotatedImage {
    AnnotatedImage::new(
      id.to_string(),
      format!("data:image/png;base64,{}", id),
      1_700_000_000_000,
      annotations,
    )
  }

  #[test]
  fn newest_entry_comes_first() {
    let mut store = AnnotationStore::new();
    for i in 0..5 {
      store
        .append(image(&format!("img-{}", i), Annotations::default()))
        .unwrap();
    }
    assert_eq!(store.len(), 5);
    assert_eq!(store.iter().next().unwrap().id(), "img-4");
  }

  #[test]
  fn record_generates_unique_ids() {
    let mut store = AnnotationStore::new();
    let first = store.record("a".to_string(), Annotations::default()).id().to_string();
    let second = store.record("b".to_string(), Annotations::default()).id().to_string();
    assert_ne!(first, second);
    assert_eq!(store.iter().next().unwrap().src(), "b");
  }

  #[test]
  fn duplicate_ids_are_rejected() {
    let mut store = AnnotationStore::new();
    store.append(image("same", Annotations::default())).unwrap();
    assert_eq!(
      store.append(image("same", Annotations::default())),
      Err(StoreError::DuplicateId("same".to_string()))
    );
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn removal_needs_confirmation() {
    let mut store = AnnotationStore::new();
    store.append(image("a", Annotations::default())).unwrap();
    store.append(image("b", Annotations::default())).unwrap();

    let pending = store.request_remove("a").unwrap();
    assert_eq!(store.len(), 2);
    let removed = store.confirm_remove(pending).unwrap();
    assert_eq!(removed.id(), "a");
    assert_eq!(store.len(), 1);
    assert!(store.get("a").is_none());
  }

  #[test]
  fn cancelled_or_unknown_removal_is_a_no_op() {
    let mut store = AnnotationStore::new();
    store.append(image("a", Annotations::default())).unwrap();

    assert!(store.request_remove("missing").is_none());
    drop(store.request_remove("a"));
    assert_eq!(store.len(), 1);

    let pending = store.request_remove("a").unwrap();
    let again = store.request_remove("a").unwrap();
    assert!(store.confirm_remove(pending).is_some());
    assert!(store.confirm_remove(again).is_none());
    assert!(store.is_empty());
  }

  #[test]
  fn restoring_points_clears_box_slots() {
    let mut store = AnnotationStore::new();
    let points = Annotations::Points(vec![LabeledPoint {
      point: Point2D { x: 0.3, y: 0.7 },
      label: "window".to_string(),
    }]);
    store.append(image("p", points.clone())).unwrap();

    let mut view = ViewState::new();
    view.begin_upload(
      "data:image/png;base64,other".to_string(),
      DetectType::BoundingBoxes2D,
    );
    view.apply_annotations(Annotations::BoundingBoxes2D(vec![BoundingBox2D {
      x: 0.0,
      y: 0.0,
      width: 1.0,
      height: 1.0,
      label: "all".to_string(),
    }]));

    assert!(store.restore("p", &mut view));
    assert_eq!(store.len(), 1);
    assert!(view.boxes_2d().is_empty());
    assert!(view.boxes_3d().is_empty());
    assert_eq!(view.points().len(), 1);
    assert_eq!(view.annotations(), &points);
    assert_eq!(view.image_src(), Some("data:image/png;base64,p"));
    assert!(view.image_sent());
    assert!(!view.is_uploaded_image());
  }

  #[test]
  fn restoring_unknown_id_leaves_view_alone() {
    let store = AnnotationStore::new();
    let mut view = ViewState::new();
    assert!(!store.restore("missing", &mut view));
    assert!(view.image_src().is_none());
  }

  #[test]
  fn serializes_type_next_to_annotations() {
    let entry = image(
      "x",
      Annotations::BoundingBoxes3D(vec![BoundingBox3D {
        center: [0.0, 1.0, 2.0],
        size: [1.0, 1.0, 1.0],
        rpy: [0.0, 0.0, 0.0],
        label: "car".to_string(),
      }]),
    );
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["id"], "x");
    assert_eq!(value["timestamp"], 1_700_000_000_000i64);
    assert_eq!(value["type"], "3D bounding boxes");
    assert_eq!(value["annotations"][0]["label"], "car");

    let back: AnnotatedImage = serde_json::from_value(value).unwrap();
    assert_eq!(back, entry);
  }
}
