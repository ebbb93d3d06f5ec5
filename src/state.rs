// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/state.rs - 视图状态
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

use tracing::debug;

use crate::model::{Annotations, BoundingBox2D, BoundingBox3D, DetectType, LabeledPoint};

pub const IDLE_LABEL: &str = "上传图片";
pub const ANNOTATING_LABEL: &str = "自动标注中...";

/// 当前显示的图像及其标注
///
/// 同一时刻只有一组标注处于激活状态，`annotations` 的类型即为当前检测类型；
/// 读取另外两类时得到空切片。所有修改都经由下面的方法完成。
#[derive(Debug, Clone, Default)]
pub struct ViewState {
  image_src: Option<String>,
  detect_type: DetectType,
  annotations: Annotations,
  is_uploaded_image: bool,
  image_sent: bool,
  is_annotating: bool,
  session: u32,
}

impl ViewState {
  pub fn new() -> Self {
    Self::default()
  }

  /// 清空当前标注，保留检测类型
  pub fn reset(&mut self) {
    self.annotations = Annotations::empty(self.detect_type);
    self.image_sent = false;
  }

  /// 新上传一张图像：按请求的检测类型重置状态并开启新的会话
  pub fn begin_upload(&mut self, src: String, detect_type: DetectType) {
    self.detect_type = detect_type;
    self.reset();
    self.image_src = Some(src);
    self.is_uploaded_image = true;
    self.image_sent = false;
    self.session = self.session.wrapping_add(1);
    debug!("开始新的会话: {}", self.session);
  }

  pub fn set_annotating(&mut self, annotating: bool) {
    self.is_annotating = annotating;
  }

  /// 替换激活的标注，检测类型随之切换
  pub fn apply_annotations(&mut self, annotations: Annotations) {
    self.detect_type = annotations.detect_type();
    self.annotations = annotations;
  }

  /// 标记当前图像已完成标注，阻止再次发送
  pub fn mark_sent(&mut self) {
    self.image_sent = true;
  }

  /// 显示一条历史记录
  pub fn show_restored(&mut self, src: String, annotations: Annotations) {
    self.is_uploaded_image = false;
    self.image_src = Some(src);
    self.apply_annotations(annotations);
    self.mark_sent();
  }

  /// 切换下一次检测使用的类型
  ///
  /// 类型改变时清空当前标注并允许对当前图像重新标注。
  pub fn select_detect_type(&mut self, detect_type: DetectType) {
    if detect_type == self.detect_type {
      return;
    }
    self.detect_type = detect_type;
    self.reset();
  }

  pub fn image_src(&self) -> Option<&str> {
    self.image_src.as_deref()
  }

  pub fn detect_type(&self) -> DetectType {
    self.detect_type
  }

  pub fn annotations(&self) -> &Annotations {
    &self.annotations
  }

  pub fn boxes_2d(&self) -> &[BoundingBox2D] {
    match &self.annotations {
      Annotations::BoundingBoxes2D(boxes) => boxes.as_slice(),
      _ => &[],
    }
  }

  pub fn boxes_3d(&self) -> &[BoundingBox3D] {
    match &self.annotations {
      Annotations::BoundingBoxes3D(boxes) => boxes.as_slice(),
      _ => &[],
    }
  }

  pub fn points(&self) -> &[LabeledPoint] {
    match &self.annotations {
      Annotations::Points(points) => points.as_slice(),
      _ => &[],
    }
  }

  pub fn is_uploaded_image(&self) -> bool {
    self.is_uploaded_image
  }

  pub fn image_sent(&self) -> bool {
    self.image_sent
  }

  pub fn is_annotating(&self) -> bool {
    self.is_annotating
  }

  pub fn session(&self) -> u32 {
    self.session
  }

  /// 当前图像是否可以发送给模型
  pub fn can_annotate(&self) -> bool {
    self.image_src.is_some() && !self.image_sent && !self.is_annotating
  }

  /// 上传控件上显示的文字
  pub fn status_label(&self) -> &'static str {
    if self.is_annotating {
      ANNOTATING_LABEL
    } else {
      IDLE_LABEL
    }
  }
}
