// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/session.rs - 标注会话
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

use std::fmt::Display;

use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::{DEFAULT_MAX_SIZE, FrameError, ImageFrame},
  model::{Annotations, DetectType, DetectionInput, Model, Prompt},
  output::Render,
  state::ViewState,
  store::{AnnotatedImage, AnnotationStore, PendingRemoval},
};

mod command;
pub use self::command::{Command, CommandError, Flow, HELP};

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("找不到标注图片: {0}")]
  NotFound(String),
  #[error("历史图像无法解码: {0}")]
  FrameError(#[from] FrameError),
}

/// 一次标注请求的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
  /// 标注成功并已入库
  Annotated { id: String, count: usize },
  /// 读取、请求或解析失败，状态未改变
  Failed(String),
  /// 当前图像已经标注过
  AlreadySent,
  /// 没有可标注的图像
  NoImage,
}

/// 持有标注列表与视图状态，串联 上传 → 检测 → 解析 → 入库 → 显示 的流程
///
/// 标注请求在 `&mut self` 上同步完成，请求期间无法发起新的上传或恢复；
/// 视图中的标注中标志只用于状态显示。`prompt` 中的检测类型是用户选择的
/// 类型，与视图当前显示的类型（可能来自历史记录）分开保存。
pub struct Session<M> {
  model: M,
  store: AnnotationStore,
  view: ViewState,
  current_frame: Option<ImageFrame>,
  prompt: Prompt,
  max_size: u32,
}

impl<M> Session<M>
where
  M: Model<Input = DetectionInput, Output = Annotations>,
  M::Error: Display,
{
  pub fn new(model: M) -> Self {
    Self {
      model,
      store: AnnotationStore::new(),
      view: ViewState::new(),
      current_frame: None,
      prompt: Prompt::default(),
      max_size: DEFAULT_MAX_SIZE,
    }
  }

  /// 设置提示词模板，其中的检测类型成为视图的初始类型
  pub fn with_prompt(mut self, prompt: Prompt) -> Self {
    self.view.select_detect_type(prompt.detect_type);
    self.prompt = prompt;
    self
  }

  pub fn with_max_size(mut self, max_size: u32) -> Self {
    self.max_size = max_size;
    self
  }

  /// 上传一张新图像并按选择的检测类型立即标注
  pub fn upload(&mut self, frame: ImageFrame) -> DetectOutcome {
    info!("上传图像: {} ({}x{})", frame.name(), frame.width(), frame.height());
    self.view
      .begin_upload(frame.data_url().to_string(), self.prompt.detect_type);
    self.current_frame = Some(frame);
    self.annotate()
  }

  /// 对当前图像再次发起标注，仅在图像尚未发送时生效
  pub fn detect(&mut self) -> DetectOutcome {
    if self.current_frame.is_none() {
      return DetectOutcome::NoImage;
    }
    if !self.view.can_annotate() {
      info!("当前图像已处理过，跳过标注");
      return DetectOutcome::AlreadySent;
    }
    self.annotate()
  }

  fn annotate(&mut self) -> DetectOutcome {
    let Some(frame) = self.current_frame.as_ref() else {
      return DetectOutcome::NoImage;
    };

    let input = DetectionInput {
      frame: frame.clone(),
      prompt: self.prompt.clone(),
    };

    self.view.set_annotating(true);
    let result = self.model.infer(&input);
    self.view.set_annotating(false);

    match result {
      Ok(annotations) => {
        let count = annotations.len();
        let id = self
          .store
          .record(input.frame.data_url().to_string(), annotations.clone())
          .id()
          .to_string();
        self.view.apply_annotations(annotations);
        self.view.mark_sent();
        info!("标注完成: {} 项, {}", count, self.view.detect_type());
        DetectOutcome::Annotated { id, count }
      }
      Err(e) => {
        error!("标注失败: {}", e);
        DetectOutcome::Failed(e.to_string())
      }
    }
  }

  /// 切换之后标注使用的检测类型，与显示的类型不同时当前图像可以重新标注
  pub fn select_detect_type(&mut self, detect_type: DetectType) {
    self.prompt.detect_type = detect_type;
    self.view.select_detect_type(detect_type);
  }

  /// 把一条历史记录恢复到视图中
  ///
  /// 只改变显示内容，之后上传使用的检测类型保持不变。
  pub fn restore(&mut self, id: &str) -> Result<&AnnotatedImage, SessionError> {
    let image = self
      .store
      .get(id)
      .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
    let frame = ImageFrame::from_data_url(image.id(), image.src())?;
    self.store.restore(id, &mut self.view);
    self.current_frame = Some(frame);
    Ok(image)
  }

  pub fn request_delete(&self, id: &str) -> Option<PendingRemoval> {
    self.store.request_remove(id)
  }

  pub fn confirm_delete(&mut self, pending: PendingRemoval) -> Option<AnnotatedImage> {
    self.store.confirm_remove(pending)
  }

  /// 将当前图像与激活的标注交给输出，没有图像时返回 `false`
  pub fn render<O: Render<ImageFrame, Annotations>>(&self, output: &O) -> Result<bool, O::Error> {
    match &self.current_frame {
      Some(frame) => {
        output.render_result(frame, self.view.annotations())?;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  pub fn store(&self) -> &AnnotationStore {
    &self.store
  }

  pub fn view(&self) -> &ViewState {
    &self.view
  }

  pub fn current_frame(&self) -> Option<&ImageFrame> {
    self.current_frame.as_ref()
  }

  pub fn prompt(&self) -> &Prompt {
    &self.prompt
  }

  pub fn max_size(&self) -> u32 {
    self.max_size
  }
}
