// 该文件是 Kuangxuan （框选） 项目的一部分。
// tests/session.rs - 会话流程测试
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

use std::cell::RefCell;

use image::{Rgb, RgbImage};
use kuangxuan::{
  frame::ImageFrame,
  model::{
    DetectType, Gemini, GeminiBuilder, GeminiError, GenerateContentRequest,
    GenerateContentResponse, Transport,
  },
  session::{DetectOutcome, Session},
};

/// 按顺序回放预设响应，并记录收到的请求
#[derive(Default)]
struct Replay {
  replies: RefCell<Vec<Result<String, String>>>,
  requests: RefCell<Vec<GenerateContentRequest>>,
}

impl Replay {
  fn push_text(self, text: &str) -> Self {
    self.replies.borrow_mut().insert(0, Ok(text.to_string()));
    self
  }

  fn push_error(self, reason: &str) -> Self {
    self.replies.borrow_mut().insert(0, Err(reason.to_string()));
    self
  }
}

impl Transport for &Replay {
  fn generate_content(
    &self,
    request: &GenerateContentRequest,
  ) -> Result<GenerateContentResponse, GeminiError> {
    self.requests.borrow_mut().push(request.clone());
    let reply = self
      .replies
      .borrow_mut()
      .pop()
      .unwrap_or_else(|| Err("no reply".to_string()))
      .map_err(GeminiError::Transport)?;
    let body = serde_json::json!({
      "candidates": [{
        "content": { "role": "model", "parts": [{ "text": reply }] },
        "finishReason": "STOP"
      }]
    });
    Ok(serde_json::from_value(body).unwrap())
  }
}

fn session(replay: &Replay) -> Session<Gemini<&Replay>> {
  Session::new(GeminiBuilder::default().build_with(replay))
}

fn frame(name: &str, shade: u8) -> ImageFrame {
  ImageFrame::from_image(name, RgbImage::from_pixel(6, 4, Rgb([shade, shade, shade]))).unwrap()
}

const TOWER: &str = "```json\n[{\"box_2d\": [100, 200, 300, 400], \"label\": \"tower\"}]\n```";

#[test]
fn upload_sends_prompt_and_inline_png() {
  let replay = Replay::default().push_text(TOWER);
  let mut session = session(&replay);

  assert!(matches!(
    session.upload(frame("tower.png", 10)),
    DetectOutcome::Annotated { count: 1, .. }
  ));

  let requests = replay.requests.borrow();
  assert_eq!(requests.len(), 1);
  let parts = &requests[0].contents[0].parts;
  assert!(parts[0].text.as_deref().unwrap().contains("box_2d"));
  let inline = parts[1].inline_data.as_ref().unwrap();
  assert_eq!(inline.mime_type, "image/png");
  assert!(
    session
      .store()
      .iter()
      .next()
      .unwrap()
      .src()
      .ends_with(&inline.data)
  );
}

#[test]
fn transport_failure_keeps_store_and_clears_flag() {
  let replay = Replay::default().push_error("connection reset");
  let mut session = session(&replay);

  let outcome = session.upload(frame("a.png", 1));
  assert!(matches!(outcome, DetectOutcome::Failed(reason) if reason.contains("connection reset")));
  assert!(session.store().is_empty());
  assert!(session.view().annotations().is_empty());
  assert!(!session.view().is_annotating());
  assert_eq!(session.view().status_label(), "上传图片");
}

#[test]
fn unparsable_reply_is_a_failure() {
  let replay = Replay::default().push_text("I could not find any buildings.");
  let mut session = session(&replay);
  assert!(matches!(session.upload(frame("a.png", 1)), DetectOutcome::Failed(_)));
  assert!(session.store().is_empty());
}

#[test]
fn appending_many_keeps_newest_first() {
  let mut replay = Replay::default();
  for _ in 0..5 {
    replay = replay.push_text("[]");
  }
  let mut session = session(&replay);

  let mut ids = Vec::new();
  for i in 0..5 {
    match session.upload(frame(&format!("{}.png", i), i as u8)) {
      DetectOutcome::Annotated { id, .. } => ids.push(id),
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  assert_eq!(session.store().len(), 5);
  let stored: Vec<&str> = session.store().iter().map(|image| image.id()).collect();
  ids.reverse();
  assert_eq!(stored, ids);
}

#[test]
fn restoring_points_entry_clears_boxes() {
  let replay = Replay::default()
    .push_text(r#"[{"point": [250, 750], "label": "door"}]"#)
    .push_text(TOWER);
  let mut session = session(&replay);

  session.select_detect_type(DetectType::Points);
  session.upload(frame("door.png", 3));
  let points_id = session.store().iter().next().unwrap().id().to_string();

  session.select_detect_type(DetectType::BoundingBoxes2D);
  session.upload(frame("tower.png", 4));
  assert_eq!(session.view().boxes_2d().len(), 1);

  let restored = session.restore(&points_id).unwrap();
  assert_eq!(restored.detect_type(), DetectType::Points);

  let view = session.view();
  assert!(view.boxes_2d().is_empty());
  assert!(view.boxes_3d().is_empty());
  assert_eq!(view.points().len(), 1);
  assert_eq!(view.points()[0].point.x, 0.75);
  assert_eq!(view.points()[0].point.y, 0.25);
  assert_eq!(view.detect_type(), DetectType::Points);
  assert_eq!(session.current_frame().unwrap().image().get_pixel(0, 0), &Rgb([3, 3, 3]));
}

#[test]
fn deleting_unknown_id_is_a_no_op() {
  let replay = Replay::default().push_text(TOWER);
  let mut session = session(&replay);
  session.upload(frame("a.png", 1));

  assert!(session.request_delete("nope").is_none());
  assert_eq!(session.store().len(), 1);
}

#[test]
fn upload_after_restoring_points_uses_selected_type() {
  let replay = Replay::default()
    .push_text(r#"[{"point": [250, 750], "label": "door"}]"#)
    .push_text(TOWER);
  let mut session = session(&replay);

  session.select_detect_type(DetectType::Points);
  session.upload(frame("door.png", 3));
  let points_id = session.store().iter().next().unwrap().id().to_string();
  session.select_detect_type(DetectType::BoundingBoxes2D);
  session.restore(&points_id).unwrap();

  assert!(matches!(
    session.upload(frame("tower.png", 4)),
    DetectOutcome::Annotated { count: 1, .. }
  ));
  let requests = replay.requests.borrow();
  let prompt = requests[1].contents[0].parts[0].text.as_deref().unwrap();
  assert!(prompt.contains("box_2d"));
  assert_eq!(session.view().boxes_2d().len(), 1);
}
