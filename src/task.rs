// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/task.rs - 批处理任务
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

use std::{sync::mpsc, thread, time::Duration};
use tracing::{error, info, warn};

use crate::{
  frame::ImageFrame,
  model::{Annotations, DetectionInput, Model, Prompt},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskReport, Self::Error>;
}

/// 任务结束时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
  pub processed: usize,
  pub failed: usize,
  pub annotations: usize,
}

#[derive(Default, Debug)]
pub struct OneShotTask {
  prompt: Prompt,
}

impl OneShotTask {
  pub fn with_prompt(mut self, prompt: Prompt) -> Self {
    self.prompt = prompt;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = ImageFrame>,
  M: Model<Input = DetectionInput, Output = Annotations, Error = ME>,
  O: Render<ImageFrame, Annotations, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始标注: {}", frame.name());
    let now = std::time::Instant::now();
    let input = DetectionInput {
      frame,
      prompt: self.prompt,
    };
    let result = model.infer(&input)?;
    info!("标注完成，耗时: {:.2?}, 共 {} 项", now.elapsed(), result.len());
    output.render_result(&input.frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(TaskReport {
      processed: 1,
      failed: 0,
      annotations: result.len(),
    })
  }
}

/// 逐张标注输入中的所有图像
///
/// 单张图像标注失败只记录日志并继续，渲染失败则终止任务。
#[derive(Default, Debug)]
pub struct BatchTask {
  prompt: Prompt,
  frame_number: Option<usize>,
  interrupt: Option<mpsc::Receiver<()>>,
}

impl BatchTask {
  pub fn with_prompt(mut self, prompt: Prompt) -> Self {
    self.prompt = prompt;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后在两张图像之间退出
  pub fn with_interrupt_handler(mut self) -> Result<Self, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    self.interrupt = Some(rx);
    Ok(self)
  }

  fn interrupted(&self) -> bool {
    self
      .interrupt
      .as_ref()
      .map(|rx| rx.try_recv().is_ok())
      .unwrap_or(false)
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = ImageFrame>,
  M: Model<Input = DetectionInput, Output = Annotations, Error = ME>,
  O: Render<ImageFrame, Annotations, Error = RE>,
> Task<I, M, O> for BatchTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let mut report = TaskReport::default();

    for frame in input {
      report.processed += 1;
      info!("处理第 {} 张图像: {}", report.processed, frame.name());
      let now = std::time::Instant::now();
      let input = DetectionInput {
        frame,
        prompt: self.prompt.clone(),
      };
      match model.infer(&input) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          output.render_result(&input.frame, &result)?;
          report.annotations += result.len();
          info!(
            "标注完成，耗时: {:.2?} / {:.2?}",
            elapsed_a,
            now.elapsed()
          );
        }
        Err(e) => {
          report.failed += 1;
          error!("{} 标注失败: {}", input.frame.name(), e);
        }
      }

      if self
        .frame_number
        .map(|n| report.processed >= n)
        .unwrap_or(false)
      {
        info!("达到指定图像数 {}, 退出任务循环", report.processed);
        break;
      }
      if self.interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共处理 {} 张，失败 {} 张，标注 {} 项",
      report.processed, report.failed, report.annotations
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use image::{Rgb, RgbImage};

  use super::*;
  use crate::model::{DetectType, NormalizeError, normalize_response};

  /// 图像名包含 "bad" 时返回无法解析的响应
  struct ByName;

  impl Model for ByName {
    type Input = DetectionInput;
    type Output = Annotations;
    type Error = NormalizeError;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      let reply = if input.frame.name().contains("bad") {
        "sorry"
      } else {
        r#"[{"point": [100, 200], "label": "a"}, {"point": [300, 400], "label": "b"}]"#
      };
      self.postprocess(input, reply)
    }

    fn postprocess(&self, input: &Self::Input, output: &str) -> Result<Self::Output, Self::Error> {
      normalize_response(output, input.prompt.detect_type)
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<(String, usize)>>);

  impl Render<ImageFrame, Annotations> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, frame: &ImageFrame, result: &Annotations) -> Result<(), Self::Error> {
      self.0.borrow_mut().push((frame.name().to_string(), result.len()));
      Ok(())
    }
  }

  fn frames(names: &[&str]) -> Vec<ImageFrame> {
    names
      .iter()
      .map(|name| ImageFrame::from_image(*name, RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))).unwrap())
      .collect()
  }

  fn points() -> Prompt {
    Prompt::default().with_detect_type(DetectType::Points)
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let collect = Collect::default();
    let report = OneShotTask::default()
      .with_prompt(points())
      .run_task(frames(&["a.png", "b.png"]).into_iter(), ByName, &collect)
      .unwrap();
    assert_eq!(report.annotations, 2);
    assert_eq!(*collect.0.borrow(), vec![("a.png".to_string(), 2)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let collect = Collect::default();
    assert!(
      OneShotTask::default()
        .run_task(Vec::new().into_iter(), ByName, &collect)
        .is_err()
    );
  }

  #[test]
  fn batch_skips_failed_images() {
    let collect = Collect::default();
    let report = BatchTask::default()
      .with_prompt(points())
      .run_task(
        frames(&["a.png", "bad.png", "c.png"]).into_iter(),
        ByName,
        &collect,
      )
      .unwrap();
    assert_eq!(
      report,
      TaskReport {
        processed: 3,
        failed: 1,
        annotations: 4,
      }
    );
    assert_eq!(collect.0.borrow().len(), 2);
  }

  #[test]
  fn batch_stops_at_frame_number() {
    let collect = Collect::default();
    let report = BatchTask::default()
      .with_prompt(points())
      .with_frame_number(Some(2))
      .run_task(
        frames(&["a.png", "b.png", "c.png"]).into_iter(),
        ByName,
        &collect,
      )
      .unwrap();
    assert_eq!(report.processed, 2);
  }
}
