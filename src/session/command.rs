// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/session/command.rs - 交互命令
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

use std::{
  fmt::Display,
  io::{self, Write},
  path::PathBuf,
  str::FromStr,
};

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl,
  input::load_image_frame,
  model::{Annotations, DetectType, DetectionInput, Model, UnknownDetectType},
  output::OutputWrapper,
  session::{DetectOutcome, Session},
  state::ANNOTATING_LABEL,
};

pub const HELP: &str = "\
可用命令:
  upload <路径>      上传图像并自动标注 (.jpg .jpeg .png .webp)
  list               列出已标注的图片
  show               显示当前图像的标注
  restore <ID>       恢复一条历史记录
  delete <ID>        删除一条历史记录（需要确认）
  type <2d|3d|points> 切换检测类型
  detect             重新标注当前图像（仅在尚未标注时）
  render <URL>       输出当前标注，如 image:///tmp/out.png
  help               显示本帮助
  quit               退出";

#[derive(Error, Debug)]
pub enum CommandError {
  #[error("空命令")]
  Empty,
  #[error("未知命令: {0}，输入 help 查看帮助")]
  Unknown(String),
  #[error("命令 {0} 缺少参数")]
  MissingArgument(&'static str),
  #[error("{0}")]
  InvalidDetectType(#[from] UnknownDetectType),
  #[error("无效的输出地址: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Upload(PathBuf),
  List,
  Show,
  Restore(String),
  Delete(String),
  Type(DetectType),
  Detect,
  Render(Url),
  Help,
  Quit,
}

/// 命令执行后是否继续读取输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  Continue,
  Quit,
}

fn required<'a>(name: &'static str, argument: &'a str) -> Result<&'a str, CommandError> {
  if argument.is_empty() {
    Err(CommandError::MissingArgument(name))
  } else {
    Ok(argument)
  }
}

impl FromStr for Command {
  type Err = CommandError;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let line = line.trim();
    let (name, argument) = line
      .split_once(char::is_whitespace)
      .map(|(name, argument)| (name, argument.trim()))
      .unwrap_or((line, ""));

    match name.to_ascii_lowercase().as_str() {
      "" => Err(CommandError::Empty),
      "upload" | "u" => Ok(Command::Upload(PathBuf::from(required("upload", argument)?))),
      "list" | "ls" => Ok(Command::List),
      "show" => Ok(Command::Show),
      "restore" | "r" => Ok(Command::Restore(required("restore", argument)?.to_string())),
      "delete" | "rm" => Ok(Command::Delete(required("delete", argument)?.to_string())),
      "type" => Ok(Command::Type(required("type", argument)?.parse()?)),
      "detect" => Ok(Command::Detect),
      "render" => Ok(Command::Render(Url::parse(required("render", argument)?)?)),
      "help" | "?" => Ok(Command::Help),
      "quit" | "exit" | "q" => Ok(Command::Quit),
      other => Err(CommandError::Unknown(other.to_string())),
    }
  }
}

fn report<W: Write>(out: &mut W, outcome: &DetectOutcome) -> io::Result<()> {
  match outcome {
    DetectOutcome::Annotated { id, count } => writeln!(out, "标注完成: {} 项，记录 ID {}", count, id),
    DetectOutcome::Failed(reason) => writeln!(out, "标注失败: {}", reason),
    DetectOutcome::AlreadySent => writeln!(out, "当前图像已标注，切换检测类型后可重新标注"),
    DetectOutcome::NoImage => writeln!(out, "请先上传图片"),
  }
}

fn write_annotations<W: Write>(out: &mut W, annotations: &Annotations) -> io::Result<()> {
  match annotations {
    Annotations::BoundingBoxes2D(boxes) => {
      for b in boxes {
        writeln!(
          out,
          "  {}: x={:.3} y={:.3} w={:.3} h={:.3}",
          b.label, b.x, b.y, b.width, b.height
        )?;
      }
    }
    Annotations::BoundingBoxes3D(boxes) => {
      for b in boxes {
        writeln!(
          out,
          "  {}: center={:?} size={:?} rpy={:?}",
          b.label, b.center, b.size, b.rpy
        )?;
      }
    }
    Annotations::Points(points) => {
      for p in points {
        writeln!(out, "  {}: x={:.3} y={:.3}", p.label, p.point.x, p.point.y)?;
      }
    }
  }
  Ok(())
}

impl Command {
  /// 在会话上执行命令，结果写入 `out`；删除前通过 `confirm` 询问用户
  pub fn execute<M, W, C>(
    self,
    session: &mut Session<M>,
    out: &mut W,
    mut confirm: C,
  ) -> io::Result<Flow>
  where
    M: Model<Input = DetectionInput, Output = Annotations>,
    M::Error: Display,
    W: Write,
    C: FnMut(&str) -> bool,
  {
    match self {
      Command::Upload(path) => match load_image_frame(&path, session.max_size()) {
        Ok(frame) => {
          writeln!(out, "{}", ANNOTATING_LABEL)?;
          let outcome = session.upload(frame);
          report(out, &outcome)?;
        }
        Err(e) => {
          error!("读取图像失败: {}", e);
          writeln!(out, "读取图像失败: {}", e)?;
        }
      },
      Command::List => {
        if session.store().is_empty() {
          writeln!(out, "暂无标注图片")?;
        }
        for image in session.store() {
          writeln!(
            out,
            "{}  {}  {}  {} 项",
            image.id(),
            image.local_time(),
            image.detect_type(),
            image.annotations().len()
          )?;
        }
      }
      Command::Show => {
        let view = session.view();
        match session.current_frame() {
          Some(frame) => {
            writeln!(
              out,
              "{} ({}x{}) [{}] {}",
              frame.name(),
              frame.width(),
              frame.height(),
              view.detect_type(),
              if view.is_uploaded_image() { "上传" } else { "历史" }
            )?;
            write_annotations(out, view.annotations())?;
          }
          None => writeln!(out, "请先上传图片")?,
        }
        writeln!(out, "[{}]", view.status_label())?;
      }
      Command::Restore(id) => match session.restore(&id) {
        Ok(image) => writeln!(
          out,
          "已恢复 {} ({}, {} 项)",
          image.id(),
          image.detect_type(),
          image.annotations().len()
        )?,
        Err(e) => writeln!(out, "{}", e)?,
      },
      Command::Delete(id) => match session.request_delete(&id) {
        Some(pending) => {
          if confirm(&format!("确定删除 {} 吗？[y/N] ", pending.id())) {
            session.confirm_delete(pending);
            writeln!(out, "已删除 {}", id)?;
          } else {
            writeln!(out, "已取消")?;
          }
        }
        None => writeln!(out, "找不到标注图片: {}", id)?,
      },
      Command::Type(detect_type) => {
        session.select_detect_type(detect_type);
        writeln!(out, "检测类型: {}", detect_type)?;
      }
      Command::Detect => {
        let outcome = session.detect();
        report(out, &outcome)?;
      }
      Command::Render(url) => {
        let rendered = OutputWrapper::from_url(&url)
          .map_err(|e| e.to_string())
          .and_then(|output| session.render(&output).map_err(|e| e.to_string()));
        match rendered {
          Ok(true) => writeln!(out, "已输出到 {}", url)?,
          Ok(false) => writeln!(out, "请先上传图片")?,
          Err(e) => {
            error!("输出失败: {}", e);
            writeln!(out, "输出失败: {}", e)?;
          }
        }
      }
      Command::Help => writeln!(out, "{}", HELP)?,
      Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
  }
}
