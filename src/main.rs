// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use kuangxuan::{
  FromUrl,
  model::GeminiBuilder,
  session::{Command, Flow, HELP, Session},
};

fn read_line(stdin: &io::Stdin) -> io::Result<Option<String>> {
  let mut line = String::new();
  match stdin.lock().read_line(&mut line)? {
    0 => Ok(None),
    _ => Ok(Some(line)),
  }
}

fn ask(stdin: &io::Stdin, question: &str) -> bool {
  let mut stdout = io::stdout();
  if write!(stdout, "{}", question).and_then(|_| stdout.flush()).is_err() {
    return false;
  }
  matches!(
    read_line(stdin).map(|line| line.map(|l| l.trim().to_ascii_lowercase())),
    Ok(Some(answer)) if answer == "y" || answer == "yes"
  )
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("检测目标: {}, 最多 {} 项", args.target, args.max_items);

  let model = GeminiBuilder::from_url(&args.model)?
    .api_key(args.api_key.clone())
    .build()?;
  let mut session = Session::new(model)
    .with_prompt(args.prompt())
    .with_max_size(args.max_size);

  let stdin = io::stdin();
  let mut stdout = io::stdout();
  writeln!(stdout, "Kuangxuan 图像标注")?;
  writeln!(stdout, "==================")?;
  writeln!(stdout, "{}", HELP)?;

  loop {
    write!(stdout, "[{}] > ", session.view().status_label())?;
    stdout.flush()?;

    let Some(line) = read_line(&stdin)? else {
      break;
    };
    if line.trim().is_empty() {
      continue;
    }

    let command = match line.parse::<Command>() {
      Ok(command) => command,
      Err(e) => {
        warn!("无法解析命令: {}", line.trim());
        writeln!(stdout, "{}", e)?;
        continue;
      }
    };

    if command.execute(&mut session, &mut stdout, |question| ask(&stdin, question))? == Flow::Quit {
      break;
    }
  }

  info!("共标注 {} 张图片，退出", session.store().len());
  Ok(())
}
