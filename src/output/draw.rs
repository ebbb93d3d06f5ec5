// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/draw.rs - 标注结果可视化
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_text_mut,
  },
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  frame::ImageFrame,
  model::{Annotations, BoundingBox2D, LabeledPoint},
  utils::query_value,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const POINT_RADIUS: i32 = 5;
const PALETTE_SIZE: usize = 12;

// 未指定字体时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 3] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("读取字体文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(PathBuf),
}

pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    let font = FALLBACK_FONTS
      .iter()
      .map(Path::new)
      .filter(|path| path.exists())
      .find_map(|path| load_font(path).ok());
    if font.is_none() {
      warn!("未找到可用字体，标签文字将不会绘制");
    }
    Self::with_font(font)
  }
}

fn load_font(path: &Path) -> Result<FontArc, DrawError> {
  let data = std::fs::read(path)?;
  FontArc::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))
}

impl Draw {
  pub fn with_font(font: Option<FontArc>) -> Self {
    // 按色相均匀取色，相邻标注颜色区分明显
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      colors,
    }
  }

  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    Ok(Self::with_font(Some(load_font(path)?)))
  }

  /// 根据输出地址中的 `font` 参数选择字体
  pub fn from_url(url: &Url) -> Result<Self, DrawError> {
    match query_value::<PathBuf>(url, "font") {
      Some(path) => Self::with_font_file(&path),
      None => Ok(Self::default()),
    }
  }

  fn color(&self, index: usize) -> Rgb<u8> {
    self.colors[index % self.colors.len()]
  }

  // bbox 为归一化坐标，换算到像素后绘制 2 像素宽的边框
  fn draw_box_with_label(&self, image: &mut RgbImage, bbox: &BoundingBox2D, color: Rgb<u8>) {
    let (w, h) = (image.width() as f32, image.height() as f32);

    let x_min = ((bbox.x * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox.y * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = (((bbox.x + bbox.width) * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = (((bbox.y + bbox.height) * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      debug!("跳过退化的边界框: {:?}", bbox);
      return;
    }

    let rect =
      Rect::at(x_min, y_min).of_size((x_max - x_min + 1) as u32, (y_max - y_min + 1) as u32);
    draw_hollow_rect_mut(image, rect, color);
    if x_max - x_min > 2 && y_max - y_min > 2 {
      let inner = Rect::at(x_min + 1, y_min + 1)
        .of_size((x_max - x_min - 1) as u32, (y_max - y_min - 1) as u32);
      draw_hollow_rect_mut(image, inner, color);
    }

    // 标签放在边框上方，空间不足时贴着图像顶部
    self.draw_label(image, x_min, y_min - self.label_text_height, &bbox.label, color);
  }

  fn draw_point_with_label(&self, image: &mut RgbImage, point: &LabeledPoint, color: Rgb<u8>) {
    let x = (point.point.x * image.width() as f32).round() as i32;
    let y = (point.point.y * image.height() as f32).round() as i32;

    draw_filled_circle_mut(image, (x, y), POINT_RADIUS, color);
    draw_hollow_circle_mut(image, (x, y), POINT_RADIUS + 1, Rgb([255, 255, 255]));

    self.draw_label(
      image,
      x + POINT_RADIUS + 2,
      y - self.label_text_height / 2,
      &point.label,
      color,
    );
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, label: &str, color: Rgb<u8>) {
    let Some(font) = &self.font else {
      return;
    };
    if label.is_empty() {
      return;
    }

    let (w, h) = (image.width() as i32, image.height() as i32);
    let label_x = x.clamp(0, (w - 1).max(0));
    let label_y = y.clamp(0, (h - self.label_text_height).max(0));

    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = self.label_text_height.min(h) as u32;
    if label_width == 0 || label_height == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
    draw_filled_rect_mut(image, rect, color);
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x,
      label_y + self.label_text_vertical_padding,
      PxScale::from(self.font_size),
      font,
      label,
    );
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

pub trait DrawAnnotationsOnImage {
  fn draw_annotations_on_image(&self, image: &mut RgbImage, annotations: &Annotations);
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for ImageFrame {
  fn to_rgb_image(&self) -> RgbImage {
    self.image().clone()
  }
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

pub trait DrawAnnotationsOnFrame<F> {
  fn draw_annotations(&self, frame: &F, annotations: &Annotations) -> RgbImage;
}

impl<F: ToRgbImage, D: DrawAnnotationsOnImage> DrawAnnotationsOnFrame<F> for D {
  fn draw_annotations(&self, frame: &F, annotations: &Annotations) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_annotations_on_image(&mut image, annotations);
    image
  }
}

impl DrawAnnotationsOnImage for Draw {
  fn draw_annotations_on_image(&self, image: &mut RgbImage, annotations: &Annotations) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    match annotations {
      Annotations::BoundingBoxes2D(boxes) => {
        for (index, bbox) in boxes.iter().enumerate() {
          self.draw_box_with_label(image, bbox, self.color(index));
        }
      }
      Annotations::Points(points) => {
        for (index, point) in points.iter().enumerate() {
          self.draw_point_with_label(image, point, self.color(index));
        }
      }
      Annotations::BoundingBoxes3D(boxes) => {
        debug!("3D 边界框不做投影绘制，共 {} 个", boxes.len());
      }
    }
  }
}
