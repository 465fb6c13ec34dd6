//! 渲染输出 (Rendering sinks)
//!
//! 核心流水线不依赖渲染成功: 渲染失败只记录日志
//! - Annotator:     画框 + 标签 + 告警文字, 右侧拼接深度伪彩图, 保存标注图
//! - JsonLinesSink: 每帧一行 JSON

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{info, warn};

use crate::detection::{alerted_ids, FrameResult, Person, ProximityAlert};
use crate::input::{DepthFrame, FramePair};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const BOX_THICKNESS: i32 = 2;

const LABEL_SCALE: f32 = 22.0;
const ALERT_SCALE: f32 = 30.0;
/// 告警文字起始行与行距
const ALERT_ORIGIN: (i32, i32) = (50, 52);
const ALERT_LINE_HEIGHT: i32 = 40;

/// 原始深度 → 8 位灰度的缩放系数 (约 8.5m 饱和)
const DEPTH_ALPHA: f32 = 0.03;

/// 渲染接口
pub trait FrameSink {
    fn consume(&mut self, frame: &FramePair, result: &FrameResult) -> Result<()>;
}

/// 框标签: `ID 3: 1.25m`
pub fn person_label(person: &Person) -> String {
    format!("ID {}: {:.2}m", person.id, person.depth_m)
}

/// 告警文字: `ALERT: ID 1 & ID 2 TOO CLOSE (0.40m)`
pub fn alert_text(alert: &ProximityAlert) -> String {
    format!(
        "ALERT: ID {} & ID {} TOO CLOSE ({:.2}m)",
        alert.person_a, alert.person_b, alert.distance_m
    )
}

/// 加载标注字体, 失败时只画框不写字
pub fn load_font<P: AsRef<Path>>(path: P) -> Option<FontVec> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(bytes) => match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("✅ 字体加载成功: {}", path.display());
                Some(font)
            }
            Err(e) => {
                warn!("⚠️  字体加载失败 {}: {}", path.display(), e);
                None
            }
        },
        Err(_) => {
            warn!("⚠️  未找到字体文件: {}, 标注图不含文字", path.display());
            None
        }
    }
}

/// JET 伪彩色 (蓝 → 青 → 黄 → 红)
pub fn jet(v: u8) -> Rgb<u8> {
    let x = v as f32 / 255.0;
    let ch = |center: f32| {
        let c = (1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([ch(3.0), ch(2.0), ch(1.0)])
}

/// 深度帧 → 伪彩色图 (原始值 × 0.03 饱和到 255)
pub fn depth_colormap(depth: &DepthFrame) -> RgbImage {
    RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
        let raw = depth.raw_at(x as i32, y as i32) as f32;
        jet((raw * DEPTH_ALPHA).round().min(255.0) as u8)
    })
}

/// 标注图输出
pub struct Annotator {
    out_dir: PathBuf,
    font: Option<FontVec>,
    depth_panel: bool,
}

impl Annotator {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create output dir: {}", out_dir.display()))?;
        info!("🖼️  标注图输出目录: {}", out_dir.display());
        Ok(Self {
            out_dir,
            font: None,
            depth_panel: true,
        })
    }

    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.font = font;
        self
    }

    /// 是否在右侧拼接深度伪彩图
    pub fn with_depth_panel(mut self, enabled: bool) -> Self {
        self.depth_panel = enabled;
        self
    }

    /// 标注一帧: 左侧彩色帧 (框 / 标签 / 告警), 右侧深度伪彩图, 左上角 FPS
    pub fn annotate(&self, frame: &FramePair, result: &FrameResult) -> RgbImage {
        let mut img = frame.color.clone();
        let alerted = alerted_ids(&result.alerts);

        for person in &result.persons {
            let c = if alerted.contains(&person.id) { RED } else { GREEN };
            let b = &person.bbox;
            for t in 0..BOX_THICKNESS {
                let w = (b.width() as i32 - 2 * t).max(1) as u32;
                let h = (b.height() as i32 - 2 * t).max(1) as u32;
                let rect = Rect::at(b.left as i32 + t, b.top as i32 + t).of_size(w, h);
                draw_hollow_rect_mut(&mut img, rect, c);
            }
        }

        for alert in &result.alerts {
            let center = |id: u32| {
                result
                    .persons
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.bbox.center())
            };
            if let (Some(a), Some(b)) = (center(alert.person_a), center(alert.person_b)) {
                draw_line_segment_mut(&mut img, a, b, RED);
            }
        }

        if let Some(font) = &self.font {
            for person in &result.persons {
                // 标签放在框上方, 贴顶时放进框内
                let y = (person.bbox.top as i32 - LABEL_SCALE as i32 - 4).max(0);
                draw_text_mut(
                    &mut img,
                    WHITE,
                    person.bbox.left as i32,
                    y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &person_label(person),
                );
            }

            let (x, mut y) = ALERT_ORIGIN;
            for alert in &result.alerts {
                draw_text_mut(
                    &mut img,
                    RED,
                    x,
                    y,
                    PxScale::from(ALERT_SCALE),
                    font,
                    &alert_text(alert),
                );
                y += ALERT_LINE_HEIGHT;
            }
        }

        let mut canvas = if self.depth_panel {
            let (w, h) = img.dimensions();
            let panel = depth_colormap(&frame.depth);
            let panel = if panel.dimensions() == (w, h) {
                panel
            } else {
                imageops::resize(&panel, w, h, imageops::FilterType::Nearest)
            };
            let mut combined = RgbImage::new(w * 2, h);
            imageops::replace(&mut combined, &img, 0, 0);
            imageops::replace(&mut combined, &panel, w as i64, 0);
            combined
        } else {
            img
        };

        if let Some(font) = &self.font {
            draw_text_mut(
                &mut canvas,
                YELLOW,
                20,
                12,
                PxScale::from(28.0),
                font,
                &format!("FPS: {:.1}", result.fps),
            );
        }

        canvas
    }
}

impl FrameSink for Annotator {
    fn consume(&mut self, frame: &FramePair, result: &FrameResult) -> Result<()> {
        let path = self
            .out_dir
            .join(format!("frame_{:06}.jpg", result.frame_index));
        self.annotate(frame, result)
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))
    }
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    result: &'a FrameResult,
}

/// 逐帧 JSON Lines 输出
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!("📝 结果输出: {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl FrameSink for JsonLinesSink {
    fn consume(&mut self, _frame: &FramePair, result: &FrameResult) -> Result<()> {
        let record = Record {
            timestamp: chrono::Local::now().to_rfc3339(),
            result,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
