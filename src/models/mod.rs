//! 模型统一接口与实现
//!
//! # 架构说明
//!
//! ## 推理模型 (Inference Model)
//! - **YOLOv11**: 模型加载 + 预处理 + 推理, 输出原始张量 `(1, 84, 8400)`
//!   - 文件: `yolov11.rs`
//!
//! ## 后处理器模式 (Postprocessor Pattern)
//! - **YOLOv11Postprocessor**: 原始张量 → 行人检测框
//!   - 与推理引擎解耦, 由 `detection::Detector` 持有
//!   - 形状不符时返回空列表, 不会让逐帧循环失败
//!
//! ## 使用示例
//! ```no_run
//! use proximity_sentinel::models::{Model, YOLOv11, YOLOv11Config, YOLOv11Postprocessor};
//! use proximity_sentinel::OrtEP;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = YOLOv11Config::default();
//! let mut model = YOLOv11::new("models/yolo11n.onnx", OrtEP::CPU, false, &config)?;
//! let frame = image::RgbImage::new(1280, 720);
//! let ys = model.infer(&frame)?;
//! let dets = YOLOv11Postprocessor::new(config).decode(&ys.view(), 1280, 720);
//! println!("persons: {}", dets.len());
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use image::RgbImage;
use ndarray::{Array, IxDyn};

/// 推理模型接口
///
/// ## 核心流程
/// ```text
/// 彩色帧 → preprocess → (1, 3, H, W) 张量
///        ↓
///   推理引擎 run
///        ↓
///   原始输出 (1, 4 + nc, na)
/// ```
pub trait Model {
    /// 模型输入尺寸 (width, height)
    fn input_size(&self) -> (u32, u32);

    /// 预处理: 彩色帧 → NCHW 张量, RGB, [0, 1]
    fn preprocess(&mut self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        let (w, h) = self.input_size();
        Ok(crate::input::preprocess::to_nchw(image, w, h))
    }

    /// 推理: 执行模型前向传播, 返回未解码的原始输出
    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Array<f32, IxDyn>>;

    /// preprocess → run
    fn infer(&mut self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        let xs = self.preprocess(image)?;
        self.run(xs, false)
    }

    /// 打印模型信息
    fn summary(&self);
}

pub mod yolov11;

pub use yolov11::{YOLOv11, YOLOv11Config, YOLOv11Postprocessor};
