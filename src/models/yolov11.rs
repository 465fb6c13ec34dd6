// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv11 行人检测
// 输出张量布局: [1, 4 + nc, na], 前 4 个属性为 (cx, cy, w, h), 其余为各类别分数
// 无 objectness, 无 letterbox, 按轴独立缩放回原图

use std::time::Instant;

use anyhow::Result;
use ndarray::{s, Array, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::Detection;
use crate::{non_max_suppression, Box2D, OrtBackend, OrtConfig, OrtEP, SentinelError};

const CXYWH_OFFSET: usize = 4;
/// 检测头的三个输出尺度
const STRIDES: [u32; 3] = [8, 16, 32];

/// YOLOv11 解码配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YOLOv11Config {
    pub input_width: u32,
    pub input_height: u32,
    /// 类别数 (COCO = 80)
    pub num_classes: usize,
    /// 期望的 anchor 数量, None 表示按输入尺寸推算
    pub num_anchors: Option<usize>,
    /// 目标类别 (COCO person = 0)
    pub target_class: usize,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for YOLOv11Config {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            num_classes: 80,
            num_anchors: None,
            target_class: 0,
            conf_threshold: 0.35,
            iou_threshold: 0.45,
        }
    }
}

impl YOLOv11Config {
    pub fn num_attributes(&self) -> usize {
        CXYWH_OFFSET + self.num_classes
    }

    /// 每个 stride 一张特征图, 每个网格点一个 anchor: 640x640 → 8400, 320x320 → 2100
    pub fn expected_anchors(&self) -> usize {
        self.num_anchors.unwrap_or_else(|| {
            STRIDES
                .iter()
                .map(|&s| (self.input_width.div_ceil(s) * self.input_height.div_ceil(s)) as usize)
                .sum()
        })
    }
}

/// YOLOv11 推理模型 (ONNX Runtime)
pub struct YOLOv11 {
    engine: OrtBackend,
    width: u32,
    height: u32,
}

impl YOLOv11 {
    /// 加载模型, 失败视为启动期致命错误
    pub fn new(
        model: &str,
        ep: OrtEP,
        fp16: bool,
        config: &YOLOv11Config,
    ) -> Result<Self, SentinelError> {
        let ort_args = OrtConfig {
            ep,
            f: model.to_string(),
            trt_fp16: fp16,
            image_size: (config.input_height, config.input_width),
        };
        let engine = OrtBackend::build(ort_args)
            .map_err(|e| SentinelError::EngineInitialization(format!("{model}: {e:#}")))?;

        Ok(Self {
            engine,
            width: config.input_width,
            height: config.input_height,
        })
    }

    pub fn engine(&self) -> &OrtBackend {
        &self.engine
    }
}

impl super::Model for YOLOv11 {
    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Array<f32, IxDyn>> {
        let t_run = Instant::now();
        let ys = self.engine.run(xs)?;
        if profile {
            info!("[Model Inference]: {:?}", t_run.elapsed());
        }
        Ok(ys)
    }

    fn summary(&self) {
        info!(
            "\nSummary:\n\
            > Model: {}\n\
            > EP: {:?}\n\
            > Input: {}x{}\n\
            > Output: {:?}",
            self.engine.model_path(),
            self.engine.ep(),
            self.width,
            self.height,
            self.engine.output_shape(),
        );
    }
}

/// YOLOv11 后处理器: 原始张量 → 行人检测框 (原图像素坐标, 置信度降序)
#[derive(Debug, Clone)]
pub struct YOLOv11Postprocessor {
    config: YOLOv11Config,
}

impl YOLOv11Postprocessor {
    pub fn new(config: YOLOv11Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YOLOv11Config {
        &self.config
    }

    /// 解码; 形状不符时记录告警并返回空列表
    pub fn decode(&self, ys: &ArrayViewD<f32>, orig_w: u32, orig_h: u32) -> Vec<Detection> {
        match self.try_decode(ys, orig_w, orig_h) {
            Ok(dets) => dets,
            Err(e) => {
                warn!("⚠️  {}, 本帧检测结果为空", e);
                Vec::new()
            }
        }
    }

    pub fn try_decode(
        &self,
        ys: &ArrayViewD<f32>,
        orig_w: u32,
        orig_h: u32,
    ) -> Result<Vec<Detection>, SentinelError> {
        let preds = self.validate(ys)?;

        let scale_x = orig_w as f32 / self.config.input_width as f32;
        let scale_y = orig_h as f32 / self.config.input_height as f32;

        let mut data: Vec<Detection> = Vec::new();
        for pred in preds.axis_iter(Axis(1)) {
            let clss = pred.slice(s![CXYWH_OFFSET..]);

            // 与 argmax 一致: 并列最大值取第一个
            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if id != self.config.target_class || !(confidence > self.config.conf_threshold) {
                continue;
            }

            let bbox = Box2D::from_cxcywh(pred[0], pred[1], pred[2], pred[3]).scale(scale_x, scale_y);
            data.push(Detection {
                bbox,
                confidence,
                class_id: id,
            });
        }

        let candidates = data.len();
        non_max_suppression(&mut data, self.config.iou_threshold);
        debug!("decode: {} candidates → {} after NMS", candidates, data.len());

        Ok(data)
    }

    /// 校验输出形状, 返回 [属性, anchor] 视图
    fn validate<'a>(&self, ys: &'a ArrayViewD<f32>) -> Result<ArrayView2<'a, f32>, SentinelError> {
        let malformed = |got: &[usize]| SentinelError::MalformedModelOutput {
            expected: format!(
                "[1, {}, {}]",
                self.config.num_attributes(),
                self.config.expected_anchors()
            ),
            got: format!("{:?}", got),
        };

        let preds = match ys.ndim() {
            3 if ys.shape()[0] == 1 => ys.index_axis(Axis(0), 0),
            2 => ys.view(),
            _ => return Err(malformed(ys.shape())),
        };
        let preds = preds
            .into_dimensionality::<Ix2>()
            .map_err(|_| malformed(ys.shape()))?;

        let (na_attr, na) = preds.dim();
        if na_attr != self.config.num_attributes() {
            return Err(malformed(ys.shape()));
        }
        if na != self.config.expected_anchors() {
            return Err(malformed(ys.shape()));
        }
        Ok(preds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    const NA: usize = 8400;

    fn empty_output() -> Array3<f32> {
        Array3::zeros((1, 84, NA))
    }

    fn put_anchor(
        ys: &mut Array3<f32>,
        anchor: usize,
        cxcywh: [f32; 4],
        class: usize,
        score: f32,
    ) {
        for (i, v) in cxcywh.iter().enumerate() {
            ys[[0, i, anchor]] = *v;
        }
        ys[[0, CXYWH_OFFSET + class, anchor]] = score;
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn test_config_default() {
        let config = YOLOv11Config::default();
        assert_eq!(config.num_attributes(), 84);
        assert_eq!(config.expected_anchors(), 8400);
        assert_eq!(config.target_class, 0);

        let small = YOLOv11Config {
            input_width: 320,
            input_height: 320,
            ..Default::default()
        };
        assert_eq!(small.expected_anchors(), 2100);

        let wide = YOLOv11Config {
            input_width: 640,
            input_height: 384,
            ..Default::default()
        };
        assert_eq!(wide.expected_anchors(), 80 * 48 + 40 * 24 + 20 * 12);
    }

    #[test]
    fn test_decode_single_person() {
        let mut ys = empty_output();
        put_anchor(&mut ys, 1234, [320.0, 320.0, 100.0, 200.0], 0, 0.9);
        // 低于阈值的其他 anchor
        put_anchor(&mut ys, 10, [100.0, 100.0, 50.0, 50.0], 0, 0.2);

        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        let dets = pp.decode(&ys.view().into_dyn(), 1280, 720);

        assert_eq!(dets.len(), 1);
        let b = dets[0].bbox;
        assert_close(b.left, 540.0);
        assert_close(b.top, 247.5);
        assert_close(b.right, 740.0);
        assert_close(b.bottom, 472.5);
        assert_close(dets[0].confidence, 0.9);
        assert_eq!(dets[0].class_id, 0);
    }

    #[test]
    fn test_decode_wrong_attribute_count() {
        let ys = Array3::<f32>::from_elem((1, 10, NA), 0.9);
        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());

        assert!(pp.decode(&ys.view().into_dyn(), 640, 640).is_empty());
        assert!(matches!(
            pp.try_decode(&ys.view().into_dyn(), 640, 640),
            Err(SentinelError::MalformedModelOutput { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_anchor_count() {
        let mut ys = Array3::<f32>::zeros((1, 84, 100));
        put_anchor(&mut ys, 5, [320.0, 320.0, 100.0, 200.0], 0, 0.9);
        let view = ys.view().into_dyn();

        let strict = YOLOv11Postprocessor::new(YOLOv11Config::default());
        assert!(strict.decode(&view, 640, 640).is_empty());

        let explicit = YOLOv11Postprocessor::new(YOLOv11Config {
            num_anchors: Some(100),
            ..Default::default()
        });
        assert_eq!(explicit.decode(&view, 640, 640).len(), 1);
    }

    #[test]
    fn test_decode_follows_input_size() {
        // 320x320 导出的模型输出 (1, 84, 2100)
        let mut ys = Array3::<f32>::zeros((1, 84, 2100));
        put_anchor(&mut ys, 2000, [160.0, 160.0, 40.0, 80.0], 0, 0.9);

        let pp = YOLOv11Postprocessor::new(YOLOv11Config {
            input_width: 320,
            input_height: 320,
            ..Default::default()
        });
        let dets = pp.decode(&ys.view().into_dyn(), 1280, 720);
        assert_eq!(dets.len(), 1);
        // x 方向 ×4, y 方向 ×2.25
        assert_close(dets[0].bbox.left, 560.0);
        assert_close(dets[0].bbox.top, 270.0);
        assert_close(dets[0].bbox.right, 720.0);
        assert_close(dets[0].bbox.bottom, 450.0);

        // 仍按 640 输入配置时拒绝
        let stale = YOLOv11Postprocessor::new(YOLOv11Config::default());
        assert!(stale.decode(&ys.view().into_dyn(), 1280, 720).is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_rank() {
        let ys = ndarray::Array4::<f32>::zeros((1, 1, 84, NA));
        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        assert!(pp.decode(&ys.view().into_dyn(), 640, 640).is_empty());

        let batched = Array3::<f32>::zeros((2, 84, NA));
        assert!(pp.decode(&batched.view().into_dyn(), 640, 640).is_empty());
    }

    #[test]
    fn test_decode_accepts_unbatched() {
        let mut ys = empty_output();
        put_anchor(&mut ys, 0, [320.0, 320.0, 64.0, 64.0], 0, 0.8);
        let unbatched = ys.index_axis(Axis(0), 0).to_owned();

        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        let dets = pp.decode(&unbatched.view().into_dyn(), 640, 640);
        assert_eq!(dets.len(), 1);
        assert_close(dets[0].bbox.left, 288.0);
    }

    #[test]
    fn test_decode_other_class_wins() {
        let mut ys = empty_output();
        put_anchor(&mut ys, 7, [320.0, 320.0, 100.0, 100.0], 0, 0.6);
        ys[[0, CXYWH_OFFSET + 2, 7]] = 0.95; // car

        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        assert!(pp.decode(&ys.view().into_dyn(), 640, 640).is_empty());
    }

    #[test]
    fn test_decode_threshold_is_strict() {
        let mut ys = empty_output();
        put_anchor(&mut ys, 3, [320.0, 320.0, 100.0, 100.0], 0, 0.35);

        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        assert!(pp.decode(&ys.view().into_dyn(), 640, 640).is_empty());
    }

    #[test]
    fn test_decode_applies_nms() {
        let mut ys = empty_output();
        put_anchor(&mut ys, 100, [320.0, 320.0, 100.0, 200.0], 0, 0.7);
        put_anchor(&mut ys, 101, [322.0, 321.0, 100.0, 200.0], 0, 0.9);
        put_anchor(&mut ys, 200, [100.0, 100.0, 40.0, 80.0], 0, 0.5);

        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        let dets = pp.decode(&ys.view().into_dyn(), 640, 640);

        assert_eq!(dets.len(), 2);
        assert_close(dets[0].confidence, 0.9);
        assert_close(dets[0].bbox.left, 272.0);
        assert_close(dets[1].confidence, 0.5);
    }

    #[test]
    fn test_decode_deterministic() {
        let mut ys = empty_output();
        for (k, cx) in [100.0f32, 105.0, 300.0, 305.0, 500.0].iter().enumerate() {
            put_anchor(&mut ys, k * 37, [*cx, 200.0, 60.0, 120.0], 0, 0.8);
        }
        let pp = YOLOv11Postprocessor::new(YOLOv11Config::default());
        let a = pp.decode(&ys.view().into_dyn(), 1280, 720);
        let b = pp.decode(&ys.view().into_dyn(), 1280, 720);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }
}
