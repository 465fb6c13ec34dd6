//! 检测器 (Detector)
//! 职责: 原始张量 → 行人框 → 3D 定位 → 去重 → 距离告警 → FrameResult
//!
//! 单线程逐帧处理; 帧统计 (帧计数 / 上一帧时间 / FPS) 由检测器自身持有

use std::time::{Duration, Instant};

use ndarray::ArrayViewD;
use tracing::{debug, info, warn};

use super::dedup::SpatialDeduplicator;
use super::proximity::ProximityEvaluator;
use super::types::{Detection, FrameResult, Person};
use crate::config::MonitorConfig;
use crate::input::{Deproject, FramePair, FrameSource};
use crate::models::{Model, YOLOv11Postprocessor};

/// 一次 `step` 的结果
pub enum Step {
    /// 已处理的一帧 (原始帧交给渲染)
    Processed { frame: FramePair, result: FrameResult },
    /// 本帧跳过 (缺帧 / 超时 / 推理失败), 循环继续
    Skipped(anyhow::Error),
    /// 帧源结束
    End,
}

/// 帧统计
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub processed: u64,
    pub skipped: u64,
    pub alerts: u64,
    last: Option<Instant>,
    current_fps: f64,
}

impl FrameStats {
    /// 记录一帧完成, 返回瞬时 FPS (首帧为 0)
    pub fn tick(&mut self, now: Instant) -> f64 {
        self.processed += 1;
        self.current_fps = match self.last {
            Some(prev) => {
                let dt = now.saturating_duration_since(prev).as_secs_f64();
                if dt > 0.0 {
                    1.0 / dt
                } else {
                    self.current_fps
                }
            }
            None => 0.0,
        };
        self.last = Some(now);
        self.current_fps
    }

    pub fn fps(&self) -> f64 {
        self.current_fps
    }
}

pub struct Detector {
    postprocessor: YOLOv11Postprocessor,
    dedup: SpatialDeduplicator,
    evaluator: ProximityEvaluator,
    stats: FrameStats,
    profile: bool,
}

impl Detector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            postprocessor: YOLOv11Postprocessor::new(config.decoder.clone()),
            dedup: SpatialDeduplicator::new(config.dedup.clone()),
            evaluator: ProximityEvaluator::new(config.proximity.clone()),
            stats: FrameStats::default(),
            profile: false,
        }
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// 检测框 → 人员: 裁剪到图像内, 取框中心深度并反投影, 按顺序分配 ID (从 1 开始)
    pub fn locate(&self, dets: &[Detection], frame: &FramePair) -> Vec<Person> {
        let (w, h) = frame.color.dimensions();
        dets.iter()
            .enumerate()
            .map(|(i, det)| {
                let bbox = det.bbox.clamp_to_pixels(w, h);
                let cx = ((bbox.left + bbox.right) / 2.0) as i32;
                let cy = ((bbox.top + bbox.bottom) / 2.0) as i32;
                let (cx, cy) = frame.depth.clamp_pixel(cx, cy);

                let depth_m = frame.depth.depth_at(cx, cy);
                let position = frame.intrinsics.deproject((cx, cy), depth_m);
                Person {
                    id: i as u32 + 1,
                    bbox,
                    depth_m,
                    position,
                }
            })
            .collect()
    }

    /// 处理一帧的模型输出
    pub fn process(&mut self, ys: &ArrayViewD<f32>, frame: &FramePair) -> FrameResult {
        let t_post = Instant::now();
        let (w, h) = frame.color.dimensions();

        let dets = self.postprocessor.decode(ys, w, h);
        let persons = self.locate(&dets, frame);
        let persons = self.dedup.dedup(persons);
        let alerts = self.evaluator.evaluate(&persons);

        if self.profile {
            info!("[Postprocess]: {:?}", t_post.elapsed());
        }

        for alert in &alerts {
            warn!(
                "🚨 ALERT: ID {} & ID {} TOO CLOSE ({:.2}m)",
                alert.person_a, alert.person_b, alert.distance_m
            );
        }
        self.stats.alerts += alerts.len() as u64;
        let fps = self.stats.tick(Instant::now());

        debug!(
            "frame {}: {} detections, {} persons, {} alerts, {:.1} fps",
            frame.index,
            dets.len(),
            persons.len(),
            alerts.len(),
            fps
        );

        FrameResult {
            frame_index: frame.index,
            persons,
            alerts,
            fps,
        }
    }

    /// 取一帧 → 推理 → 处理; 所有逐帧错误都降级为跳过
    pub fn step<M, S>(&mut self, model: &mut M, source: &mut S, timeout: Duration) -> Step
    where
        M: Model + ?Sized,
        S: FrameSource + ?Sized,
    {
        let Some(capture) = source.wait_for_frames(timeout) else {
            return Step::End;
        };

        let frame = match capture.into_pair() {
            Ok(frame) => frame,
            Err(e) => return self.skip(e.into()),
        };

        let t_pre = Instant::now();
        let xs = match model.preprocess(&frame.color) {
            Ok(xs) => xs,
            Err(e) => return self.skip(e.context(format!("frame {} preprocess", frame.index))),
        };
        if self.profile {
            info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let ys = match model.run(xs, self.profile) {
            Ok(ys) => ys,
            Err(e) => return self.skip(e.context(format!("frame {} inference", frame.index))),
        };

        let result = self.process(&ys.view(), &frame);
        Step::Processed { frame, result }
    }

    fn skip(&mut self, reason: anyhow::Error) -> Step {
        self.stats.skipped += 1;
        debug!("frame skipped: {:#}", reason);
        Step::Skipped(reason)
    }

    /// 汇总
    pub fn summary(&self) {
        info!(
            "📊 已处理 {} 帧, 跳过 {} 帧, 告警 {} 次",
            self.stats.processed, self.stats.skipped, self.stats.alerts
        );
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}
