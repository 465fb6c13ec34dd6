#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 启动参数与阈值配置
pub mod detection; // 去重 / 距离判定 / 逐帧编排
pub mod error; // 错误类型
pub mod geometry; // IoU 与 3D 距离
pub mod input; // 相机 + 深度输入
pub mod models; // 模型接口与 YOLOv11 后处理
pub mod renderer; // 结果输出 (标注图 / JSON)

pub mod ort_backend;

pub use crate::config::{Args, MonitorConfig};
pub use crate::detection::{Detection, Detector, FrameResult, Person, ProximityAlert};
pub use crate::error::SentinelError;
pub use crate::geometry::{distance3d, iou, Box2D, Point3D, ScoredBox2D};
pub use crate::models::{Model, YOLOv11, YOLOv11Config, YOLOv11Postprocessor};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

/// 可参与 NMS 的带分数框
pub trait Scored {
    fn bbox(&self) -> &Box2D;
    fn score(&self) -> f32;
}

impl Scored for ScoredBox2D {
    fn bbox(&self) -> &Box2D {
        &self.bbox
    }

    fn score(&self) -> f32 {
        self.score
    }
}

/// 贪心非极大值抑制, 原地保留结果 (按分数从高到低)
///
/// 稳定排序: 同分时先出现者优先, 保证结果可复现
pub fn non_max_suppression<T: Scored>(xs: &mut Vec<T>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.score().total_cmp(&b1.score()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox().iou(xs[index].bbox());
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
