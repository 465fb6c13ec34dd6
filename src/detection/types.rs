//! 逐帧数据结构 (Per-frame data structures)
//!
//! 所有实体只在当前帧内有效, 帧结束即丢弃; 人员 ID 每帧重新分配

use serde::Serialize;

use crate::{Box2D, Point3D, Scored};

/// 检测框 (解码器输出, 原图像素坐标)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: Box2D,
    pub confidence: f32,
    pub class_id: usize,
}

impl Scored for Detection {
    fn bbox(&self) -> &Box2D {
        &self.bbox
    }

    fn score(&self) -> f32 {
        self.confidence
    }
}

/// 本帧中的一个人
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    /// 帧内 ID, 从 1 开始, 不跨帧保持
    pub id: u32,
    /// 整数像素坐标, 已裁剪到图像范围内
    pub bbox: Box2D,
    /// 框中心处的深度 (米)
    pub depth_m: f32,
    pub position: Point3D,
}

/// 距离过近告警
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityAlert {
    pub person_a: u32,
    pub person_b: u32,
    pub distance_m: f32,
}

/// 一帧的处理结果 (交给渲染)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub frame_index: u64,
    pub persons: Vec<Person>,
    pub alerts: Vec<ProximityAlert>,
    pub fps: f64,
}
