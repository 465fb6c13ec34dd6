//! 几何基础运算 (Geometry primitives)
//!
//! 2D 框重叠度 (IoU) 与 3D 欧氏距离, 均为纯函数

use serde::{Deserialize, Serialize};

/// IoU 分母的防除零项
const IOU_EPS: f32 = 1e-6;

/// 图像像素坐标系下的矩形框 (left, top, right, bottom)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Box2D {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Box2D {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// 由中心点与宽高构造 (cx, cy, w, h) → (x1, y1, x2, y2)
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2.)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// 按轴独立缩放
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self::new(
            self.left * sx,
            self.top * sy,
            self.right * sx,
            self.bottom * sy,
        )
    }

    /// 裁剪到 [0, w-1] x [0, h-1] 并截断为整数像素
    pub fn clamp_to_pixels(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let px = |v: f32, max: f32| v.clamp(0.0, max).trunc();
        Self::new(
            px(self.left, max_x),
            px(self.top, max_y),
            px(self.right, max_x),
            px(self.bottom, max_y),
        )
    }

    pub fn intersection_area(&self, another: &Box2D) -> f32 {
        let l = self.left.max(another.left);
        let t = self.top.max(another.top);
        let r = self.right.min(another.right);
        let b = self.bottom.min(another.bottom);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &Box2D) -> f32 {
        iou(self, another)
    }
}

/// 带置信度的框 (NMS 的输入)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoredBox2D {
    pub bbox: Box2D,
    pub score: f32,
}

impl ScoredBox2D {
    pub fn new(bbox: Box2D, score: f32) -> Self {
        Self { bbox, score }
    }
}

/// 相机坐标系下的三维点 (米)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3D) -> f32 {
        distance3d(self, other)
    }
}

/// Intersection-over-Union, 不相交时为 0
pub fn iou(a: &Box2D, b: &Box2D) -> f32 {
    let inter = a.intersection_area(b);
    inter / (a.area() + b.area() - inter + IOU_EPS)
}

pub fn distance3d(p: &Point3D, q: &Point3D) -> f32 {
    let dx = p.x - q.x;
    let dy = p.y - q.y;
    let dz = p.z - q.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// 两个框中心点之间的像素距离
pub fn center_distance(a: &Box2D, b: &Box2D) -> f32 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}
