//! 深度帧与相机内参
//!
//! 反投影遵循 RealSense 的约定: 像素坐标先归一化, 再按畸变模型修正, 最后乘以深度

use anyhow::{ensure, Result};
use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::Point3D;

/// 畸变模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    #[default]
    None,
    BrownConrady,
    InverseBrownConrady,
}

/// 相机内参 (对齐到彩色流之后的深度内参)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// 主点
    pub ppx: f32,
    pub ppy: f32,
    /// 焦距 (像素)
    pub fx: f32,
    pub fy: f32,
    #[serde(default)]
    pub model: DistortionModel,
    /// k1, k2, p1, p2, k3
    #[serde(default)]
    pub coeffs: [f32; 5],
}

impl Intrinsics {
    /// 无畸变针孔模型
    pub fn pinhole(width: u32, height: u32, ppx: f32, ppy: f32, fx: f32, fy: f32) -> Self {
        Self {
            width,
            height,
            ppx,
            ppy,
            fx,
            fy,
            model: DistortionModel::None,
            coeffs: [0.0; 5],
        }
    }
}

/// 像素 + 深度 → 3D 点
pub trait Deproject {
    fn deproject(&self, pixel: (i32, i32), depth_m: f32) -> Point3D;
}

impl Deproject for Intrinsics {
    fn deproject(&self, pixel: (i32, i32), depth_m: f32) -> Point3D {
        let mut x = (pixel.0 as f32 - self.ppx) / self.fx;
        let mut y = (pixel.1 as f32 - self.ppy) / self.fy;
        let c = &self.coeffs;

        match self.model {
            DistortionModel::None => {}
            DistortionModel::InverseBrownConrady => {
                let r2 = x * x + y * y;
                let f = 1.0 + c[0] * r2 + c[1] * r2 * r2 + c[4] * r2 * r2 * r2;
                let ux = x * f + 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
                let uy = y * f + 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
                x = ux;
                y = uy;
            }
            DistortionModel::BrownConrady => {
                // 迭代去畸变
                let (xo, yo) = (x, y);
                for _ in 0..10 {
                    let r2 = x * x + y * y;
                    let icdist = 1.0 / (1.0 + ((c[4] * r2 + c[1]) * r2 + c[0]) * r2);
                    let delta_x = 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
                    let delta_y = 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
                    x = (xo - delta_x) * icdist;
                    y = (yo - delta_y) * icdist;
                }
            }
        }

        Point3D::new(depth_m * x, depth_m * y, depth_m)
    }
}

/// 深度帧, 原始 16 位深度值 × depth_scale = 米
#[derive(Debug, Clone)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<u16>,
    depth_scale: f32,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32, data: Vec<u16>, depth_scale: f32) -> Result<Self> {
        ensure!(
            data.len() == (width as usize) * (height as usize),
            "depth buffer size {} does not match {}x{}",
            data.len(),
            width,
            height
        );
        ensure!(width > 0 && height > 0, "empty depth frame");
        Ok(Self {
            width,
            height,
            data,
            depth_scale,
        })
    }

    pub fn from_image(img: ImageBuffer<Luma<u16>, Vec<u16>>, depth_scale: f32) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw(), depth_scale)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    /// 把像素坐标限制在深度图范围内
    pub fn clamp_pixel(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.clamp(0, self.width as i32 - 1),
            y.clamp(0, self.height as i32 - 1),
        )
    }

    pub fn raw_at(&self, x: i32, y: i32) -> u16 {
        let (x, y) = self.clamp_pixel(x, y);
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// 深度 (米)
    pub fn depth_at(&self, x: i32, y: i32) -> f32 {
        self.raw_at(x, y) as f32 * self.depth_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn test_deproject_principal_point() {
        let intrin = Intrinsics::pinhole(1280, 720, 640.0, 360.0, 900.0, 900.0);
        let p = intrin.deproject((640, 360), 2.5);
        assert_eq!(p, Point3D::new(0.0, 0.0, 2.5));
    }

    #[test]
    fn test_deproject_pinhole() {
        let intrin = Intrinsics::pinhole(1280, 720, 640.0, 360.0, 900.0, 450.0);
        let p = intrin.deproject((1540, 135), 2.0);
        assert_close(p.x, 2.0);
        assert_close(p.y, -1.0);
        assert_close(p.z, 2.0);
    }

    #[test]
    fn test_zero_coeffs_match_pinhole() {
        let pinhole = Intrinsics::pinhole(640, 480, 320.0, 240.0, 600.0, 600.0);
        for model in [
            DistortionModel::BrownConrady,
            DistortionModel::InverseBrownConrady,
        ] {
            let distorted = Intrinsics {
                model,
                ..pinhole.clone()
            };
            let a = pinhole.deproject((100, 400), 1.7);
            let b = distorted.deproject((100, 400), 1.7);
            assert_close(a.x, b.x);
            assert_close(a.y, b.y);
        }
    }

    #[test]
    fn test_inverse_brown_conrady_radial() {
        let mut intrin = Intrinsics::pinhole(640, 480, 320.0, 240.0, 100.0, 100.0);
        intrin.model = DistortionModel::InverseBrownConrady;
        intrin.coeffs = [0.1, 0.0, 0.0, 0.0, 0.0];
        // 归一化坐标 (1, 0): r2 = 1, f = 1.1
        let p = intrin.deproject((420, 240), 1.0);
        assert_close(p.x, 1.1);
        assert_close(p.y, 0.0);
    }

    #[test]
    fn test_depth_lookup_scaled_and_clamped() {
        let data: Vec<u16> = (0..12).map(|v| v * 100).collect();
        let depth = DepthFrame::new(4, 3, data, 0.001).unwrap();
        assert_close(depth.depth_at(1, 1), 0.5);
        // 越界坐标被限制到边缘
        assert_close(depth.depth_at(10, 10), 1.1);
        assert_close(depth.depth_at(-5, 0), 0.0);
    }

    #[test]
    fn test_depth_size_mismatch() {
        assert!(DepthFrame::new(4, 4, vec![0; 15], 0.001).is_err());
        assert!(DepthFrame::new(0, 0, vec![], 0.001).is_err());
    }
}
