// 彩色帧 → 模型输入
// resize 到模型尺寸 (不做 letterbox), RGB, /255, HWC → NCHW

use image::{imageops, RgbImage};
use ndarray::{Array, IxDyn};

pub fn to_nchw(image: &RgbImage, width: u32, height: u32) -> Array<f32, IxDyn> {
    let resized;
    let img = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        &resized
    };

    let mut ys = Array::zeros((1, 3, height as usize, width as usize)).into_dyn();
    for (x, y, rgb) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        ys[[0, 0, y, x]] = (r as f32) / 255.0;
        ys[[0, 1, y, x]] = (g as f32) / 255.0;
        ys[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    ys
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_shape_and_channels() {
        let img = RgbImage::from_pixel(8, 6, Rgb([255, 0, 51]));
        let ys = to_nchw(&img, 16, 16);
        assert_eq!(ys.shape(), &[1, 3, 16, 16]);
        // 纯色图缩放后颜色不变 (允许一个灰度级的舍入)
        assert!((ys[[0, 0, 5, 5]] - 1.0).abs() < 1e-2);
        assert!(ys[[0, 1, 5, 5]].abs() < 1e-2);
        assert!((ys[[0, 2, 5, 5]] - 0.2).abs() < 1e-2);
    }

    #[test]
    fn test_same_size_passthrough() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(3, 1, Rgb([255, 255, 255]));
        let ys = to_nchw(&img, 4, 4);
        assert_eq!(ys[[0, 0, 1, 3]], 1.0);
        assert_eq!(ys[[0, 0, 3, 1]], 0.0);
    }
}
