//! RGB-D 录制序列回放
//!
//! 目录结构:
//! ```text
//! recording/
//!   intrinsics.json        {"depth_scale": 0.001, "intrinsics": {...}}
//!   color_000000.png       彩色帧 (png/jpg)
//!   depth_000000.png       16 位灰度深度帧, 已对齐到彩色流
//!   ...
//! ```
//! 某一帧的彩色或深度文件缺失/损坏时, 该帧以缺失形式返回

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Capture, DepthFrame, FrameSource, Intrinsics};
use crate::SentinelError;

const META_FILE: &str = "intrinsics.json";
const COLOR_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];

/// 录制元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMeta {
    /// 原始深度值 → 米
    pub depth_scale: f32,
    pub intrinsics: Intrinsics,
}

pub struct RecordedSource {
    dir: PathBuf,
    meta: RecordingMeta,
    indices: Vec<u64>,
    cursor: usize,
}

impl RecordedSource {
    /// 打开录制目录, 目录或元数据不可用时视为启动失败
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SentinelError> {
        let dir = dir.as_ref().to_path_buf();
        let acquire = |msg: String| SentinelError::ResourceAcquisition(msg);

        let meta_path = dir.join(META_FILE);
        let json = fs::read_to_string(&meta_path)
            .map_err(|e| acquire(format!("{}: {}", meta_path.display(), e)))?;
        let meta: RecordingMeta = serde_json::from_str(&json)
            .map_err(|e| acquire(format!("{}: {}", meta_path.display(), e)))?;

        let entries =
            fs::read_dir(&dir).map_err(|e| acquire(format!("{}: {}", dir.display(), e)))?;
        let indices: BTreeSet<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_frame_index(&entry.path()))
            .collect();

        info!(
            "📼 录制序列已打开: {} ({} 帧, {}x{}, depth_scale={})",
            dir.display(),
            indices.len(),
            meta.intrinsics.width,
            meta.intrinsics.height,
            meta.depth_scale
        );

        Ok(Self {
            dir,
            meta,
            indices: indices.into_iter().collect(),
            cursor: 0,
        })
    }

    pub fn meta(&self) -> &RecordingMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn load_color(&self, index: u64) -> Option<image::RgbImage> {
        let path = COLOR_EXTS
            .iter()
            .map(|ext| self.dir.join(format!("color_{:06}.{}", index, ext)))
            .find(|p| p.exists())?;
        match image::open(&path) {
            Ok(img) => Some(img.into_rgb8()),
            Err(e) => {
                warn!("⚠️  彩色帧读取失败 {}: {}", path.display(), e);
                None
            }
        }
    }

    fn load_depth(&self, index: u64) -> Option<DepthFrame> {
        let path = self.dir.join(format!("depth_{:06}.png", index));
        if !path.exists() {
            return None;
        }
        let img = match image::open(&path) {
            Ok(img) => img.into_luma16(),
            Err(e) => {
                warn!("⚠️  深度帧读取失败 {}: {}", path.display(), e);
                return None;
            }
        };
        match DepthFrame::from_image(img, self.meta.depth_scale) {
            Ok(depth) => Some(depth),
            Err(e) => {
                warn!("⚠️  深度帧无效 {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl FrameSource for RecordedSource {
    fn wait_for_frames(&mut self, timeout: Duration) -> Option<Capture> {
        let index = *self.indices.get(self.cursor)?;
        self.cursor += 1;

        // 每个文件读完后检查一次期限; 正在进行的单个文件读取不会被打断
        let start = Instant::now();
        let color = self.load_color(index);
        let depth = if start.elapsed() > timeout {
            None
        } else {
            self.load_depth(index)
        };

        let elapsed = start.elapsed();
        if elapsed > timeout {
            warn!("⚠️  帧 {} 读取超时 ({:?} > {:?}), 丢弃", index, elapsed, timeout);
            return Some(Capture {
                index,
                color: None,
                depth: None,
                intrinsics: self.meta.intrinsics.clone(),
            });
        }

        debug!(
            "frame {}: color={} depth={}",
            index,
            color.is_some(),
            depth.is_some()
        );
        Some(Capture {
            index,
            color,
            depth,
            intrinsics: self.meta.intrinsics.clone(),
        })
    }
}

impl Drop for RecordedSource {
    fn drop(&mut self) {
        info!(
            "📼 录制序列已关闭: {} (已读取 {}/{} 帧)",
            self.dir.display(),
            self.cursor,
            self.indices.len()
        );
    }
}

/// color_000123.png / depth_000123.png → 123
fn parse_frame_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let digits = if let Some(rest) = stem.strip_prefix("color_") {
        if !COLOR_EXTS.contains(&ext.as_str()) {
            return None;
        }
        rest
    } else if let Some(rest) = stem.strip_prefix("depth_") {
        if ext != "png" {
            return None;
        }
        rest
    } else {
        return None;
    };
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    fn write_meta(dir: &Path) {
        let meta = RecordingMeta {
            depth_scale: 0.001,
            intrinsics: Intrinsics::pinhole(8, 6, 4.0, 3.0, 10.0, 10.0),
        };
        fs::write(dir.join(META_FILE), serde_json::to_string(&meta).unwrap()).unwrap();
    }

    fn write_depth(dir: &Path, index: u64, raw: u16) {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(8, 6, Luma([raw]));
        img.save(dir.join(format!("depth_{:06}.png", index))).unwrap();
    }

    fn write_color(dir: &Path, index: u64) {
        let img = RgbImage::from_pixel(8, 6, Rgb([10, 20, 30]));
        img.save(dir.join(format!("color_{:06}.png", index))).unwrap();
    }

    #[test]
    fn test_parse_frame_index() {
        assert_eq!(parse_frame_index(Path::new("color_000012.png")), Some(12));
        assert_eq!(parse_frame_index(Path::new("color_000012.JPG")), Some(12));
        assert_eq!(parse_frame_index(Path::new("depth_000007.png")), Some(7));
        assert_eq!(parse_frame_index(Path::new("depth_000007.jpg")), None);
        assert_eq!(parse_frame_index(Path::new("intrinsics.json")), None);
        assert_eq!(parse_frame_index(Path::new("color_abc.png")), None);
    }

    #[test]
    fn test_open_missing_dir() {
        let err = RecordedSource::open("/nonexistent/recording").err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_replay_with_missing_depth() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path());
        write_color(dir.path(), 0);
        write_depth(dir.path(), 0, 1500);
        write_color(dir.path(), 1);

        let mut source = RecordedSource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        let timeout = Duration::from_secs(5);

        let first = source.wait_for_frames(timeout).unwrap();
        assert_eq!(first.index, 0);
        let pair = first.into_pair().unwrap();
        assert_eq!(pair.color.dimensions(), (8, 6));
        assert!((pair.depth.depth_at(2, 2) - 1.5).abs() < 1e-6);

        let second = source.wait_for_frames(timeout).unwrap();
        assert_eq!(second.index, 1);
        assert!(second.color.is_some());
        assert!(second.depth.is_none());

        assert!(source.wait_for_frames(timeout).is_none());
    }

    #[test]
    fn test_zero_timeout_drops_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path());
        write_color(dir.path(), 0);
        write_depth(dir.path(), 0, 1000);

        let mut source = RecordedSource::open(dir.path()).unwrap();
        let capture = source.wait_for_frames(Duration::ZERO).unwrap();
        assert_eq!(capture.index, 0);
        assert!(capture.color.is_none());
        assert!(capture.depth.is_none());
        assert!(capture.into_pair().is_err());

        // 丢弃的帧不影响后续: 序列照常结束
        assert!(source.wait_for_frames(Duration::from_secs(5)).is_none());
    }
}
