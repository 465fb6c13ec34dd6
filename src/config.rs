//! 配置 - 命令行参数 + JSON 阈值文件

use std::fs;
use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::detection::dedup::DedupConfig;
use crate::detection::proximity::ProximityConfig;
use crate::models::YOLOv11Config;

/// 数字卫兵启动参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "数字卫兵 - 实时社交距离监控", long_about = None)]
pub struct Args {
    /// ONNX 模型路径
    #[arg(short, long, default_value = "models/yolo11n.onnx")]
    pub model: String,

    /// RGB-D 录制序列目录 (intrinsics.json + color_*/depth_* 帧)
    #[arg(short, long)]
    pub source: String,

    /// 阈值配置文件 (JSON), 不存在时自动生成
    #[arg(long, default_value = "sentinel.json")]
    pub config: String,

    /// 标注图输出目录
    #[arg(short, long)]
    pub output: Option<String>,

    /// 标注文字字体 (TTF/OTF), 找不到时只画框
    #[arg(long, default_value = "assets/font/DejaVuSans.ttf")]
    pub font: String,

    /// 标注图不拼接深度伪彩图
    #[arg(long)]
    pub no_depth_panel: bool,

    /// 逐帧结果 JSON Lines 输出文件
    #[arg(long)]
    pub json_out: Option<String>,

    /// 使用 CUDA 执行
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT 执行
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// TensorRT FP16
    #[arg(long)]
    pub fp16: bool,

    /// 覆盖配置文件中的置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// 覆盖配置文件中的 NMS IoU 阈值
    #[arg(long)]
    pub iou: Option<f32>,

    /// 等待一帧的最长时间 (毫秒), 超时则跳过
    #[arg(long, default_value_t = 5000)]
    pub frame_timeout_ms: u64,

    /// 处理指定帧数后退出
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

/// 监控阈值配置
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub decoder: YOLOv11Config,
    pub dedup: DedupConfig,
    pub proximity: ProximityConfig,
}

impl MonitorConfig {
    /// 从JSON文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 命令行参数优先于配置文件
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(conf) = args.conf {
            self.decoder.conf_threshold = conf;
        }
        if let Some(iou) = args.iou {
            self.decoder.iou_threshold = iou;
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前监控配置:");
        info!(
            "  模型输入: {}x{}, anchors: {}, 类别数: {}, 目标类别: {}",
            self.decoder.input_width,
            self.decoder.input_height,
            self.decoder.expected_anchors(),
            self.decoder.num_classes,
            self.decoder.target_class
        );
        info!(
            "  检测置信度: {:.2}, NMS IoU: {:.2}",
            self.decoder.conf_threshold, self.decoder.iou_threshold
        );
        info!(
            "  去重: IoU > {:.2} 且 3D < {:.2}m, 或中心距 < {:.0}px ({:?})",
            self.dedup.iou_merge_threshold,
            self.dedup.dist3d_merge_threshold,
            self.dedup.pixel_center_merge_threshold,
            self.dedup.mode
        );
        info!("  安全距离: {:.2}m", self.proximity.distance_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::dedup::MergeMode;

    #[test]
    fn test_load_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.json");

        let config = MonitorConfig::load(&path);
        assert_eq!(config, MonitorConfig::default());
        assert!(path.exists());

        // 再次加载应读到同样的内容
        assert_eq!(MonitorConfig::load(&path), config);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(
            &path,
            r#"{ "proximity": { "distance_threshold": 1.5 }, "dedup": { "mode": "transitive" } }"#,
        )
        .unwrap();

        let config = MonitorConfig::load(&path);
        assert_eq!(config.proximity.distance_threshold, 1.5);
        assert_eq!(config.dedup.mode, MergeMode::Transitive);
        assert_eq!(config.dedup.iou_merge_threshold, 0.25);
        assert_eq!(config.decoder, YOLOv11Config::default());
    }

    #[test]
    fn test_load_invalid_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(MonitorConfig::load(&path), MonitorConfig::default());
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from(["sentinel", "--source", "rec", "--conf", "0.5"]);
        let mut config = MonitorConfig::default();
        config.apply_args(&args);
        assert_eq!(config.decoder.conf_threshold, 0.5);
        assert_eq!(config.decoder.iou_threshold, 0.45);
        assert_eq!(args.frame_timeout_ms, 5000);
        assert_eq!(args.font, "assets/font/DejaVuSans.ttf");
        assert!(!args.no_depth_panel);
    }
}
