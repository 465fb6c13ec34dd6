/// 检测系统 (Detection System)
///
/// 逐帧决策流水线
/// - Detector:            逐帧编排 (解码 → 3D 定位 → 去重 → 距离判定)
/// - SpatialDeduplicator: 2D + 3D 重复检测合并
/// - ProximityEvaluator:  人员间 3D 距离告警
pub mod dedup;
pub mod detector;
pub mod proximity;
pub mod types;

pub use dedup::{DedupConfig, MergeMode, SpatialDeduplicator};
pub use detector::{Detector, FrameStats, Step};
pub use proximity::{alerted_ids, ProximityConfig, ProximityEvaluator};
pub use types::{Detection, FrameResult, Person, ProximityAlert};
