/// 视频输入系统 (Video Input System)
///
/// 相机 + 深度输入, 逐帧同步获取
/// - FrameSource:    帧源接口 (彩色帧 + 对齐后的深度帧 + 内参)
/// - RecordedSource: RGB-D 录制序列回放
/// - Intrinsics:     像素 + 深度 → 3D 反投影
/// - preprocess:     彩色帧 → 模型输入张量
pub mod depth;
pub mod preprocess;
pub mod recorded;

use std::time::Duration;

use image::RgbImage;

pub use depth::{Deproject, DepthFrame, DistortionModel, Intrinsics};
pub use recorded::RecordedSource;

use crate::SentinelError;

/// 一次采集的原始结果, 彩色或深度可能缺失
pub struct Capture {
    pub index: u64,
    pub color: Option<RgbImage>,
    pub depth: Option<DepthFrame>,
    pub intrinsics: Intrinsics,
}

/// 同步好的一帧 (彩色 + 深度)
pub struct FramePair {
    pub index: u64,
    pub color: RgbImage,
    pub depth: DepthFrame,
    pub intrinsics: Intrinsics,
}

impl Capture {
    /// 彩色与深度都在时才组成一帧, 否则本帧跳过
    pub fn into_pair(self) -> Result<FramePair, SentinelError> {
        let color = self
            .color
            .ok_or(SentinelError::MissingFrameData("color"))?;
        let depth = self
            .depth
            .ok_or(SentinelError::MissingFrameData("depth"))?;
        Ok(FramePair {
            index: self.index,
            color,
            depth,
            intrinsics: self.intrinsics,
        })
    }
}

/// 帧源接口
///
/// 帧源在启动时打开, Drop 时释放底层流
pub trait FrameSource {
    /// 等待下一组同步帧
    ///
    /// - `Some(capture)`: 获取到一次采集 (其中的帧可能缺失)
    /// - `None`: 流已结束
    ///
    /// 读取耗时超过 `timeout` 的帧以缺失形式返回 (本帧跳过).
    /// 期限在读取步骤之间检查, 单个步骤本身不会被中断
    fn wait_for_frames(&mut self, timeout: Duration) -> Option<Capture>;
}
