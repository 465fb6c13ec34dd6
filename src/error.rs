//! 错误类型 (Error taxonomy)
//!
//! 运行期的逐帧错误都可恢复 (跳过该帧), 只有启动阶段的资源错误是致命的

#[derive(thiserror::Error, Debug)]
pub enum SentinelError {
    /// 模型输出形状与配置不符, 本帧解码结果为空
    #[error("malformed model output: expected {expected}, got {got}")]
    MalformedModelOutput { expected: String, got: String },

    /// 彩色/深度帧缺失, 跳过本帧
    #[error("missing frame data: {0}")]
    MissingFrameData(&'static str),

    /// 推理引擎初始化失败 (模型文件不可读 / 加速器不可用)
    #[error("inference engine initialization failed: {0}")]
    EngineInitialization(String),

    /// 相机或帧源无法打开
    #[error("resource acquisition failed: {0}")]
    ResourceAcquisition(String),
}

impl SentinelError {
    /// 是否为启动阶段的致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SentinelError::EngineInitialization(_) | SentinelError::ResourceAcquisition(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(SentinelError::EngineInitialization("no model".into()).is_fatal());
        assert!(SentinelError::ResourceAcquisition("no camera".into()).is_fatal());
        assert!(!SentinelError::MissingFrameData("depth").is_fatal());
        assert!(!SentinelError::MalformedModelOutput {
            expected: "84".into(),
            got: "10".into()
        }
        .is_fatal());
    }
}
