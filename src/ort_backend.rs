// ONNX Runtime 推理后端
// 进程生命周期内只创建一次, Drop 时释放会话 (含异常退出路径)

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info};

/// 执行设备 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    /// (height, width)
    pub image_size: (u32, u32),
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    f: String,
    input_name: String,
    image_size: (u32, u32),
    output_shape: Option<Vec<usize>>,
}

impl OrtBackend {
    pub fn build(args: OrtConfig) -> Result<Self> {
        info!("Loading model: {} ({:?})", args.f, args.ep);

        let mut session_builder = Session::builder()?;
        session_builder = match args.ep {
            OrtEP::Trt(device_id) => session_builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .with_fp16(args.trt_fp16)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::CUDA(device_id) => session_builder.with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::CPU => session_builder,
        };

        let session = session_builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&args.f)
            .with_context(|| format!("Failed to load model: {}", args.f))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Model has no inputs")?;

        info!("✓ ONNX Runtime session ready (input: {})", input_name);

        Ok(Self {
            session,
            ep: args.ep,
            f: args.f,
            input_name,
            image_size: args.image_size,
            output_shape: None,
        })
    }

    /// 执行推理, 输入 NCHW, 输出保持模型原始形状
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        let shape = xs.shape().to_vec();
        let (data, _) = xs.into_raw_vec_and_offset();
        let input_value = ort::value::Value::from_array((shape.as_slice(), data.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])?;

        let (output_shape, data_slice) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        let ys = Array::from_shape_vec(IxDyn(&dims), data_slice.to_vec())?;

        if self.output_shape.is_none() {
            debug!("Model output shape: {:?}", dims);
            self.output_shape = Some(dims);
        }
        Ok(ys)
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn model_path(&self) -> &str {
        &self.f
    }

    pub fn height(&self) -> u32 {
        self.image_size.0
    }

    pub fn width(&self) -> u32 {
        self.image_size.1
    }

    /// 首次推理后才可知
    pub fn output_shape(&self) -> Option<&Vec<usize>> {
        self.output_shape.as_ref()
    }
}

impl Drop for OrtBackend {
    fn drop(&mut self) {
        info!("🧹 推理会话已释放: {}", self.f);
    }
}
