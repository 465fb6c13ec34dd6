/// 数字卫兵 (Digital Sentinel)
///
/// 实时社交距离监控
///
/// 处理流程 (单线程, 逐帧):
/// 1. 帧源:   彩色 + 深度对齐帧
/// 2. 检测:   YOLOv11 推理 → 行人框 → 3D 定位 → 去重 → 距离告警
/// 3. 输出:   标注图 (彩色 + 深度伪彩) / JSON Lines (失败只记录, 不中断)
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use proximity_sentinel::detection::Step;
use proximity_sentinel::input::RecordedSource;
use proximity_sentinel::models::{Model, YOLOv11};
use proximity_sentinel::renderer::{load_font, Annotator, FrameSink, JsonLinesSink};
use proximity_sentinel::{gen_time_string, Args, Detector, MonitorConfig, OrtEP};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("proximity_sentinel=info,sentinel=info,ort=warn")),
        )
        .init();

    info!("🛡️  数字卫兵启动");
    let args = Args::parse();

    let mut config = MonitorConfig::load(&args.config);
    config.apply_args(&args);
    config.print_summary();

    let ep = if args.trt {
        OrtEP::Trt(args.device_id)
    } else if args.cuda {
        OrtEP::CUDA(args.device_id)
    } else {
        OrtEP::CPU
    };

    let mut model = YOLOv11::new(&args.model, ep, args.fp16, &config.decoder)?;
    model.summary();

    let mut source = RecordedSource::open(&args.source)?;
    info!("📂 帧源: {} ({} 帧)", args.source, source.len());

    let mut sinks = build_sinks(&args)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let mut detector = Detector::new(&config).with_profile(args.profile);
    let timeout = Duration::from_millis(args.frame_timeout_ms);

    while !stop.load(Ordering::SeqCst) {
        if let Some(max) = args.max_frames {
            if detector.stats().processed >= max {
                info!("已达到最大帧数 {}", max);
                break;
            }
        }

        match detector.step(&mut model, &mut source, timeout) {
            Step::Processed { frame, result } => {
                for sink in sinks.iter_mut() {
                    if let Err(e) = sink.consume(&frame, &result) {
                        error!("❌ 帧 {} 输出失败: {:#}", result.frame_index, e);
                    }
                }
            }
            Step::Skipped(reason) => warn!("⏭️  跳过一帧: {:#}", reason),
            Step::End => {
                info!("帧源结束");
                break;
            }
        }
    }

    if stop.load(Ordering::SeqCst) {
        info!("收到中断信号, 退出");
    }
    detector.summary();
    Ok(())
}

/// 标注图写入 `<output>/<启动时间>/`, 避免覆盖上次结果
fn build_sinks(args: &Args) -> Result<Vec<Box<dyn FrameSink>>> {
    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
    if let Some(output) = &args.output {
        let dir = Path::new(output).join(gen_time_string("-"));
        let annotator = Annotator::new(dir)?
            .with_font(load_font(&args.font))
            .with_depth_panel(!args.no_depth_panel);
        sinks.push(Box::new(annotator));
    }
    if let Some(json_out) = &args.json_out {
        sinks.push(Box::new(JsonLinesSink::create(json_out)?));
    }
    Ok(sinks)
}
