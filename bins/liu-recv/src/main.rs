//! liu-recv - 实时 MPEG-TS 接收工具
//!
//! 连接到 TCP 服务器, 接收传输流并解复用. H.264 视频送入解压会话,
//! AAC 音频解码为 PCM, 输出事件写入日志.

mod receiver;
mod sink;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tokio::net::TcpStream;

use liu::codec::decoders::SymphoniaAacDecoder;
use liu::codec::ThreadedSessionFactory;
use liu::{ClientConfig, StreamRouter};
use liu_core::PixelFormat;
use liu_format::TransportDemuxer;

use sink::{InspectDecoder, LoggingSink};

#[derive(Parser, Debug)]
#[command(name = "liu-recv", version, about = "纯 Rust 实时 MPEG-TS 接收工具")]
struct Cli {
    /// 服务器地址
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 解码输出像素格式 (uyvy422, yuyv422, nv12, bgra)
    #[arg(long = "pixel-format")]
    pixel_format: Option<PixelFormat>,

    /// 单次读取的最大字节数
    #[arg(long = "read-size")]
    read_size: Option<usize>,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// 加载配置文件并用命令行参数覆盖
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(pixel_format) = self.pixel_format {
            config.pixel_format = pixel_format;
        }
        if let Some(read_size) = self.read_size {
            config.read_buffer_size = read_size;
        }
        config.verbosity = config.verbosity.max(self.verbose);
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("错误: {e:#}");
            process::exit(2);
        }
    };

    if let Err(e) = liu::logging::init(&config.logging, config.verbosity) {
        eprintln!("日志初始化失败: {e:#}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("创建异步运行时失败: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("接收失败: {e:#}");
        process::exit(1);
    }
}

async fn run(config: ClientConfig) -> Result<()> {
    let _maintenance = liu::logging::spawn_log_maintenance_task(config.logging.clone());

    info!("liu-recv 版本 {}", liu::version());
    let address = config.address();
    let mut stream = TcpStream::connect(&address)
        .await
        .with_context(|| format!("连接失败, address={address}"))?;
    info!("已连接 {address}");

    let sink = Arc::new(LoggingSink::default());
    let mut router = StreamRouter::new(
        sink.clone(),
        Box::new(ThreadedSessionFactory::new(|| InspectDecoder)),
        Box::new(SymphoniaAacDecoder::new()),
        config.session_config(),
    );
    let mut demuxer = TransportDemuxer::new();

    let outcome = tokio::select! {
        result = receiver::receive(&mut stream, config.read_buffer_size, &mut demuxer, &mut router) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match outcome {
        Some(result) => {
            result.context("读取数据失败")?;
            info!("服务器关闭连接");
        }
        None => warn!("收到中断信号, 停止接收"),
    }
    let received = demuxer.source().total_appended();

    // 先停止视频会话, 再输出统计
    router.shutdown();

    let ts = demuxer.stats();
    let routed = router.stats();
    let out = sink.counters();
    info!(
        "共接收 {received} 字节, TS 包 {}, 跳过 {} 字节, 连续性错误 {}, 加扰包 {}, PES {}",
        ts.packets, ts.skipped_bytes, ts.continuity_errors, ts.scrambled, ts.units
    );
    info!(
        "视频负载 {} (丢弃 {}), 音频负载 {}, 图像 {}, 音频帧 {}",
        routed.video_payloads,
        routed.dropped_video,
        routed.audio_payloads,
        out.images,
        out.audio_frames
    );
    Ok(())
}
