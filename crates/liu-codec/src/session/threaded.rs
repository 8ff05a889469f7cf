//! 基于工作线程的解压会话.
//!
//! 提交的访问单元经通道发往专用线程, 由可替换的 [`FrameDecoder`] 解码,
//! 结果连同提交时的 [`DecodeContext`] 交给回调.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use liu_core::{LiuError, LiuResult};
use log::{debug, warn};

use super::{
    DecodeContext, DecodedImage, DecompressionSession, FormatDescription, FrameCallback,
    SessionConfig, SessionFactory,
};
use crate::access_unit::AccessUnit;

/// 在工作线程上运行的帧解码器
pub trait FrameDecoder: Send + 'static {
    /// 解码一个访问单元
    ///
    /// 返回本次可以输出的帧, 重排序解码器可以返回空并在之后输出.
    fn decode(
        &mut self,
        format: &FormatDescription,
        config: &SessionConfig,
        unit: &AccessUnit,
        context: DecodeContext,
    ) -> LiuResult<Vec<(DecodeContext, DecodedImage)>>;

    /// 输出所有被延迟的帧
    fn flush(&mut self) -> Vec<(DecodeContext, DecodedImage)> {
        Vec::new()
    }
}

enum Command {
    Decode(AccessUnit, DecodeContext),
    Flush,
    Barrier(Sender<()>),
}

/// 工作线程解压会话
pub struct ThreadedSession {
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedSession {
    /// 启动工作线程
    pub fn spawn<D: FrameDecoder>(
        decoder: D,
        format: Arc<FormatDescription>,
        config: SessionConfig,
        callback: FrameCallback,
    ) -> LiuResult<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("liu-decode".into())
            .spawn(move || run_worker(decoder, format, config, callback, rx))
            .map_err(|e| LiuError::Session(format!("无法启动解码线程: {e}")))?;

        Ok(Self {
            commands: Some(tx),
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> LiuResult<()> {
        self.commands
            .as_ref()
            .ok_or_else(|| LiuError::Session("解码会话已失效".into()))?
            .send(command)
            .map_err(|_| LiuError::Session("解码线程已退出".into()))
    }
}

fn run_worker<D: FrameDecoder>(
    mut decoder: D,
    format: Arc<FormatDescription>,
    config: SessionConfig,
    callback: FrameCallback,
    commands: Receiver<Command>,
) {
    for command in commands {
        match command {
            Command::Decode(unit, context) => {
                match decoder.decode(&format, &config, &unit, context) {
                    Ok(frames) => {
                        for (ctx, image) in frames {
                            callback(ctx, Ok(image));
                        }
                    }
                    Err(e) => callback(context, Err(e)),
                }
            }
            Command::Flush => {
                for (ctx, image) in decoder.flush() {
                    callback(ctx, Ok(image));
                }
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("解码线程退出");
}

impl DecompressionSession for ThreadedSession {
    fn decode(&mut self, unit: AccessUnit, context: DecodeContext) -> LiuResult<()> {
        self.send(Command::Decode(unit, context))
    }

    fn finish_delayed_frames(&mut self) -> LiuResult<()> {
        self.send(Command::Flush)
    }

    fn wait_for_async_frames(&mut self) -> LiuResult<()> {
        let (tx, rx) = mpsc::channel();
        self.send(Command::Barrier(tx))?;
        rx.recv()
            .map_err(|_| LiuError::Session("解码线程在等待期间退出".into()))
    }

    fn invalidate(&mut self) {
        // 关闭通道后工作线程处理完剩余命令即退出
        self.commands = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("解码线程异常退出");
            }
        }
    }
}

impl Drop for ThreadedSession {
    fn drop(&mut self) {
        self.invalidate();
    }
}

/// 为每个会话创建新 [`FrameDecoder`] 的工厂
pub struct ThreadedSessionFactory<F> {
    make_decoder: F,
}

impl<F, D> ThreadedSessionFactory<F>
where
    F: Fn() -> D + Send,
    D: FrameDecoder,
{
    pub fn new(make_decoder: F) -> Self {
        Self { make_decoder }
    }
}

impl<F, D> SessionFactory for ThreadedSessionFactory<F>
where
    F: Fn() -> D + Send,
    D: FrameDecoder,
{
    fn create_session(
        &self,
        format: Arc<FormatDescription>,
        config: &SessionConfig,
        callback: FrameCallback,
    ) -> LiuResult<Box<dyn DecompressionSession>> {
        let session = ThreadedSession::spawn((self.make_decoder)(), format, *config, callback)?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_unit::ParameterSets;
    use crate::parsers::h264::split_annex_b;
    use bytes::Bytes;
    use liu_core::Timestamp;
    use std::sync::Mutex;

    /// 每两帧输出一次, 且先输出后提交的那一帧, 模拟 B 帧重排序
    #[derive(Default)]
    struct ReorderingDecoder {
        held: Option<(DecodeContext, DecodedImage)>,
    }

    impl FrameDecoder for ReorderingDecoder {
        fn decode(
            &mut self,
            format: &FormatDescription,
            config: &SessionConfig,
            unit: &AccessUnit,
            context: DecodeContext,
        ) -> LiuResult<Vec<(DecodeContext, DecodedImage)>> {
            if unit.data.is_empty() {
                return Err(LiuError::Codec("空访问单元".into()));
            }
            let (width, height) = format.dimensions();
            let image = DecodedImage {
                width,
                height,
                pixel_format: config.pixel_format,
                data: Bytes::new(),
                timestamp: unit.pts,
                duration: None,
            };
            Ok(match self.held.take() {
                Some(prev) => vec![(context, image), prev],
                None => {
                    self.held = Some((context, image));
                    Vec::new()
                }
            })
        }

        fn flush(&mut self) -> Vec<(DecodeContext, DecodedImage)> {
            self.held.take().into_iter().collect()
        }
    }

    fn test_format() -> Arc<FormatDescription> {
        let payload = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F, 0xDA, 0x01, 0x40, 0x16, 0xE4, 0x00,
            0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80,
        ];
        let nalus = split_annex_b(&payload).unwrap();
        let sets = ParameterSets::find_last(&nalus).unwrap();
        Arc::new(FormatDescription::from_parameter_sets(&sets, 1280, 720).unwrap())
    }

    fn unit(pts: i64, len: usize) -> AccessUnit {
        AccessUnit {
            data: Bytes::from(vec![0x41; len]),
            pts: Timestamp(pts),
        }
    }

    #[test]
    fn test_乱序完成时携带各自的时间戳() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        let callback: FrameCallback = Arc::new(move |ctx, image| {
            let image = image.unwrap();
            sink.lock().unwrap().push((ctx.sequence, ctx.pts, image.timestamp));
        });

        let factory = ThreadedSessionFactory::new(ReorderingDecoder::default);
        let mut session = factory
            .create_session(test_format(), &SessionConfig::default(), callback)
            .unwrap();

        for (seq, pts) in [(0u64, 3000i64), (1, 6000), (2, 9000)] {
            let ctx = DecodeContext {
                pts: Timestamp(pts),
                sequence: seq,
            };
            session.decode(unit(pts, 8), ctx).unwrap();
        }
        session.finish_delayed_frames().unwrap();
        session.wait_for_async_frames().unwrap();
        session.invalidate();

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 3);
        // 第二帧先于第一帧完成
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 0);
        assert_eq!(results[2].0, 2);
        for (_, ctx_pts, image_ts) in results.iter() {
            assert_eq!(ctx_pts, image_ts);
        }
    }

    #[test]
    fn test_解码错误通过回调返回() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let callback: FrameCallback = Arc::new(move |ctx, image| {
            if image.is_err() {
                sink.lock().unwrap().push(ctx.pts);
            }
        });

        let mut session = ThreadedSession::spawn(
            ReorderingDecoder::default(),
            test_format(),
            SessionConfig::default(),
            callback,
        )
        .unwrap();
        let ctx = DecodeContext {
            pts: Timestamp(42),
            sequence: 0,
        };
        session.decode(unit(42, 0), ctx).unwrap();
        session.wait_for_async_frames().unwrap();
        assert_eq!(*errors.lock().unwrap(), vec![Timestamp(42)]);
    }

    #[test]
    fn test_失效后拒绝提交() {
        let callback: FrameCallback = Arc::new(|_, _| {});
        let mut session = ThreadedSession::spawn(
            ReorderingDecoder::default(),
            test_format(),
            SessionConfig::default(),
            callback,
        )
        .unwrap();
        session.invalidate();
        let ctx = DecodeContext {
            pts: Timestamp(0),
            sequence: 0,
        };
        assert!(session.decode(unit(0, 4), ctx).is_err());
        assert!(session.wait_for_async_frames().is_err());
    }
}
