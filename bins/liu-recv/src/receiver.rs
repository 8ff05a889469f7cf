//! socket 读取循环.

use bytes::BytesMut;
use liu_format::{DemuxHandler, TransportDemuxer};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 持续读取直到对端关闭, 每次读到的数据作为一个块交给解复用器
///
/// 返回读到的总字节数.
pub async fn receive<R, H>(
    reader: &mut R,
    read_size: usize,
    demuxer: &mut TransportDemuxer,
    handler: &mut H,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    H: DemuxHandler + ?Sized,
{
    let mut buffer = BytesMut::with_capacity(read_size);
    let mut total = 0u64;
    loop {
        buffer.reserve(read_size);
        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
        trace!("收到 {n} 字节");
        demuxer.feed(buffer.split().freeze(), handler);
    }
}
