use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use pin_project_lite::pin_project;

/// 字节级进度回调：(已发送字节数, 总字节数)
pub type TransferProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 累计流经请求体的字节数并触发回调
pub struct TransferCounter {
    total_bytes: u64,
    sent: Mutex<u64>,
    callback: TransferProgressFn,
}

impl TransferCounter {
    pub fn new(total_bytes: u64, callback: TransferProgressFn) -> Self {
        Self {
            total_bytes,
            sent: Mutex::new(0),
            callback,
        }
    }

    fn record(&self, bytes: u64) {
        let mut sent = self.sent.lock();
        *sent += bytes;
        let total_sent = *sent;
        drop(sent);

        (self.callback)(total_sent, self.total_bytes);
    }
}

pin_project! {
    /// 包装请求体流，每拉取一帧就上报一次进度
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        counter: Arc<TransferCounter>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, counter: Arc<TransferCounter>) -> Self {
        Self { inner, counter }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let bytes_len = chunk.len();
                if bytes_len > 0 {
                    this.counter.record(bytes_len as u64);
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
