use std::collections::HashMap;
use parking_lot::Mutex;
use crate::core::types::{ProgressCallback, ProgressUpdate};

/// 进度聚合器
///
/// 已完成字节只在分片整体完成时增长；在途分片的字节单独记账，
/// 每个进度 tick 重新合算一次。百分比对外保证单调不减，
/// 后端确认收尾之前绝不报 100，字节一旦开始移动就不再报 0
pub struct ProgressAggregator {
    total_bytes: u64,
    callback: Option<ProgressCallback>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    completed_bytes: u64,
    in_flight: HashMap<u32, u64>,
    last_percent: Option<u8>,
    finished: bool,
}

impl ProgressAggregator {
    pub fn new(total_bytes: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            total_bytes,
            callback,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 把断点续传时已确认分片的字节预先计入完成量
    pub fn precredit(&self, bytes: u64) {
        self.tick(|inner| {
            inner.completed_bytes += bytes;
        });
    }

    pub fn part_started(&self, part_number: u32) {
        self.tick(|inner| {
            inner.in_flight.insert(part_number, 0);
        });
    }

    pub fn part_progress(&self, part_number: u32, bytes_sent: u64) {
        self.tick(|inner| {
            inner.in_flight.insert(part_number, bytes_sent);
        });
    }

    pub fn part_completed(&self, part_number: u32, part_len: u64) {
        self.tick(|inner| {
            inner.in_flight.remove(&part_number);
            inner.completed_bytes += part_len;
        });
    }

    /// 后端确认完成后才会走到这里：一次性上报 100
    pub fn finish(&self) {
        let update = {
            let mut inner = self.inner.lock();
            if inner.finished {
                return;
            }
            inner.finished = true;
            inner.last_percent = Some(100);
            ProgressUpdate {
                percent: if self.total_bytes > 0 { Some(100) } else { None },
                bytes_done: self.total_bytes,
                bytes_total: self.total_bytes,
            }
        };

        if let Some(callback) = &self.callback {
            callback(update);
        }
    }

    pub fn bytes_done(&self) -> u64 {
        let inner = self.inner.lock();
        (inner.completed_bytes + inner.in_flight.values().sum::<u64>()).min(self.total_bytes)
    }

    fn tick(&self, mutate: impl FnOnce(&mut Inner)) {
        // 回调在锁外执行
        let update = {
            let mut inner = self.inner.lock();
            if inner.finished {
                return;
            }
            mutate(&mut inner);

            let in_flight: u64 = inner.in_flight.values().sum();
            let done = (inner.completed_bytes + in_flight).min(self.total_bytes);
            let percent = self.percent_for(done, &mut inner);

            ProgressUpdate {
                percent,
                bytes_done: done,
                bytes_total: self.total_bytes,
            }
        };

        if let Some(callback) = &self.callback {
            callback(update);
        }
    }

    fn percent_for(&self, done: u64, inner: &mut Inner) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }

        // 0 只在一个字节都没动之前出现；完成前封顶在 99
        let raw = if done == 0 {
            0
        } else {
            (((done as u128) * 100 / self.total_bytes as u128) as u8).clamp(1, 99)
        };

        // 单调不减
        let percent = match inner.last_percent {
            Some(last) if raw < last => last,
            _ => raw,
        };
        inner.last_percent = Some(percent);
        Some(percent)
    }
}
