// Copyright 2024 - 2026 Wsport See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::VecDeque;

/// Outbound payloads issued before the connection is open.
///
/// Strict FIFO: payloads come back out of [`drain_all`] in exactly the order
/// they were enqueued, each exactly once. The lifecycle drains at most once
/// per Connecting→Open transition.
///
/// [`drain_all`]: WriteBuffer::drain_all
#[derive(Debug, Default)]
pub struct WriteBuffer {
    queue: VecDeque<String>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, payload: String) {
        self.queue.push_back(payload);
    }

    /// 按入队顺序取出全部待发数据, 队列清空
    pub fn drain_all(&mut self) -> Vec<String> {
        self.queue.drain(..).collect()
    }

    /// Drops everything without flushing, returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
