//! 尾沿去抖
//!
//! 每次 `poke` 都把截止时间推迟到 `now + wait`，只有安静满 `wait` 之后才触发一次。
//! 截止时间以值的形式交给 `until`，方便放进 `tokio::select!` 分支而不借用自身。

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct Debounce {
    wait: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// 记录一次触发，重新开始计时
    pub fn poke(&mut self) {
        self.deadline = Some(Instant::now() + self.wait);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 截止时间已到时解除并返回 true
    pub fn fire(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// 等到截止时间；未触发时永远挂起
    pub async fn until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
