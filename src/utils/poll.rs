//! 通用轮询原语
//!
//! 会话就绪、弹窗关闭、生成等待和侧栏验证都复用这一个
//! "轮询直到谓词满足或预算耗尽"的循环，不各写各的 sleep 循环

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// 轮询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// 谓词在第 cycles 次检查时满足（从 1 计）
    Satisfied { cycles: usize },
    /// 预算耗尽，谓词始终未满足
    Exhausted,
}

impl PollVerdict {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollVerdict::Satisfied { .. })
    }
}

/// 以固定间隔轮询谓词，最多 max_cycles 次
///
/// 先检查后睡眠，满足时不消耗剩余间隔；谓词报错立即上抛
pub async fn poll_until<F, Fut>(
    interval: Duration,
    max_cycles: usize,
    mut predicate: F,
) -> Result<PollVerdict>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for cycle in 1..=max_cycles {
        if predicate().await? {
            return Ok(PollVerdict::Satisfied { cycles: cycle });
        }
        if cycle < max_cycles {
            sleep(interval).await;
        }
    }
    Ok(PollVerdict::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_on_third_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let verdict = poll_until(Duration::from_secs(2), 10, move || {
            let calls = calls_clone.clone();
            async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1 >= 3) }
        })
        .await
        .unwrap();

        assert_eq!(verdict, PollVerdict::Satisfied { cycles: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted() {
        let verdict = poll_until(Duration::from_secs(1), 5, || async { Ok(false) })
            .await
            .unwrap();
        assert_eq!(verdict, PollVerdict::Exhausted);
        assert!(!verdict.is_satisfied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_propagates() {
        let result = poll_until(Duration::from_secs(1), 5, || async {
            Err(anyhow::anyhow!("探测失败"))
        })
        .await;
        assert!(result.is_err());
    }
}
