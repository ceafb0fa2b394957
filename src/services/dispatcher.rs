use crate::{
    config::DispatcherConfig,
    error::{AppError, AppResult},
    services::retry_classifier::{RetryClass, classify},
};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::{
    sync::Semaphore,
    time::{Instant, sleep, timeout_at},
};
use tracing::{debug, error, info, warn};

/// 调度失败的最终归类
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{label} 遇到不可重试错误（第 {attempts} 次尝试）: {source}")]
    Fatal {
        label: String,
        attempts: u32,
        source: Box<AppError>,
    },

    #[error("{label} 达到最大尝试次数 {attempts}，最终失败: {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        source: Box<AppError>,
    },

    #[error("{label} 超过扫描轮次时限")]
    DeadlineExceeded { label: String },

    #[error("调度器已关闭")]
    Closed,
}

impl DispatchError {
    /// 最后一次尝试的原始错误
    pub fn source_error(&self) -> Option<&AppError> {
        match self {
            DispatchError::Fatal { source, .. } | DispatchError::Exhausted { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, DispatchError::Exhausted { .. })
    }
}

/// 有界并发的远程调用调度器
///
/// 进程内只应存在一个实例（通过 `Arc` 共享），所有扫描的内容获取与分析调用
/// 共用同一组槽位。槽位由公平信号量实现：空闲时按提交顺序启动，完成顺序不定。
/// 一次调用在重试与退避期间持续占用其槽位。
#[derive(Debug)]
pub struct BoundedDispatcher {
    slots: Semaphore,
    config: DispatcherConfig,
}

impl BoundedDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            slots: Semaphore::new(config.max_concurrent as usize),
            config,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent as usize
    }

    /// 当前占用中的槽位数
    pub fn in_flight(&self) -> usize {
        self.max_concurrent()
            .saturating_sub(self.slots.available_permits())
    }

    /// 提交一个远程调用，不设时限
    pub async fn submit<F, Fut, T>(&self, label: &str, operation: F) -> Result<T, DispatchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.submit_until(label, None, operation).await
    }

    /// 提交一个远程调用；`deadline` 在等待槽位、调用进行中与退避前都会检查
    pub async fn submit_until<F, Fut, T>(
        &self,
        label: &str,
        deadline: Option<Instant>,
        operation: F,
    ) -> Result<T, DispatchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let deadline_exceeded = || DispatchError::DeadlineExceeded {
            label: label.to_string(),
        };

        let acquired = match deadline {
            Some(deadline) => timeout_at(deadline, self.slots.acquire())
                .await
                .map_err(|_| deadline_exceeded())?,
            None => self.slots.acquire().await,
        };
        let _permit = acquired.map_err(|_| DispatchError::Closed)?;

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("{} 第 {}/{} 次尝试", label, attempt, max_attempts);

            let result = match deadline {
                Some(deadline) => timeout_at(deadline, operation())
                    .await
                    .map_err(|_| deadline_exceeded())?,
                None => operation().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} 在第 {} 次尝试后成功", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if classify(&error) == RetryClass::Fatal {
                error!("{} 遇到不可重试错误: {}", label, error);
                return Err(DispatchError::Fatal {
                    label: label.to_string(),
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            if attempt >= max_attempts {
                error!(
                    "{} 达到最大尝试次数 {}，最终失败: {}",
                    label, max_attempts, error
                );
                return Err(DispatchError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = self.delay_for(attempt);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    warn!("{} 退避等待将超过时限，放弃重试: {}", label, error);
                    return Err(deadline_exceeded());
                }
            }

            warn!(
                "{} 第 {} 次尝试失败: {}，{}ms后重试",
                label,
                attempt,
                error,
                delay.as_millis()
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_for(attempt);
        if !self.config.jitter {
            return base;
        }
        // 10% 抖动
        let jitter_range = (base.as_millis() as f64 * 0.1).max(1.0);
        base + Duration::from_millis((rand::random::<f64>() * jitter_range) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    };

    fn fast_config(max_concurrent: u32, max_attempts: u32) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent,
            max_attempts,
            base_delay_ms: 5,
            max_delay_ms: 50,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_max_concurrent() {
        let dispatcher = BoundedDispatcher::new(fast_config(3, 1));
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (current, peak) = (&current, &peak);

        let calls = (0..20).map(|_| {
            dispatcher.submit("load", || async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, AppError>(())
            })
        });
        let results = join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let dispatcher = BoundedDispatcher::new(fast_config(2, 5));
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result: Result<(), _> = dispatcher
            .submit("auth", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::remote(Some(401), "unauthorized"))
            })
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Fatal { attempts: 1, .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_budget() {
        let dispatcher = BoundedDispatcher::new(fast_config(2, 3));
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let started = Instant::now();
        let result: Result<(), _> = dispatcher
            .submit("analysis", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::remote(Some(503), "unavailable"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.source_error().and_then(|e| e.http_status()), Some(503));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 5ms + 10ms 退避
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let dispatcher = BoundedDispatcher::new(fast_config(1, 3));
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result = dispatcher
            .submit("feed", || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(AppError::remote(None, "connection reset"))
                } else {
                    Ok("content")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "content");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_starts_in_submission_order() {
        let dispatcher = BoundedDispatcher::new(fast_config(1, 1));
        let order = Mutex::new(Vec::new());
        let order = &order;

        let calls = (0..5).map(|i| {
            dispatcher.submit("ordered", move || async move {
                order.lock().unwrap().push(i);
                sleep(Duration::from_millis(2)).await;
                Ok::<_, AppError>(())
            })
        });
        join_all(calls).await;

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let dispatcher = BoundedDispatcher::new(fast_config(1, 1));

        let failed: Result<(), _> = dispatcher
            .submit("first", || async { Err(AppError::not_found("missing")) })
            .await;
        assert!(failed.is_err());
        assert_eq!(dispatcher.in_flight(), 0);

        let ok = dispatcher
            .submit("second", || async { Ok::<_, AppError>(7) })
            .await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_deadline_while_waiting_for_slot() {
        let dispatcher = BoundedDispatcher::new(fast_config(1, 1));
        let deadline = Instant::now() + Duration::from_millis(20);

        let slow = dispatcher.submit("slow", || async {
            sleep(Duration::from_millis(200)).await;
            Ok::<_, AppError>(())
        });
        let queued = dispatcher.submit_until("queued", Some(deadline), || async {
            Ok::<_, AppError>(())
        });

        let (slow, queued) = tokio::join!(slow, queued);
        assert!(slow.is_ok());
        assert!(matches!(
            queued,
            Err(DispatchError::DeadlineExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_deadline_cuts_backoff_short() {
        let config = DispatcherConfig {
            max_concurrent: 1,
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter: false,
        };
        let dispatcher = BoundedDispatcher::new(config);
        let deadline = Instant::now() + Duration::from_millis(100);

        let started = Instant::now();
        let result: Result<(), _> = dispatcher
            .submit_until("analysis", Some(deadline), || async {
                Err(AppError::remote(Some(502), "bad gateway"))
            })
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::DeadlineExceeded { .. })
        ));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
