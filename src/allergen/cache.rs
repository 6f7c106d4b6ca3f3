//! 过敏原词条缓存
//!
//! 持有当前词条集合，过期后从外部目录刷新；刷新失败时按三级策略降级：
//! 新鲜缓存 → 过期缓存 → 内置兜底词表。并发调用共享同一次刷新。

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::allergen::terms::{fallback_terms, TermSet};
use crate::allergen::types::{AllergenCatalogEntry, TermLookup, TermSource};

/// 默认缓存有效期：5 分钟
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// 默认目录拉取超时
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(6);

/// 过敏原目录协作者
///
/// 返回全部条目的完整快照，按类别 ID 排序
#[async_trait]
pub trait AllergenCatalog: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<AllergenCatalogEntry>>;
}

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// 有效期，`now - fetched_at >= ttl` 即过期
    pub ttl: Duration,
    /// 单次拉取超时，超时视为拉取失败
    pub fetch_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

struct CachedTerms {
    terms: Arc<TermSet>,
    fetched_at: Instant,
    /// 被 invalidate 标记后，即使未到期也视为过期
    expired: bool,
}

type RefreshFuture = Shared<BoxFuture<'static, TermLookup>>;

struct CacheInner {
    catalog: Arc<dyn AllergenCatalog>,
    policy: CachePolicy,
    state: RwLock<Option<CachedTerms>>,
    /// 正在进行的刷新，所有并发调用者共享
    in_flight: Mutex<Option<RefreshFuture>>,
}

/// 过敏原词条缓存服务
///
/// 可克隆，克隆体共享同一份缓存状态
#[derive(Clone)]
pub struct TermCatalogCache {
    inner: Arc<CacheInner>,
}

impl TermCatalogCache {
    pub fn new(catalog: Arc<dyn AllergenCatalog>, policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                catalog,
                policy,
                state: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// 使用默认策略创建
    pub fn with_default_policy(catalog: Arc<dyn AllergenCatalog>) -> Self {
        Self::new(catalog, CachePolicy::default())
    }

    pub fn ttl(&self) -> Duration {
        self.inner.policy.ttl
    }

    /// 获取当前词条集合（不可失败）
    pub async fn get_terms(&self) -> Arc<TermSet> {
        self.lookup().await.terms
    }

    /// 获取当前词条集合及其来源层级（不可失败）
    pub async fn lookup(&self) -> TermLookup {
        if let Some(lookup) = self.inner.fresh_lookup() {
            return lookup;
        }

        let refresh = {
            let mut slot = self.inner.lock_in_flight();
            if let Some(in_flight) = slot.as_ref() {
                tracing::debug!("过敏原目录刷新进行中，等待共享结果");
                in_flight.clone()
            } else if let Some(lookup) = self.inner.fresh_lookup() {
                // 上一次刷新刚好完成
                return lookup;
            } else {
                let refresh = Arc::clone(&self.inner).refresh().boxed().shared();
                *slot = Some(refresh.clone());
                refresh
            }
        };

        refresh.await
    }

    /// 标记缓存过期，下一次调用触发刷新（数据保留，刷新失败时仍可降级使用）
    pub fn invalidate(&self) {
        if let Some(cached) = self.inner.write_state().as_mut() {
            cached.expired = true;
        }
    }

    /// 缓存年龄，从未拉取成功时返回 None
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.inner
            .read_state()
            .as_ref()
            .map(|cached| Instant::now().saturating_duration_since(cached.fetched_at))
    }
}

impl CacheInner {
    fn fresh_lookup(&self) -> Option<TermLookup> {
        let state = self.read_state();
        let cached = state.as_ref()?;
        let age = Instant::now().saturating_duration_since(cached.fetched_at);

        if cached.expired || age >= self.policy.ttl {
            return None;
        }

        Some(TermLookup {
            terms: Arc::clone(&cached.terms),
            source: TermSource::Fresh,
        })
    }

    /// 单次刷新：成功则整体替换缓存，失败则降级；结束时释放 in-flight 槽位
    async fn refresh(self: Arc<Self>) -> TermLookup {
        let fetched = match AssertUnwindSafe(self.fetch_terms()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("过敏原目录拉取异常退出")),
        };

        let lookup = match fetched {
            Ok(terms) => {
                let terms = Arc::new(terms);
                tracing::info!("过敏原目录刷新成功: {} 个词条", terms.len());
                *self.write_state() = Some(CachedTerms {
                    terms: Arc::clone(&terms),
                    fetched_at: Instant::now(),
                    expired: false,
                });
                TermLookup {
                    terms,
                    source: TermSource::Refreshed,
                }
            }
            Err(err) => {
                let lookup = self.degraded_lookup();
                tracing::warn!(
                    "过敏原目录刷新失败，降级为 {:?} ({} 个词条): {}",
                    lookup.source,
                    lookup.terms.len(),
                    err
                );
                lookup
            }
        };

        *self.lock_in_flight() = None;
        lookup
    }

    async fn fetch_terms(&self) -> Result<TermSet> {
        let entries = tokio::time::timeout(self.policy.fetch_timeout, self.catalog.fetch_all())
            .await
            .map_err(|_| {
                anyhow::anyhow!("拉取过敏原目录超时 ({:?})", self.policy.fetch_timeout)
            })??;

        let terms = TermSet::from_entries(&entries);
        if terms.is_empty() {
            anyhow::bail!("过敏原目录没有可用词条 ({} 个条目)", entries.len());
        }

        Ok(terms)
    }

    /// 过期缓存优先，从未拉取成功时使用内置词表（不写入缓存）
    fn degraded_lookup(&self) -> TermLookup {
        match self.read_state().as_ref() {
            Some(cached) => TermLookup {
                terms: Arc::clone(&cached.terms),
                source: TermSource::Stale,
            },
            None => TermLookup {
                terms: fallback_terms(),
                source: TermSource::Fallback,
            },
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<CachedTerms>> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("过敏原缓存锁已 poisoned，继续使用恢复后的数据");
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<CachedTerms>> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("过敏原缓存锁已 poisoned，继续使用恢复后的数据");
                poisoned.into_inner()
            }
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
