use crate::domain::model::{Roster, SourceStatus};
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Status-map key used when the roster could not be built at all, e.g. the
/// source registry was unreachable.
pub const REGISTRY_STATUS_KEY: &str = "_registry";

#[async_trait]
pub trait RosterBuilder: Send + Sync {
    async fn build(&self) -> Result<Roster>;
}

struct CachedRoster {
    roster: Arc<Roster>,
    /// False when this is the placeholder left behind by a failed first build.
    healthy: bool,
}

/// Last built roster plus single-flight rebuild control.
///
/// Readers always get a whole `Arc<Roster>`; the slot is swapped in one write,
/// so students and statuses from different builds are never mixed.
pub struct RosterCache<B: RosterBuilder> {
    builder: B,
    ttl: Duration,
    current: RwLock<Option<CachedRoster>>,
    rebuild_lock: Mutex<()>,
    started: AtomicU64,
    completed: AtomicU64,
}

impl<B: RosterBuilder> RosterCache<B> {
    pub fn new(builder: B) -> Self {
        Self::with_ttl(builder, DEFAULT_TTL)
    }

    pub fn with_ttl(builder: B, ttl: Duration) -> Self {
        Self {
            builder,
            ttl,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of rebuilds started since the cache was created.
    pub fn rebuild_count(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Current roster without triggering a rebuild.
    pub async fn peek(&self) -> Option<Arc<Roster>> {
        self.current.read().await.as_ref().map(|c| c.roster.clone())
    }

    pub async fn get_roster(&self, force_refresh: bool) -> Arc<Roster> {
        if !force_refresh {
            if let Some(roster) = self.fresh().await {
                tracing::debug!("📦 Serving cached roster built at {}", roster.built_at);
                return roster;
            }
        }

        let started_ticket = self.started.load(Ordering::SeqCst);
        let completed_ticket = self.completed.load(Ordering::SeqCst);

        let _guard = match self.rebuild_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if !force_refresh {
                    if let Some(previous) = self.peek().await {
                        tracing::debug!("⏳ Rebuild in flight, serving previous roster");
                        return previous;
                    }
                }
                self.rebuild_lock.lock().await
            }
        };

        // 等待鎖期間若已有重建完成，直接沿用其結果
        let reusable = if force_refresh {
            self.started.load(Ordering::SeqCst) != started_ticket
        } else {
            self.completed.load(Ordering::SeqCst) != completed_ticket || self.fresh().await.is_some()
        };
        if reusable {
            if let Some(roster) = self.peek().await {
                return roster;
            }
        }

        self.started.fetch_add(1, Ordering::SeqCst);
        let roster = self.rebuild().await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        roster
    }

    async fn fresh(&self) -> Option<Arc<Roster>> {
        let current = self.current.read().await;
        let cached = current.as_ref().filter(|c| c.healthy)?;
        // 時鐘回撥時視為仍有效
        let fresh = (Utc::now() - cached.roster.built_at)
            .to_std()
            .map(|age| age < self.ttl)
            .unwrap_or(true);
        fresh.then(|| cached.roster.clone())
    }

    async fn rebuild(&self) -> Arc<Roster> {
        tracing::info!("🔄 Refreshing roster cache...");

        match self.builder.build().await {
            Ok(roster) => {
                let errors = roster
                    .source_status
                    .values()
                    .filter(|s| !s.is_connected())
                    .count();
                tracing::info!(
                    "✅ Cached {} student(s) from {} source(s), {} failed",
                    roster.students.len(),
                    roster.source_status.len(),
                    errors
                );
                let roster = Arc::new(roster);
                *self.current.write().await = Some(CachedRoster {
                    roster: roster.clone(),
                    healthy: true,
                });
                roster
            }
            Err(e) => {
                let mut current = self.current.write().await;
                if let Some(previous) = current.as_ref() {
                    tracing::warn!(
                        "⚠️ Roster rebuild failed, keeping roster built at {}: {}",
                        previous.roster.built_at,
                        e
                    );
                    return previous.roster.clone();
                }

                tracing::error!("❌ Roster rebuild failed with no previous roster: {}", e);
                let roster = Arc::new(failed_roster(&e));
                *current = Some(CachedRoster {
                    roster: roster.clone(),
                    healthy: false,
                });
                roster
            }
        }
    }
}

fn failed_roster(error: &PortalError) -> Roster {
    let now = Utc::now();
    let mut roster = Roster::empty(now);
    roster.source_status.insert(
        REGISTRY_STATUS_KEY.to_string(),
        SourceStatus::Error {
            error: error.to_string(),
            timestamp: now,
        },
    );
    roster
}
