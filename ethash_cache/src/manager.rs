use std::sync::Arc;
use std::time::Instant;

use containers::Epoch;
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{CacheError, CacheLoader, EpochProofCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Startup,
    Sync,
    Background,
}

impl LoadMode {
    fn as_str(self) -> &'static str {
        match self {
            LoadMode::Startup => "startup",
            LoadMode::Sync => "sync",
            LoadMode::Background => "background",
        }
    }
}

/// Double buffer of proof caches.
///
/// `next`, when set, always holds `current.epoch + 1`. It is unset while a
/// background preparation is pending.
struct CacheState {
    current: Arc<EpochProofCache>,
    next: Option<Arc<EpochProofCache>>,
}

/// Keeps the proof cache of the current epoch warm and prepares the next one
/// in the background.
///
/// Requests for the current epoch are answered immediately. Moving one epoch
/// forward promotes the prepared cache. Moving one epoch backward reloads
/// that epoch and keeps the old current cache as `next`. Any other jump
/// reloads synchronously. A cache for the wrong epoch is never returned.
pub struct EpochProofCacheManager<L: CacheLoader> {
    loader: Arc<L>,
    state: Arc<Mutex<CacheState>>,
    /// Serializes epoch transitions, held across blocking loads.
    transition: tokio::sync::Mutex<()>,
    prepare_requests: watch::Sender<Option<Epoch>>,
    worker: Mutex<Option<JoinHandle<Result<(), CacheError>>>>,
    /// Why the background worker stopped, once it has.
    worker_failure: Mutex<Option<String>>,
    metrics: Option<SharedMetrics>,
}

impl<L: CacheLoader> EpochProofCacheManager<L> {
    /// Load the cache for the epoch of `init_number` and schedule the next one.
    ///
    /// The initial load is synchronous and may take minutes on a cold epoch.
    pub async fn new(init_number: u64, loader: L) -> Result<Self, CacheError> {
        Self::with_metrics(init_number, loader, None).await
    }

    pub async fn with_metrics(
        init_number: u64,
        loader: L,
        metrics: Option<SharedMetrics>,
    ) -> Result<Self, CacheError> {
        let loader = Arc::new(loader);
        let epoch = Epoch::of(init_number);

        info!(epoch = epoch.0, init_number, "Loading initial epoch proof cache");
        let current = load_epoch(loader.clone(), epoch, LoadMode::Startup, metrics.as_ref()).await?;
        if let Some(metrics) = &metrics {
            metrics.set_epoch_current(epoch.0);
        }

        let state = Arc::new(Mutex::new(CacheState {
            current,
            next: None,
        }));
        let (prepare_requests, requests) = watch::channel(None);
        let worker = tokio::spawn(prepare_worker(
            loader.clone(),
            state.clone(),
            requests,
            metrics.clone(),
        ));

        let manager = Self {
            loader,
            state,
            transition: tokio::sync::Mutex::new(()),
            prepare_requests,
            worker: Mutex::new(Some(worker)),
            worker_failure: Mutex::new(None),
            metrics,
        };
        {
            let state = manager.state.lock();
            manager.schedule_next(&state)?;
        }

        Ok(manager)
    }

    /// Proof cache for the epoch containing block `number`.
    pub async fn get_cache(&self, number: u64) -> Result<Arc<EpochProofCache>, CacheError> {
        let epoch = Epoch::of(number);
        if let Some(cache) = self.current_for(epoch) {
            return Ok(cache);
        }

        let _transition = self.transition.lock().await;
        self.check_worker().await?;

        // Another caller may have switched epochs while we waited.
        let (current_epoch, ready_next) = {
            let state = self.state.lock();
            if state.current.epoch == epoch {
                return Ok(state.current.clone());
            }
            (state.current.epoch, state.next.clone())
        };

        let current = if epoch == current_epoch.next() {
            let current = match ready_next {
                Some(next) => {
                    info!(epoch = epoch.0, "Promoting prepared epoch proof cache");
                    next
                }
                None => {
                    warn!(epoch = epoch.0, "Next epoch proof cache not ready, loading synchronously");
                    self.load(epoch).await?
                }
            };

            let mut state = self.state.lock();
            state.current = current.clone();
            state.next = None;
            self.schedule_next(&state)?;
            current
        } else if Some(epoch) == current_epoch.prev() {
            info!(
                epoch = epoch.0,
                current_epoch = current_epoch.0,
                "Moving back one epoch, demoting current proof cache to next"
            );
            let current = self.load(epoch).await?;

            let mut state = self.state.lock();
            let demoted = std::mem::replace(&mut state.current, current.clone());
            state.next = Some(demoted);
            current
        } else {
            info!(
                epoch = epoch.0,
                current_epoch = current_epoch.0,
                "Epoch jump, loading proof cache synchronously"
            );
            let current = self.load(epoch).await?;

            let mut state = self.state.lock();
            state.current = current.clone();
            state.next = None;
            self.schedule_next(&state)?;
            current
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_epoch_current(epoch.0);
        }
        Ok(current)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.state.lock().current.epoch
    }

    /// Epoch of the prepared cache, `None` while preparation is pending.
    pub fn next_epoch(&self) -> Option<Epoch> {
        self.state.lock().next.as_ref().map(|next| next.epoch)
    }

    fn current_for(&self, epoch: Epoch) -> Option<Arc<EpochProofCache>> {
        let state = self.state.lock();
        (state.current.epoch == epoch).then(|| state.current.clone())
    }

    async fn load(&self, epoch: Epoch) -> Result<Arc<EpochProofCache>, CacheError> {
        load_epoch(self.loader.clone(), epoch, LoadMode::Sync, self.metrics.as_ref()).await
    }

    fn schedule_next(&self, state: &CacheState) -> Result<(), CacheError> {
        if let Some(next) = &state.next {
            return Err(CacheError::InvariantViolation(format!(
                "preparation of epoch {} requested while epoch {} is already prepared",
                state.current.epoch.next(),
                next.epoch
            )));
        }

        let epoch = state.current.epoch.next();
        debug!(epoch = epoch.0, "Scheduling background proof cache preparation");
        self.prepare_requests.send_replace(Some(epoch));
        Ok(())
    }

    /// Surface a hard failure of the background worker. Once the worker has
    /// stopped, every later transition fails with the same reason.
    async fn check_worker(&self) -> Result<(), CacheError> {
        let failure = self.worker_failure.lock().clone();
        if let Some(reason) = failure {
            return Err(CacheError::Worker(reason));
        }

        let finished = {
            let mut worker = self.worker.lock();
            if worker.as_ref().is_some_and(|handle| handle.is_finished()) {
                worker.take()
            } else {
                None
            }
        };

        let Some(handle) = finished else {
            return Ok(());
        };

        let err = match handle.await {
            Ok(Err(err)) => err,
            Ok(Ok(())) => CacheError::Worker("background preparation stopped".to_string()),
            Err(err) => CacheError::Worker(err.to_string()),
        };
        error!(%err, "Proof cache preparation worker stopped");
        *self.worker_failure.lock() = Some(err.to_string());
        Err(err)
    }
}

impl<L: CacheLoader> Drop for EpochProofCacheManager<L> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

async fn load_epoch<L: CacheLoader>(
    loader: Arc<L>,
    epoch: Epoch,
    mode: LoadMode,
    metrics: Option<&SharedMetrics>,
) -> Result<Arc<EpochProofCache>, CacheError> {
    let started = Instant::now();
    let cache = tokio::task::spawn_blocking(move || loader.make_cache(epoch))
        .await
        .map_err(|err| CacheError::Worker(err.to_string()))??;

    if cache.epoch != epoch {
        return Err(CacheError::EpochMismatch {
            expected: epoch,
            got: cache.epoch,
        });
    }

    let elapsed = started.elapsed();
    if let Some(metrics) = metrics {
        metrics.inc_epoch_cache_loads(mode.as_str());
        metrics.observe_epoch_cache_load_time(elapsed.as_secs_f64());
    }
    info!(
        epoch = epoch.0,
        mode = mode.as_str(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Epoch proof cache loaded"
    );

    Ok(Arc::new(cache))
}

/// Prepares requested epochs one at a time. Only the latest request matters.
async fn prepare_worker<L: CacheLoader>(
    loader: Arc<L>,
    state: Arc<Mutex<CacheState>>,
    mut requests: watch::Receiver<Option<Epoch>>,
    metrics: Option<SharedMetrics>,
) -> Result<(), CacheError> {
    while requests.changed().await.is_ok() {
        let requested = *requests.borrow_and_update();
        let Some(epoch) = requested else {
            continue;
        };

        let prepared = state
            .lock()
            .next
            .as_ref()
            .is_some_and(|next| next.epoch == epoch);
        if prepared {
            continue;
        }

        match load_epoch(loader.clone(), epoch, LoadMode::Background, metrics.as_ref()).await {
            Ok(cache) => install_next(&state, cache)?,
            Err(err) => {
                // Fail soft: a later get_cache loads this epoch synchronously.
                warn!(epoch = epoch.0, %err, "Background proof cache preparation failed");
            }
        }
    }

    debug!("Proof cache preparation worker stopped");
    Ok(())
}

fn install_next(state: &Mutex<CacheState>, cache: Arc<EpochProofCache>) -> Result<(), CacheError> {
    let mut state = state.lock();
    let wanted = state.current.epoch.next();

    if cache.epoch != wanted {
        debug!(
            epoch = cache.epoch.0,
            wanted = wanted.0,
            "Discarding stale proof cache preparation"
        );
        return Ok(());
    }

    match &state.next {
        None => {
            info!(epoch = cache.epoch.0, "Next epoch proof cache ready");
            state.next = Some(cache);
            Ok(())
        }
        Some(next) if next.epoch == cache.epoch => Ok(()),
        Some(next) => Err(CacheError::InvariantViolation(format!(
            "next holds epoch {} while current is epoch {}",
            next.epoch, state.current.epoch
        ))),
    }
}
