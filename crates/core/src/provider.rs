//! Lazily initialized, shared conversion engine.
//!
//! The provider owns the engine handle and moves it through
//! `Uninitialized -> Initializing -> Ready`. Callers that arrive while an
//! initialization is running attach to the same pending result instead of
//! starting a second one. A failed initialization puts the provider back to
//! `Uninitialized`, so the next caller retries.

use crate::config::EngineConfig;
use crate::engine::PdfEngine;
use crate::error::{EngineError, Result};
use crate::libreoffice::LibreOfficeEngine;
use crate::progress::ProgressCallback;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, info, warn};

/// Outcome of one initialization attempt, shared by every waiter.
pub type EngineResult = std::result::Result<Arc<dyn PdfEngine>, Arc<EngineError>>;

type PendingInit = Shared<BoxFuture<'static, EngineResult>>;

/// Builds a fresh, uninitialized engine for each initialization attempt.
pub type EngineFactory = Box<dyn Fn() -> Result<Arc<dyn PdfEngine>> + Send + Sync>;

enum ProviderState {
    Uninitialized,
    Initializing { attempt: u64, pending: PendingInit },
    Ready(Arc<dyn PdfEngine>),
}

/// Coarse view of the provider's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Uninitialized,
    Initializing,
    Ready,
}

/// Hands out one shared, initialized engine.
pub struct ConverterProvider {
    factory: EngineFactory,
    state: Mutex<ProviderState>,
    attempts: AtomicU64,
}

impl std::fmt::Debug for ConverterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterProvider")
            .field("status", &self.status())
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish()
    }
}

impl ConverterProvider {
    /// Create a provider around an engine factory. Nothing is built until
    /// the first [`get`](Self::get).
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn PdfEngine>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(ProviderState::Uninitialized),
            attempts: AtomicU64::new(0),
        }
    }

    /// Provider backed by the bundled LibreOffice engine.
    pub fn libreoffice(config: EngineConfig) -> Self {
        Self::new(move || Ok(Arc::new(LibreOfficeEngine::new(config.clone())) as Arc<dyn PdfEngine>))
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ProviderStatus {
        match &*self.lock() {
            ProviderState::Uninitialized => ProviderStatus::Uninitialized,
            ProviderState::Initializing { .. } => ProviderStatus::Initializing,
            ProviderState::Ready(_) => ProviderStatus::Ready,
        }
    }

    /// Number of initialization attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Get a ready engine, initializing it if needed.
    ///
    /// `on_progress` only receives events when this call is the one that
    /// starts initialization; callers that join an attempt already in flight
    /// wait silently.
    pub async fn get(&self, on_progress: Option<ProgressCallback>) -> EngineResult {
        let (attempt, pending) = {
            let mut state = self.lock();
            let in_flight = match &*state {
                ProviderState::Ready(engine) if engine.is_ready() => {
                    return Ok(Arc::clone(engine));
                }
                ProviderState::Initializing { attempt, pending } => {
                    debug!("Joining in-flight engine initialization #{}", attempt);
                    Some((*attempt, pending.clone()))
                }
                ProviderState::Ready(engine) => {
                    warn!("Engine '{}' is no longer ready, re-initializing", engine.name());
                    None
                }
                ProviderState::Uninitialized => None,
            };
            match in_flight {
                Some(joined) => joined,
                None => self.start(&mut state, on_progress)?,
            }
        };

        let result = pending.await;
        self.settle(attempt, &result);
        result
    }

    fn start(
        &self,
        state: &mut ProviderState,
        on_progress: Option<ProgressCallback>,
    ) -> std::result::Result<(u64, PendingInit), Arc<EngineError>> {
        let engine = (self.factory)().map_err(Arc::new)?;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Initializing conversion engine '{}' (attempt #{})", engine.name(), attempt);

        let relay: ProgressCallback = Arc::new(move |percent: u8, message: &str| {
            debug!("Engine init {}%: {}", percent, message);
            if let Some(cb) = &on_progress {
                cb(percent, message);
            }
        });

        let pending = async move {
            engine.initialize(relay).await.map_err(Arc::new)?;
            Ok::<_, Arc<EngineError>>(engine)
        }
        .boxed()
        .shared();

        *state = ProviderState::Initializing {
            attempt,
            pending: pending.clone(),
        };
        Ok((attempt, pending))
    }

    /// Record the outcome of `attempt`, unless a newer state already replaced it.
    fn settle(&self, attempt: u64, result: &EngineResult) {
        let mut state = self.lock();
        let current = matches!(
            &*state,
            ProviderState::Initializing { attempt: a, .. } if *a == attempt
        );
        if !current {
            return;
        }
        match result {
            Ok(engine) => {
                info!("Conversion engine '{}' ready", engine.name());
                *state = ProviderState::Ready(Arc::clone(engine));
            }
            Err(e) => {
                warn!("Engine initialization #{} failed: {}", attempt, e);
                *state = ProviderState::Uninitialized;
            }
        }
    }
}

/// The process-wide provider used by [`Processor::presentation`] and
/// [`Processor::document`]: LibreOffice with default engine settings.
///
/// [`Processor::presentation`]: crate::Processor::presentation
/// [`Processor::document`]: crate::Processor::document
pub fn shared_provider() -> Arc<ConverterProvider> {
    static SHARED: OnceLock<Arc<ConverterProvider>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| Arc::new(ConverterProvider::libreoffice(EngineConfig::default()))))
}
