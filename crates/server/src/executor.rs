//! The execute path: cache lookup, fetch and compile on a miss, invoke.

use crate::coordinator::Coordinator;
use crate::metrics;
use runlet_core::{Error, Result, ScriptIdentity};
use runlet_sandbox::{
    CompiledHandler, HandlerCache, InvocationRequest, InvocationResponse, SandboxEngine,
};
use std::sync::Arc;
use tracing::instrument;

pub struct Executor {
    coordinator: Arc<Coordinator>,
    engine: SandboxEngine,
    cache: Arc<HandlerCache<CompiledHandler>>,
}

fn outcome_of(err: &Error) -> &'static str {
    match err {
        Error::NotFound(_) => "not_found",
        Error::CompileError(_) | Error::InvalidContent(_) => "compile_error",
        Error::TenantRuntime(_) => "tenant_error",
        Error::StoreUnavailable(_) => "store_error",
        _ => "other",
    }
}

impl Executor {
    pub fn new(
        coordinator: Arc<Coordinator>,
        engine: SandboxEngine,
        cache: Arc<HandlerCache<CompiledHandler>>,
    ) -> Self {
        Self {
            coordinator,
            engine,
            cache,
        }
    }

    /// Run the script registered as (scope, name) against one request.
    ///
    /// A (scope, name) pair that could never have been stored is reported as
    /// not found.
    #[instrument(skip(self, request, debug), fields(method = %request.method))]
    pub async fn execute(
        &self,
        scope: &str,
        name: &str,
        request: InvocationRequest,
        debug: bool,
    ) -> Result<InvocationResponse> {
        let result = self.execute_inner(scope, name, request, debug).await;
        match &result {
            Ok(_) => metrics::record_execution("success"),
            Err(err) => metrics::record_execution(outcome_of(err)),
        }
        result
    }

    async fn execute_inner(
        &self,
        scope: &str,
        name: &str,
        request: InvocationRequest,
        debug: bool,
    ) -> Result<InvocationResponse> {
        let identity = ScriptIdentity::parse(scope, name)
            .map_err(|_| Error::NotFound(format!("script {scope}/{name}")))?;
        let key = identity.cache_key();

        let handler = match self.cache.get(&key) {
            Some(handler) => {
                metrics::HANDLER_CACHE_HITS.inc();
                handler
            }
            None => {
                metrics::HANDLER_CACHE_MISSES.inc();
                self.load(&identity, &key).await?
            }
        };

        let timer = metrics::INVOCATION_DURATION.start_timer();
        let result = self.engine.execute(handler, request, debug).await;
        timer.observe_duration();
        result.map_err(Error::TenantRuntime)
    }

    /// Fetch, compile and cache a handler.
    async fn load(&self, identity: &ScriptIdentity, key: &str) -> Result<Arc<CompiledHandler>> {
        let ticket = self.cache.begin_fill();
        let source = self.coordinator.fetch_source(identity).await?;

        let engine = self.engine.clone();
        let origin = format!("lambda:{identity}");
        let compiled = tokio::task::spawn_blocking(move || {
            engine.compile(&origin, &source.content, source.env.as_ref())
        })
        .await
        .map_err(|e| Error::CompileError(format!("compile task failed: {e}")))?;

        let handler = match compiled {
            Ok(handler) => Arc::new(handler),
            Err(err) => {
                metrics::COMPILE_FAILURES.inc();
                tracing::info!(script = %identity, error = %err, "script failed to compile");
                return Err(err.into());
            }
        };

        if self.cache.set_if_fresh(key, Arc::clone(&handler), ticket) {
            metrics::HANDLER_CACHE_ENTRIES.set(self.cache.len() as i64);
        } else {
            tracing::debug!(script = %identity, "script changed while compiling, not caching");
        }
        Ok(handler)
    }
}
