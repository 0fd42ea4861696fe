//! The sandboxed Rhai engine: compile tenant source into handlers and run them.

use crate::context::{InvocationRequest, InvocationResponse, RequestContext};
use crate::contract::{self, ENTRY_FN, EXPORT_NAME};
use crate::error::{CompileError, SandboxResult};
use crate::modules::{self, Capabilities};
use crate::stack;
use rhai::{AST, CallFnOptions, Dynamic, Engine, FnAccess, FnPtr, Map, Module, Scope};
use runlet_core::TenantError;
use runlet_core::config::SandboxLimits;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Log target for tenant `print` and `debug` output.
pub const TENANT_LOG_TARGET: &str = "runlet::tenant";

/// A script compiled against a frozen env, ready to be invoked.
pub struct CompiledHandler {
    ast: AST,
    origin: String,
    env: Map,
    tenant_fns: HashSet<String>,
}

impl CompiledHandler {
    /// Identifies the script in logs and stack frames.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl std::fmt::Debug for CompiledHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledHandler")
            .field("origin", &self.origin)
            .field("functions", &self.tenant_fns)
            .finish_non_exhaustive()
    }
}

fn apply_limits(engine: &mut Engine, limits: &SandboxLimits) {
    engine
        .set_max_operations(limits.max_operations)
        .set_max_call_levels(limits.max_call_levels)
        .set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth)
        .set_max_string_size(limits.max_string_size)
        .set_max_array_size(limits.max_array_size)
        .set_max_map_size(limits.max_map_size);
}

fn restrict(engine: &mut Engine, limits: &SandboxLimits) {
    apply_limits(engine, limits);
    engine.disable_symbol("eval");
    engine.on_print(|text| {
        tracing::info!(target: TENANT_LOG_TARGET, "{text}");
    });
    engine.on_debug(|text, source, pos| {
        tracing::debug!(
            target: TENANT_LOG_TARGET,
            source = source.unwrap_or_default(),
            position = %pos,
            "{text}"
        );
    });
}

/// Convert a stored env document into the map handlers read.
pub fn freeze_env(env: Option<&serde_json::Value>) -> Result<Map, CompileError> {
    let Some(value) = env else {
        return Ok(Map::new());
    };
    if !value.is_object() {
        return Err(CompileError::new("env must be a JSON object"));
    }
    rhai::serde::to_dynamic(value)
        .map_err(|e| CompileError::new(format!("env cannot be converted: {e}")))?
        .try_cast::<Map>()
        .ok_or_else(|| CompileError::new("env must be a JSON object"))
}

/// Engine shared by every compile and invocation in the process.
#[derive(Clone)]
pub struct SandboxEngine {
    engine: Arc<Engine>,
    allowed_modules: Arc<Vec<String>>,
}

impl SandboxEngine {
    /// Build the engine. Extension modules are read and evaluated here, so a
    /// broken module fails startup instead of the first request.
    pub fn new(capabilities: &Capabilities, limits: &SandboxLimits) -> SandboxResult<Self> {
        let resolver = modules::build_resolver(capabilities, |e| restrict(e, limits))?;

        let mut engine = Engine::new();
        restrict(&mut engine, limits);
        engine.set_module_resolver(resolver);
        engine.build_type::<RequestContext>();

        let allowed_modules = capabilities.allowed_modules();
        tracing::info!(modules = ?allowed_modules, "sandbox engine ready");
        Ok(Self {
            engine: Arc::new(engine),
            allowed_modules: Arc::new(allowed_modules),
        })
    }

    pub fn allowed_modules(&self) -> &[String] {
        &self.allowed_modules
    }

    /// Compile `source` into a handler. `origin` names the script in stack
    /// frames; `env` is frozen into the handler.
    #[instrument(skip(self, source, env))]
    pub fn compile(
        &self,
        origin: &str,
        source: &str,
        env: Option<&serde_json::Value>,
    ) -> Result<CompiledHandler, CompileError> {
        contract::check(source)?;
        let env = freeze_env(env)?;

        let mut ast = self
            .engine
            .compile(source)
            .map_err(|e| CompileError::new(e.to_string()))?;
        ast.set_source(origin);

        let has_entry = ast.iter_functions().any(|f| {
            f.name == ENTRY_FN && f.params.len() == 1 && f.access == FnAccess::Public
        });
        if !has_entry {
            return Err(CompileError::new(format!(
                "`{ENTRY_FN}` must be a public function taking one parameter"
            )));
        }
        let tenant_fns = ast.iter_functions().map(|f| f.name.to_string()).collect();

        let module = Module::eval_ast_as_new(Scope::new(), &ast, &self.engine).map_err(|e| {
            CompileError::new(stack::tenant_error(&e, origin, &tenant_fns, false).message)
        })?;
        match module.get_var_value::<FnPtr>(EXPORT_NAME) {
            Some(ptr) if ptr.fn_name() == ENTRY_FN => {}
            _ => {
                return Err(CompileError::new(format!(
                    "`{EXPORT_NAME}` must export `Fn(\"{ENTRY_FN}\")`"
                )));
            }
        }

        Ok(CompiledHandler {
            ast,
            origin: origin.to_string(),
            env,
            tenant_fns,
        })
    }

    /// Invoke a handler on the blocking pool and await its response.
    pub async fn execute(
        &self,
        handler: Arc<CompiledHandler>,
        request: InvocationRequest,
        debug: bool,
    ) -> Result<InvocationResponse, TenantError> {
        let engine = Arc::clone(&self.engine);
        let origin = handler.origin.clone();
        let task = tokio::task::spawn_blocking(move || invoke(&engine, &handler, request, debug));
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                tracing::error!(origin = %origin, "tenant handler panicked");
                Err(TenantError::new("handler panicked"))
            }
            Err(err) => Err(TenantError::new(format!("handler task failed: {err}"))),
        }
    }
}

fn invoke(
    engine: &Engine,
    handler: &CompiledHandler,
    request: InvocationRequest,
    debug: bool,
) -> Result<InvocationResponse, TenantError> {
    let ctx = RequestContext::new(request, handler.env.clone());
    // Top-level statements run again so top-level imports are in scope.
    let returned = engine
        .call_fn_with_options::<Dynamic>(
            CallFnOptions::new(),
            &mut Scope::new(),
            &handler.ast,
            ENTRY_FN,
            (ctx.clone(),),
        )
        .map_err(|e| {
            let e = stack::with_entry_frame(e, ENTRY_FN, &handler.origin);
            stack::tenant_error(&e, &handler.origin, &handler.tenant_fns, debug)
        })?;
    ctx.into_response(returned).map_err(TenantError::new)
}
