//! Importable modules: the fixed platform set plus deployment extensions.
//!
//! Nothing outside this allow-list can be imported. Extension modules are
//! Rhai sources compiled once at startup; there is no way for tenant code to
//! load a file or a native library.

use crate::error::{SandboxError, SandboxResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Module, Scope};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Modules every tenant may import.
pub const PLATFORM_MODULES: [&str; 4] = ["json", "base64", "crypto", "time"];

/// Source tag of extension module code, used to keep its frames out of
/// tenant stack traces.
pub(crate) fn extension_origin(name: &str) -> String {
    format!("module:{name}")
}

type FnResult<T> = Result<T, Box<EvalAltResult>>;

fn json_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("parse", |text: ImmutableString| -> FnResult<Dynamic> {
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Box::<EvalAltResult>::from(format!("json::parse: {e}")))?;
        rhai::serde::to_dynamic(value)
    });
    module.set_native_fn("stringify", |value: Dynamic| -> FnResult<String> {
        let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        Ok(value.to_string())
    });
    module
}

fn base64_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("encode", |text: ImmutableString| -> FnResult<String> {
        Ok(BASE64.encode(text.as_bytes()))
    });
    module.set_native_fn("decode", |text: ImmutableString| -> FnResult<String> {
        let bytes = BASE64
            .decode(text.as_bytes())
            .map_err(|e| Box::<EvalAltResult>::from(format!("base64::decode: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|_| "base64::decode: decoded bytes are not UTF-8".into())
    });
    module
}

fn crypto_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("sha256", |text: ImmutableString| -> FnResult<String> {
        Ok(hex::encode(Sha256::digest(text.as_bytes())))
    });
    module.set_native_fn("random_uuid", || -> FnResult<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    });
    module
}

fn time_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("now_unix", || -> FnResult<i64> {
        Ok(OffsetDateTime::now_utc().unix_timestamp())
    });
    module.set_native_fn("now_millis", || -> FnResult<i64> {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Ok((nanos / 1_000_000) as i64)
    });
    module.set_native_fn("now_rfc3339", || -> FnResult<String> {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| format!("time::now_rfc3339: {e}").into())
    });
    module
}

fn platform_module(name: &str) -> Option<Module> {
    match name {
        "json" => Some(json_module()),
        "base64" => Some(base64_module()),
        "crypto" => Some(crypto_module()),
        "time" => Some(time_module()),
        _ => None,
    }
}

/// The set of modules tenant code may import.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    module_dir: Option<PathBuf>,
    extensions: Vec<String>,
}

impl Capabilities {
    /// Platform modules only.
    pub fn platform() -> Self {
        Self::default()
    }

    /// Platform modules plus `{module_dir}/{name}.rhai` for every extension.
    pub fn with_extensions(module_dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            module_dir: Some(module_dir.into()),
            extensions,
        }
    }

    pub fn from_config(config: &runlet_core::config::SandboxConfig) -> Self {
        Self {
            module_dir: config.module_dir.clone(),
            extensions: config.allowed_modules.clone(),
        }
    }

    /// Every importable module name.
    pub fn allowed_modules(&self) -> Vec<String> {
        PLATFORM_MODULES
            .iter()
            .map(|name| name.to_string())
            .chain(self.extensions.iter().cloned())
            .collect()
    }

    fn extension_path(&self, name: &str) -> SandboxResult<PathBuf> {
        let dir = self.module_dir.as_deref().ok_or_else(|| {
            SandboxError::Config(format!("extension module {name} needs a module_dir"))
        })?;
        Ok(dir.join(format!("{name}.rhai")))
    }
}

fn platform_resolver() -> StaticModuleResolver {
    let mut resolver = StaticModuleResolver::new();
    for name in PLATFORM_MODULES {
        if let Some(module) = platform_module(name) {
            resolver.insert(name, module);
        }
    }
    resolver
}

fn load_extension(engine: &Engine, name: &str, path: &Path) -> SandboxResult<Module> {
    if PLATFORM_MODULES.contains(&name) {
        return Err(SandboxError::ModuleInvalid {
            name: name.to_string(),
            reason: "name shadows a platform module".to_string(),
        });
    }
    let source = std::fs::read_to_string(path).map_err(|source| SandboxError::ModuleIo {
        name: name.to_string(),
        source,
    })?;
    let mut ast = engine
        .compile(&source)
        .map_err(|e| SandboxError::ModuleInvalid {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    ast.set_source(extension_origin(name));
    let module = Module::eval_ast_as_new(Scope::new(), &ast, engine).map_err(|e| {
        SandboxError::ModuleInvalid {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })?;
    tracing::info!(module = name, path = %path.display(), "loaded sandbox extension module");
    Ok(module)
}

/// Build the resolver holding every allowed module.
///
/// `configure` is applied to the short-lived engine that evaluates extension
/// sources, so they run under the same limits as tenant code. Extensions may
/// import platform modules but not each other.
pub(crate) fn build_resolver(
    capabilities: &Capabilities,
    configure: impl Fn(&mut Engine),
) -> SandboxResult<StaticModuleResolver> {
    let mut resolver = platform_resolver();
    if capabilities.extensions.is_empty() {
        return Ok(resolver);
    }

    let mut loader = Engine::new();
    configure(&mut loader);
    loader.set_module_resolver(platform_resolver());

    for name in &capabilities.extensions {
        let path = capabilities.extension_path(name)?;
        let module = load_extension(&loader, name, &path)?;
        resolver.insert(name.as_str(), module);
    }
    Ok(resolver)
}
