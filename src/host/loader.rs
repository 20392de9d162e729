//! Dynamic module loader
//!
//! Loads the patched temp file as an ES module by absolute path, drives its
//! evaluation to completion, and collects the export map in declaration order.
//!
//! Module namespace objects enumerate their keys alphabetically, so the export
//! map is built from the patcher's declaration list rather than from the
//! namespace itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use boa_engine::builtins::promise::PromiseState;
use boa_engine::module::{ModuleLoader, Referrer, SimpleModuleLoader};
use boa_engine::object::builtins::JsPromise;
use boa_engine::property::{Attribute, PropertyKey};
use boa_engine::{Context, JsError, JsObject, JsResult, JsString, JsValue, Module, Source, js_string};
use boa_runtime::Console;
use thiserror::Error;

use super::fs::BuiltinModule;
use crate::cli::executor::{ExportEntry, ExportRunner, InvocationError};
use crate::frontend::artifact::TempArtifact;
use crate::frontend::patcher::{DeclKind, Declaration};

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a run before any export is invoked.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read patched module '{}': {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("syntax error in patched module: {0}")]
    Parse(String),

    #[error("patched module threw during evaluation: {0}")]
    Evaluate(String),

    #[error("patched module never finished evaluating (pending top-level await)")]
    Unsettled,

    #[error("failed to initialise the JavaScript engine: {0}")]
    Engine(String),
}

// ============================================================================
// Module loader
// ============================================================================

/// Resolves built-in modules itself and everything else from disk.
struct HostModuleLoader {
    files: SimpleModuleLoader,
    builtins: RefCell<HashMap<BuiltinModule, Module>>,
}

impl HostModuleLoader {
    fn new(root: &Path) -> JsResult<Self> {
        Ok(Self {
            files: SimpleModuleLoader::new(root)?,
            builtins: RefCell::new(HashMap::new()),
        })
    }
}

impl ModuleLoader for HostModuleLoader {
    fn load_imported_module(
        &self,
        referrer: Referrer,
        specifier: JsString,
        finish_load: Box<dyn FnOnce(JsResult<Module>, &mut Context)>,
        context: &mut Context,
    ) {
        let name = specifier.to_std_string_escaped();
        if let Some(builtin) = BuiltinModule::from_specifier(&name) {
            let module = self
                .builtins
                .borrow_mut()
                .entry(builtin)
                .or_insert_with(|| builtin.create(context))
                .clone();
            finish_load(Ok(module), context);
            return;
        }

        tracing::debug!(specifier = %name, "loading module from disk");
        self.files.load_imported_module(referrer, specifier, finish_load, context);
    }
}

// ============================================================================
// Export map
// ============================================================================

/// A named export of the loaded module.
#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub kind: DeclKind,
    pub value: JsObject,
}

/// Exports in source declaration order, unique by name.
#[derive(Debug, Clone, Default)]
pub struct ExportMap {
    entries: Vec<Export>,
}

impl ExportMap {
    /// Declared exports first, in source order, then any other callable
    /// namespace entries (export lists, destructured bindings) in namespace
    /// key order.
    fn collect(namespace: &JsObject, declarations: &[Declaration], context: &mut Context) -> Result<Self, LoadError> {
        let mut map = Self {
            entries: Vec::with_capacity(declarations.len()),
        };

        for declaration in declarations {
            map.insert(namespace, &declaration.name, declaration.kind, context)?;
        }

        let keys = namespace
            .own_property_keys(context)
            .map_err(|e| LoadError::Evaluate(describe_error(&e, context).to_string()))?;
        for key in keys {
            let PropertyKey::String(name) = key else {
                continue;
            };
            let name = name.to_std_string_escaped();
            if map.get(&name).is_none() {
                tracing::debug!(name = %name, "export not declared in source, treating as function");
                map.insert(namespace, &name, DeclKind::Function { is_async: false }, context)?;
            }
        }

        Ok(map)
    }

    /// Add `name` if it is new and its value is callable.
    fn insert(&mut self, namespace: &JsObject, name: &str, kind: DeclKind, context: &mut Context) -> Result<(), LoadError> {
        if self.get(name).is_some() {
            return Ok(());
        }
        let value = namespace
            .get(JsString::from(name), context)
            .map_err(|e| LoadError::Evaluate(describe_error(&e, context).to_string()))?;
        let Some(object) = value.as_callable().cloned() else {
            tracing::debug!(name = %name, "export is not callable, skipping");
            return Ok(());
        };
        self.entries.push(Export {
            name: name.to_string(),
            kind,
            value: object,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Export> {
        self.entries.iter()
    }
}

// ============================================================================
// Loaded module
// ============================================================================

/// An evaluated module together with the engine context that owns it.
pub struct LoadedModule {
    context: Context,
    exports: ExportMap,
}

impl LoadedModule {
    pub fn exports(&self) -> &ExportMap {
        &self.exports
    }

    /// Settle a call result: returned promises are awaited by draining jobs.
    fn settle(&mut self, value: JsValue) -> Result<(), InvocationError> {
        if !value.is_promise() {
            return Ok(());
        }
        let Some(object) = value.as_object() else {
            return Ok(());
        };
        let promise =
            JsPromise::from_object(object.clone()).map_err(|e| describe_error(&e, &mut self.context))?;

        match promise.state() {
            PromiseState::Fulfilled(_) => Ok(()),
            PromiseState::Rejected(reason) => Err(describe_error(&JsError::from_opaque(reason), &mut self.context)),
            PromiseState::Pending => Err(InvocationError::new("returned a promise that never settled")),
        }
    }
}

impl ExportRunner for LoadedModule {
    fn entries(&self) -> Vec<ExportEntry> {
        self.exports
            .iter()
            .map(|e| ExportEntry {
                name: e.name.clone(),
                kind: e.kind,
            })
            .collect()
    }

    fn invoke(&mut self, name: &str) -> Result<(), InvocationError> {
        let Some(export) = self.exports.get(name) else {
            return Err(InvocationError::new(format!("no export named '{name}'")));
        };
        let function = export.value.clone();

        let result = function.call(&JsValue::undefined(), &[], &mut self.context);
        self.context.run_jobs();

        match result {
            Ok(value) => self.settle(value),
            Err(err) => Err(describe_error(&err, &mut self.context)),
        }
    }
}

/// Convert an engine error into a printable invocation error.
///
/// Uses the native error kind and message when the thrown value is an error
/// object, the `stack` property when the object has one, and the first
/// `cause` in the chain.
fn describe_error(err: &JsError, context: &mut Context) -> InvocationError {
    let trace = err
        .as_opaque()
        .and_then(JsValue::as_object)
        .and_then(|object| object.get(js_string!("stack"), context).ok())
        .and_then(|stack| stack.as_string().map(JsString::to_std_string_escaped));

    let message = match err.try_native(context) {
        Ok(native) => match native.cause() {
            Some(cause) => format!("{native}\n  caused by: {cause}"),
            None => native.to_string(),
        },
        Err(_) => format!("Uncaught {err}"),
    };

    InvocationError { message, trace }
}

// ============================================================================
// Entry point
// ============================================================================

fn install_console(context: &mut Context) -> Result<(), LoadError> {
    let console = Console::init(context);
    context
        .register_global_property(
            js_string!(Console::NAME),
            console,
            Attribute::WRITABLE | Attribute::CONFIGURABLE,
        )
        .map_err(|e| LoadError::Engine(e.to_string()))
}

/// Load the patched module held by `artifact`.
///
/// `declarations` come from the patcher and fix the export map's order.
#[tracing::instrument(skip_all, fields(path = %artifact.path().display()))]
pub fn load(artifact: &TempArtifact, declarations: &[Declaration]) -> Result<LoadedModule, LoadError> {
    let path = artifact.path();

    // Relative imports may climb above the temp directory.
    let root = path.ancestors().last().unwrap_or(path);
    let loader = HostModuleLoader::new(root).map_err(|e| LoadError::Engine(e.to_string()))?;

    let mut context = Context::builder()
        .module_loader(Rc::new(loader))
        .build()
        .map_err(|e| LoadError::Engine(e.to_string()))?;
    install_console(&mut context)?;

    let source = Source::from_filepath(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let module = Module::parse(source, None, &mut context)
        .map_err(|e| LoadError::Parse(describe_error(&e, &mut context).to_string()))?;

    let promise = module.load_link_evaluate(&mut context);
    context.run_jobs();

    match promise.state() {
        PromiseState::Fulfilled(_) => {}
        PromiseState::Rejected(reason) => {
            let err = JsError::from_opaque(reason);
            return Err(LoadError::Evaluate(describe_error(&err, &mut context).to_string()));
        }
        PromiseState::Pending => return Err(LoadError::Unsettled),
    }

    let namespace = module.namespace(&mut context);
    let exports = ExportMap::collect(&namespace, declarations, &mut context)?;
    tracing::info!(exports = exports.iter().count(), "loaded patched module");

    Ok(LoadedModule { context, exports })
}
