//! Built-in `fs` modules
//!
//! Exercise files commonly read sibling data files through Node's `fs` API.
//! The engine has no such module, so the loader serves a small synthetic one:
//!
//! | Specifier | Exports |
//! | --- | --- |
//! | `fs`, `node:fs` | `readFile(path, [options], callback)`, `readFileSync(path)`, `promises`, `default` |
//! | `fs/promises`, `node:fs/promises` | `readFile(path)`, `default` |
//!
//! Files are always decoded as UTF-8 text, whatever encoding option is given.

use std::fs;

use boa_engine::module::{SyntheticModule, SyntheticModuleInitializer};
use boa_engine::object::ObjectInitializer;
use boa_engine::object::builtins::JsPromise;
use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, Module, NativeFunction, js_string,
};

/// A module served by the host instead of the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModule {
    Fs,
    FsPromises,
}

impl BuiltinModule {
    /// Map an import specifier to a built-in module.
    pub fn from_specifier(specifier: &str) -> Option<Self> {
        match specifier {
            "fs" | "node:fs" => Some(BuiltinModule::Fs),
            "fs/promises" | "node:fs/promises" => Some(BuiltinModule::FsPromises),
            _ => None,
        }
    }

    /// Build a fresh synthetic module instance.
    pub fn create(self, context: &mut Context) -> Module {
        match self {
            BuiltinModule::Fs => Module::synthetic(
                &[
                    js_string!("default"),
                    js_string!("readFile"),
                    js_string!("readFileSync"),
                    js_string!("promises"),
                ],
                SyntheticModuleInitializer::from_copy_closure(init_fs),
                None,
                None,
                context,
            ),
            BuiltinModule::FsPromises => Module::synthetic(
                &[js_string!("default"), js_string!("readFile")],
                SyntheticModuleInitializer::from_copy_closure(init_fs_promises),
                None,
                None,
                context,
            ),
        }
    }
}

fn init_fs(module: &SyntheticModule, context: &mut Context) -> JsResult<()> {
    let namespace = fs_object(context);
    export_members(module, &namespace, &["readFile", "readFileSync", "promises"], context)
}

fn init_fs_promises(module: &SyntheticModule, context: &mut Context) -> JsResult<()> {
    let namespace = promises_object(context);
    export_members(module, &namespace, &["readFile"], context)
}

/// Export `namespace` as `default` and each listed member under its own name.
fn export_members(
    module: &SyntheticModule,
    namespace: &JsObject,
    members: &[&str],
    context: &mut Context,
) -> JsResult<()> {
    for &member in members {
        let value = namespace.get(JsString::from(member), context)?;
        module.set_export(&JsString::from(member), value)?;
    }
    module.set_export(&js_string!("default"), namespace.clone().into())
}

fn fs_object(context: &mut Context) -> JsObject {
    let promises = promises_object(context);
    ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(read_file_callback), js_string!("readFile"), 3)
        .function(NativeFunction::from_fn_ptr(read_file_sync), js_string!("readFileSync"), 2)
        .property(js_string!("promises"), promises, Attribute::all())
        .build()
}

fn promises_object(context: &mut Context) -> JsObject {
    ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(read_file_promise), js_string!("readFile"), 2)
        .build()
}

// ============================================================================
// Native functions
// ============================================================================

fn read_text(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let path = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    fs::read_to_string(&path).map_err(|e| {
        JsNativeError::error()
            .with_message(format!("{e}, open '{path}'"))
            .into()
    })
}

/// `fs.readFileSync(path)`
fn read_file_sync(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let text = read_text(args, context)?;
    Ok(JsString::from(text).into())
}

/// `fs.promises.readFile(path)`
fn read_file_promise(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let promise = match read_text(args, context) {
        Ok(text) => JsPromise::resolve(JsString::from(text), context),
        Err(err) => JsPromise::reject(err, context),
    };
    Ok(promise.into())
}

/// `fs.readFile(path, [options], callback)`
///
/// The callback runs before `readFile` returns.
fn read_file_callback(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let Some(callback) = args.iter().skip(1).rev().find_map(JsValue::as_callable).cloned() else {
        return Err(JsNativeError::typ()
            .with_message("the \"cb\" argument must be of type function")
            .into());
    };

    let outcome = match read_text(args, context) {
        Ok(text) => [JsValue::null(), JsString::from(text).into()],
        Err(err) => [err.to_opaque(context), JsValue::undefined()],
    };
    callback.call(&JsValue::undefined(), &outcome, context)?;
    Ok(JsValue::undefined())
}
