//! Loading message functions from `.so` plugins.

use std::sync::Arc;

use libloading::{Library, Symbol};

use function_api::{
    AbiVersionFn, CreateFunctionFn, Disposition, FUNCTION_ABI_VERSION, Function, FunctionContext,
    FunctionError, PluginCreateResult,
};

const ABI_VERSION_SYMBOL: &[u8] = b"qs_abi_version";
const CREATE_SYMBOL: &[u8] = b"qs_create_function";

/// Загрузить .so плагин функции: проверить ABI version, вызвать
/// `qs_create_function`, забрать результат как `Box<dyn Function>`.
///
/// Возвращает (inner, library). Порядок drop важен: inner первым.
///
/// # Safety
/// Плагин должен экспортировать `qs_create_function` с сигнатурой
/// `CreateFunctionFn`, возвращающий `Box<Box<dyn Function>>`.
unsafe fn load_function(
    plugin_path: &str,
    config_json: &str,
) -> Result<(Box<dyn Function>, Library), FunctionError> {
    let lib = unsafe { Library::new(plugin_path) }
        .map_err(|e| FunctionError::config(format!("failed to load plugin '{plugin_path}': {e}")))?;

    let version_fn: Symbol<AbiVersionFn> = unsafe { lib.get(ABI_VERSION_SYMBOL) }
        .map_err(|_| FunctionError::config(format!(
            "plugin '{plugin_path}' does not export 'qs_abi_version'. Rebuild the plugin."
        )))?;
    let plugin_version = unsafe { version_fn() };
    if plugin_version != FUNCTION_ABI_VERSION {
        return Err(FunctionError::config(format!(
            "ABI version mismatch for plugin '{plugin_path}': \
             plugin has version {plugin_version}, host expects {FUNCTION_ABI_VERSION}. \
             Rebuild the plugin."
        )));
    }

    let create_fn: Symbol<CreateFunctionFn> = unsafe { lib.get(CREATE_SYMBOL) }
        .map_err(|e| {
            FunctionError::config(format!(
                "symbol 'qs_create_function' not found in '{plugin_path}': {e}"
            ))
        })?;

    let result: PluginCreateResult = unsafe { create_fn(config_json.as_ptr(), config_json.len()) };

    if !result.error_ptr.is_null() {
        let error = unsafe { *Box::from_raw(result.error_ptr as *mut String) };
        return Err(FunctionError::config(format!("plugin '{plugin_path}' error: {error}")));
    }

    if result.plugin_ptr.is_null() {
        return Err(FunctionError::config(format!("plugin '{plugin_path}' returned null")));
    }

    let inner: Box<dyn Function> =
        unsafe { *Box::from_raw(result.plugin_ptr as *mut Box<dyn Function>) };
    Ok((inner, lib))
}

/// Function loaded from a plugin library. Delegates to the plugin's
/// `Function` and keeps the library mapped while it is alive.
pub struct PluginFunction {
    inner: Option<Box<dyn Function>>,
    _lib: Library,
}

impl PluginFunction {
    pub fn load(plugin_path: &str, config_json: &str) -> Result<Self, FunctionError> {
        let (inner, lib) = unsafe { load_function(plugin_path, config_json)? };
        tracing::info!(plugin = %plugin_path, "loaded function plugin");
        Ok(Self { inner: Some(inner), _lib: lib })
    }
}

impl Function for PluginFunction {
    fn process(&self, input: &[u8], ctx: Arc<dyn FunctionContext>) -> Disposition {
        match self.inner.as_ref() {
            Some(inner) => inner.process(input, ctx),
            None => {
                ctx.logger().error("function plugin already dropped");
                Disposition::Unacked
            }
        }
    }
}

impl Drop for PluginFunction {
    fn drop(&mut self) {
        // Дропаем inner первым, пока _lib (и vtable) ещё живы.
        self.inner.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_config_error() {
        let err = PluginFunction::load("/nonexistent/libnothing.so", "{}").err().unwrap();
        assert_eq!(err.kind(), function_api::ErrorKind::Config);
        assert!(err.message().contains("/nonexistent/libnothing.so"));
    }
}
