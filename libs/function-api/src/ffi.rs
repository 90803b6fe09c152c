// ════════════════════════════════════════════════════════════════
//  Plugin FFI
// ════════════════════════════════════════════════════════════════

/// Результат создания функции плагином.
/// Host и plugin компилируются одним компилятором в одном workspace,
/// поэтому совместимость Rust ABI гарантирована.
#[repr(C)]
pub struct PluginCreateResult {
    /// При успехе: указатель на `Box<Box<dyn Function>>` (double-boxed для thin ptr).
    /// При ошибке: null.
    pub plugin_ptr: *mut (),
    /// При ошибке: указатель на `Box<String>` с сообщением об ошибке.
    /// При успехе: null.
    pub error_ptr: *mut (),
}

// Safety: PluginCreateResult передаётся только между host и plugin при создании.
unsafe impl Send for PluginCreateResult {}

/// Сигнатура символа `qs_create_function`, экспортируемого плагинами.
pub type CreateFunctionFn =
    unsafe extern "C" fn(config_json_ptr: *const u8, config_json_len: usize) -> PluginCreateResult;

/// Сигнатура символа `qs_destroy_function`.
pub type DestroyFunctionFn = unsafe extern "C" fn(plugin_ptr: *mut ());

/// Helper для плагинов: вернуть успешный результат.
pub fn plugin_ok<T: ?Sized>(val: Box<T>) -> PluginCreateResult {
    // Box<dyn Trait> is a fat pointer; Box<Box<dyn Trait>> is thin and fits *mut ().
    let boxed: Box<Box<T>> = Box::new(val);
    PluginCreateResult {
        plugin_ptr: Box::into_raw(boxed) as *mut (),
        error_ptr: std::ptr::null_mut(),
    }
}

/// Макрос для генерации `qs_destroy_*` функций в плагинах.
///
/// ```ignore
/// qs_destroy_fn!(qs_destroy_function, Function);
/// ```
#[macro_export]
macro_rules! qs_destroy_fn {
    ($fn_name:ident, $trait_ty:path) => {
        /// # Safety
        /// `ptr` must come from the matching `qs_create_*` of this plugin (or be null).
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $fn_name(ptr: *mut ()) {
            if !ptr.is_null() {
                let _ = unsafe { Box::from_raw(ptr as *mut Box<dyn $trait_ty>) };
            }
        }
    };
}

// ════════════════════════════════════════════════════════════════
//  ABI Version
// ════════════════════════════════════════════════════════════════

/// ABI version of the function plugin interface.
///
/// Bump this whenever `Function`, `FunctionContext` or the FFI signatures
/// change in a binary-incompatible way.
pub const FUNCTION_ABI_VERSION: u32 = 1;

/// Signature of the `qs_abi_version` symbol exported by plugins.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Export the `qs_abi_version` symbol from a plugin crate root:
/// ```ignore
/// function_api::qs_abi_version_fn!();
/// ```
#[macro_export]
macro_rules! qs_abi_version_fn {
    () => {
        #[unsafe(no_mangle)]
        pub extern "C" fn qs_abi_version() -> u32 {
            $crate::FUNCTION_ABI_VERSION
        }
    };
}
