// Process-wide llama backend init + model load/unload + context free.
// Context-specific bits live in ffi::context.

use std::{ffi::CString, path::Path, ptr::NonNull, sync::OnceLock};

use llama_cpp_sys_2::{
    llama_backend_init, llama_context, llama_free, llama_model, llama_model_default_params,
    llama_model_free, llama_model_load_from_file, llama_model_params,
};

/// one-time flag to prevent double init
static INIT_CALLED: OnceLock<()> = OnceLock::new();

#[inline]
fn trace(msg: &str) {
    #[cfg(feature = "ffi-trace")]
    tracing::trace!(target: "parley_llama::ffi", "{msg}");
    #[cfg(not(feature = "ffi-trace"))]
    let _ = msg;
}

/// Initialize llama.cpp once per process. Later calls are no-ops.
pub fn init_backend() {
    INIT_CALLED.get_or_init(|| {
        trace("llama_backend_init()");
        unsafe { llama_backend_init() };
    });
}

/// Upstream model defaults with mmap on and `n_gpu_layers` applied.
pub fn model_params(n_gpu_layers: i32) -> llama_model_params {
    let mut p = unsafe { llama_model_default_params() };
    p.use_mmap = true;
    p.n_gpu_layers = n_gpu_layers;
    p
}

/// Load a model from disk. Caller owns the returned handle.
pub fn load_model(
    path: &Path,
    params: llama_model_params,
) -> Result<NonNull<llama_model>, String> {
    trace(&format!("load_model: {}", path.display()));
    let utf8 = path
        .to_str()
        .ok_or_else(|| "model path is not valid UTF-8".to_string())?;
    let c_path = CString::new(utf8).map_err(|_| "model path has interior NUL".to_string())?;
    let ptr = unsafe { llama_model_load_from_file(c_path.as_ptr(), params) };
    NonNull::new(ptr).ok_or_else(|| "llama_model_load_from_file returned null".into())
}

/// Free a model instance.
///
/// # Safety
/// `model` must come from [`load_model`] and must not be used afterwards.
pub unsafe fn cleanup_model(model: *mut llama_model) {
    trace("llama_model_free()");
    llama_model_free(model);
}

/// Free a context instance.
///
/// # Safety
/// `ctx` must come from `ffi::context::create_context` and must not be used afterwards.
pub unsafe fn cleanup_context(ctx: *mut llama_context) {
    trace("llama_free(context)");
    llama_free(ctx);
}
