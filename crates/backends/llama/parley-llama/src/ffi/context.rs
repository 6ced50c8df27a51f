// Wrappers around llama_cpp_sys_2 for context- and vocab-adjacent ops.
// All `unsafe` stays in here; higher layers call these helpers.

use std::{ffi::c_char, ptr::NonNull};

use llama_cpp_sys_2::{
    llama_context, llama_context_params, llama_decode, llama_init_from_model, llama_model,
    llama_model_get_vocab, llama_n_ctx, llama_token_to_piece, llama_tokenize, llama_vocab,
    llama_vocab_is_eog,
};

/// Create a context with explicit parameters.
///
/// # Safety
/// `model` must be a live model handle that outlives the returned context.
pub unsafe fn create_context(
    model: *mut llama_model,
    params: llama_context_params,
) -> Result<NonNull<llama_context>, String> {
    let ptr = llama_init_from_model(model, params);
    NonNull::new(ptr).ok_or_else(|| "llama_init_from_model returned null".into())
}

/// Context window actually granted by llama.cpp.
#[inline]
pub fn n_ctx(ctx: *mut llama_context) -> u32 {
    unsafe { llama_n_ctx(ctx) }
}

#[inline]
fn vocab(model: *mut llama_model) -> *const llama_vocab {
    unsafe { llama_model_get_vocab(model) }
}

/// Pointer and byte length for llama's length-delimited text arguments.
/// Interior NULs are ordinary text here; nothing relies on a terminator.
fn text_arg(text: &str) -> Result<(*const c_char, i32), String> {
    let len = i32::try_from(text.len()).map_err(|_| "prompt too long".to_string())?;
    Ok((text.as_ptr() as *const c_char, len))
}

/// Two-pass tokenize with llama's sizing semantics:
/// - first pass sized for the worst case (one token per byte + specials)
/// - a negative return means "too small, need -n" → resize & retry once
pub fn tokenize(
    model: *mut llama_model,
    text: &str,
    add_special: bool,
    parse_special: bool,
) -> Result<Vec<i32>, String> {
    let (text_ptr, text_len) = text_arg(text)?;
    let vocab = vocab(model);

    let mut buf = vec![0i32; text.len() + 2 * add_special as usize];
    let mut filled = unsafe {
        llama_tokenize(
            vocab,
            text_ptr,
            text_len,
            buf.as_mut_ptr(),
            buf.len() as i32,
            add_special,
            parse_special,
        )
    };

    if filled < 0 {
        buf.resize((-filled) as usize, 0);
        filled = unsafe {
            llama_tokenize(
                vocab,
                text_ptr,
                text_len,
                buf.as_mut_ptr(),
                buf.len() as i32,
                add_special,
                parse_special,
            )
        };
        if filled < 0 {
            return Err(format!("llama_tokenize failed after retry: {filled}"));
        }
    }

    buf.truncate(filled as usize);
    Ok(buf)
}

/// Raw bytes for one token. Not necessarily valid UTF-8 on its own.
pub fn token_to_piece(model: *mut llama_model, id: i32, special: bool) -> Result<Vec<u8>, String> {
    let vocab = vocab(model);
    let mut buf = vec![0u8; 16];

    let mut n = unsafe {
        llama_token_to_piece(
            vocab,
            id,
            buf.as_mut_ptr() as *mut _,
            buf.len() as i32,
            0,
            special,
        )
    };
    if n < 0 {
        buf.resize((-n) as usize, 0);
        n = unsafe {
            llama_token_to_piece(
                vocab,
                id,
                buf.as_mut_ptr() as *mut _,
                buf.len() as i32,
                0,
                special,
            )
        };
        if n < 0 {
            return Err(format!("llama_token_to_piece failed for token {id}: {n}"));
        }
    }

    buf.truncate(n as usize);
    Ok(buf)
}

#[inline]
pub fn is_eog(model: *mut llama_model, id: i32) -> bool {
    unsafe { llama_vocab_is_eog(vocab(model), id) }
}

/// Thin safe wrapper for llama_decode. Returns the raw code on failure.
///
/// Any non-zero code is an error, including 1 (no KV slot): the batch was not evaluated.
#[inline]
pub fn decode_batch(
    ctx: *mut llama_context,
    batch: llama_cpp_sys_2::llama_batch,
) -> Result<(), i32> {
    let rc = unsafe { llama_decode(ctx, batch) };
    if rc != 0 { Err(rc) } else { Ok(()) }
}
