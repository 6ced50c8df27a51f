// Wrappers around the llama_sampler_* chain API.

use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_context, llama_sampler, llama_sampler_chain_add, llama_sampler_chain_default_params,
    llama_sampler_chain_init, llama_sampler_free, llama_sampler_init_dist,
    llama_sampler_init_min_p, llama_sampler_init_temp, llama_sampler_sample,
};

/// Build the persistent chain: min-p filter → temperature → seeded distribution draw.
pub fn init_chain(min_p: f32, temperature: f32, seed: u32) -> Result<NonNull<llama_sampler>, String> {
    unsafe {
        let mut chain_params = llama_sampler_chain_default_params();
        chain_params.no_perf = true;

        let chain = NonNull::new(llama_sampler_chain_init(chain_params))
            .ok_or_else(|| "llama_sampler_chain_init returned null".to_string())?;
        let sp = chain.as_ptr();

        llama_sampler_chain_add(sp, llama_sampler_init_min_p(min_p, 1));
        llama_sampler_chain_add(sp, llama_sampler_init_temp(temperature));
        llama_sampler_chain_add(sp, llama_sampler_init_dist(seed));

        Ok(chain)
    }
}

/// Sample from the logits of the last decoded slot (`idx = -1`).
///
/// # Safety
/// `chain` and `ctx` must be live handles.
pub unsafe fn sample_last(chain: *mut llama_sampler, ctx: *mut llama_context) -> Result<i32, String> {
    let tok_id = llama_sampler_sample(chain, ctx, -1);
    if tok_id < 0 {
        Err(format!("sampler returned invalid token id {tok_id}"))
    } else {
        Ok(tok_id)
    }
}

/// # Safety
/// `chain` must come from [`init_chain`] and must not be used afterwards.
pub unsafe fn free_chain(chain: *mut llama_sampler) {
    llama_sampler_free(chain);
}
