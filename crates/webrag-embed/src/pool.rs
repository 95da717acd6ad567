use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean of the unmasked token states of each row, scaled to unit L2 norm.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` of 0/1 in any dtype.
/// Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let weights = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let summed = (hidden * &weights)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?;
    let mean = summed.broadcast_div(&counts)?;

    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, hidden_dim], "pooled shape {:?}", pooled.dims());
    Ok(pooled)
}
