//! # `PyTorch` Checkpoints
//!
//! Reads ``torch.save`` state-dict archives with `candle`'s pickle reader.

use crate::checkpoint::Checkpoint;
use crate::errors::{ImportError, ImportResult};
use burn::tensor::TensorData;
use candle_core::{DType, Tensor as CandleTensor};
use std::path::Path;

/// Read a ``.pth`` state-dict archive.
pub fn read_file(path: &Path) -> ImportResult<Checkpoint> {
    if !path.exists() {
        return Err(ImportError::fetch(
            path.display(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such checkpoint file"),
        ));
    }

    let tensors =
        candle_core::pickle::read_all(path).map_err(|e| ImportError::decode(path.display(), e))?;

    tensors
        .into_iter()
        .map(|(name, tensor)| {
            let data = candle_to_data(&tensor)
                .map_err(|e| ImportError::decode(path.display(), format!("{name}: {e}")))?;
            Ok((name, data))
        })
        .collect()
}

fn candle_to_data(tensor: &CandleTensor) -> candle_core::Result<TensorData> {
    let shape = tensor.dims().to_vec();
    let values = tensor
        .to_dtype(DType::F32)?
        .flatten_all()?
        .to_vec1::<f32>()?;
    Ok(TensorData::new(values, shape))
}
