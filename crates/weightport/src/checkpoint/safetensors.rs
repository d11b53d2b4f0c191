//! # ``safetensors`` Checkpoints
//!
//! All floating and integer element types are widened (or narrowed) to `f32`.

use crate::checkpoint::Checkpoint;
use crate::errors::{ImportError, ImportResult};
use ::safetensors::tensor::TensorView;
use ::safetensors::{Dtype, SafeTensors};
use burn::tensor::TensorData;

/// Decode a ``safetensors`` buffer.
///
/// # Arguments
///
/// - `bytes`: the raw file contents.
/// - `location`: file name or URL, for error messages.
pub fn from_bytes(
    bytes: &[u8],
    location: &str,
) -> ImportResult<Checkpoint> {
    let tensors = SafeTensors::deserialize(bytes).map_err(|e| ImportError::decode(location, e))?;

    tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            let data = view_to_data(&view)
                .map_err(|msg| ImportError::decode(location, format!("{name}: {msg}")))?;
            Ok((name, data))
        })
        .collect()
}

/// Encode a checkpoint as a ``safetensors`` buffer of `F32` tensors.
pub fn to_bytes(checkpoint: &Checkpoint) -> ImportResult<Vec<u8>> {
    let buffers = checkpoint
        .iter()
        .map(|(name, data)| {
            let values = data
                .to_vec::<f32>()
                .map_err(|e| ImportError::decode(name, format!("{e:?}")))?;
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            Ok((name.to_string(), data.shape.clone(), bytes))
        })
        .collect::<ImportResult<Vec<_>>>()?;

    let views = buffers
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| ImportError::decode(name, e))
        })
        .collect::<ImportResult<Vec<_>>>()?;

    ::safetensors::tensor::serialize(views, &None)
        .map_err(|e| ImportError::decode("<safetensors>", e))
}

fn view_to_data(view: &TensorView<'_>) -> Result<TensorData, String> {
    let raw = view.data();
    let values: Vec<f32> = match view.dtype() {
        Dtype::F32 => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F64 => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        Dtype::F16 => raw
            .chunks_exact(2)
            .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        Dtype::BF16 => raw
            .chunks_exact(2)
            .map(|b| half::bf16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        Dtype::I64 => raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        Dtype::I32 => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect(),
        Dtype::U8 => raw.iter().map(|&b| b as f32).collect(),
        other => return Err(format!("unsupported dtype {other:?}")),
    };

    let shape = view.shape().to_vec();
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(format!(
            "shape {shape:?} needs {expected} elements, found {}",
            values.len()
        ));
    }

    Ok(TensorData::new(values, shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_decode_mixed_dtypes() {
        let f16_bytes: Vec<u8> = [1.5f32, -2.0]
            .iter()
            .flat_map(|v| half::f16::from_f32(*v).to_le_bytes())
            .collect();
        let i64_bytes: Vec<u8> = 42i64.to_le_bytes().to_vec();

        let views: HashMap<String, TensorView> = [
            (
                "half".to_string(),
                TensorView::new(Dtype::F16, vec![2], &f16_bytes).unwrap(),
            ),
            (
                "counter".to_string(),
                TensorView::new(Dtype::I64, vec![], &i64_bytes).unwrap(),
            ),
        ]
        .into_iter()
        .collect();
        let bytes = ::safetensors::tensor::serialize(views, &None).unwrap();

        let checkpoint = from_bytes(&bytes, "mixed").unwrap();
        assert_eq!(
            checkpoint.get("half").unwrap().to_vec::<f32>().unwrap(),
            vec![1.5, -2.0]
        );
        assert_eq!(
            checkpoint.get("counter").unwrap().to_vec::<f32>().unwrap(),
            vec![42.0]
        );
    }

    #[test]
    fn test_decode_garbage() {
        let err = from_bytes(b"not a safetensors file", "junk").unwrap_err();
        assert!(matches!(err, ImportError::Decode { .. }));
    }
}
