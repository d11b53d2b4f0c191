//! # Inception-v3
//!
//! Inception-v3, built from a [`ParamSource`](crate::params::ParamSource).
//!
//! * [`InceptionV3Config`] / [`InceptionV3`] - the model.
//! * [`blocks`] - the mixed blocks and the auxiliary head.
//! * [`torchvision`] - `torchvision` state-dict import.
//! * [`pretrained`] - prefab configs with pretrained weights.
//!
//! ```rust,no_run
//! use burn::backend::NdArray;
//! use weightport::cache::disk::DiskCacheConfig;
//! use weightport::models::inception::load_pretrained;
//!
//! let model = load_pretrained::<NdArray>(
//!     "inception_v3.tv_in1k",
//!     &DiskCacheConfig::default(),
//!     &Default::default(),
//! )
//! .unwrap();
//! ```

pub mod blocks;
pub mod inception_model;
pub mod pretrained;
pub mod torchvision;

pub use inception_model::{InceptionV3, InceptionV3Config};
pub use pretrained::{PREFAB_INCEPTION_MAP, load_pretrained};
pub use torchvision::{inception_v3_import_config, inception_v3_torchvision_importer};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelConfig;
    use burn::backend::NdArray;
    use burn::prelude::Tensor;
    use torchvision::tests::torchvision_inception_checkpoint;

    #[test]
    fn test_import_torchvision_checkpoint() {
        let num_classes = 3;
        let device = Default::default();
        let model = InceptionV3Config::new()
            .with_num_classes(num_classes)
            .import::<NdArray>(
                &inception_v3_torchvision_importer(false).unwrap(),
                torchvision_inception_checkpoint(num_classes),
                &device,
            )
            .unwrap();
        assert!(model.aux_logits.is_none());

        // fc.weight [out, in] lands as fc/weight [in, out].
        let fc = model.fc.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(fc.len(), 2048 * num_classes);
        for i in [0, 1, 777, 2047] {
            for o in 0..num_classes {
                assert_eq!(fc[i * num_classes + o], (o * 2048 + i) as f32);
            }
        }

        let norm = &model.mixed_e[1].branch_pool.conv_norm.norm;
        assert_eq!(norm.epsilon, blocks::INCEPTION_NORM_EPSILON);

        let output = model.forward(Tensor::ones([1, 3, 75, 75], &device));
        assert_eq!(output.dims(), [1, num_classes]);
    }
}
