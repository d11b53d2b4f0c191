//! Test support.

/// Instantiate generic `fn name<B: Backend>(device: &B::Device)` tests
/// across the supported test backends.
///
/// Each `name` gets a module of the same name holding one `#[test]` per
/// backend.
macro_rules! backend_matrix {
    ($($name:ident),* $(,)?) => {
        $(
            mod $name {
                #[test]
                fn ndarray_f32() {
                    super::$name::<burn::backend::NdArray<f32>>(&Default::default());
                }

                #[test]
                fn ndarray_f64() {
                    super::$name::<burn::backend::NdArray<f64>>(&Default::default());
                }

                #[test]
                fn autodiff_ndarray() {
                    super::$name::<burn::backend::Autodiff<burn::backend::NdArray<f32>>>(
                        &Default::default(),
                    );
                }
            }
        )*
    };
}

pub(crate) use backend_matrix;

use burn::tensor::TensorData;

/// Read tensor data as `f32`, whatever the backend element type.
pub(crate) fn to_f32_vec(data: TensorData) -> Vec<f32> {
    data.convert::<f32>().to_vec::<f32>().unwrap()
}
