//! `Linear(in, out, bias=true)` (§4.8), grounded in the teacher's
//! `layers/linear.rs`: same `weights`/`biases` shape convention and the
//! same `ndarray_rand`-driven initialization, but parameters are leaf
//! `Array`s on the ambient Graph instead of raw `ndarray::Array2<f32>`
//! fields the old `Layer::backward`/`update` methods mutated by hand —
//! gradients now flow through `Array::backward`.

use ndarray::ArrayD;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::array::Array;
use crate::dtype::Dtype;
use crate::errors::AxResult;
use crate::nn::Module;

pub struct Linear {
    /// `(out, in)`, matching the `x @ Wᵀ` forward convention (§4.8).
    pub weight: Array,
    pub bias: Option<Array>,
}

fn uniform_bytes(shape: &[usize], bound: f64) -> Vec<u8> {
    let dist = Uniform::new(-bound as f32, bound as f32);
    let host: ArrayD<f32> = ArrayD::random(ndarray::IxDyn(shape), dist);
    host.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl Linear {
    /// Weights are drawn uniformly from `[-1/√in, +1/√in]` (§4.8).
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> AxResult<Self> {
        let bound = 1.0 / (in_features as f64).sqrt();
        let w_shape = [out_features, in_features];
        let weight = Array::from_numpy(&uniform_bytes(&w_shape, bound), &w_shape, Dtype::F32)?;
        let bias = if bias {
            let b_shape = [out_features];
            Some(Array::from_numpy(&uniform_bytes(&b_shape, bound), &b_shape, Dtype::F32)?)
        } else {
            None
        };
        Ok(Self { weight, bias })
    }
}

impl Module for Linear {
    fn forward(&self, input: &Array) -> AxResult<Array> {
        let wt = self.weight.transpose(0, 1)?;
        let out = input.matmul(&wt)?;
        match &self.bias {
            Some(b) => out.add(b),
            None => Ok(out),
        }
    }

    fn parameters(&self) -> Vec<Array> {
        let mut params = vec![self.weight.clone()];
        if let Some(b) = &self.bias {
            params.push(b.clone());
        }
        params
    }
}
