//! GPU backend behind the `cuda` feature, demonstrating that `Backend` is a
//! genuinely replaceable interface (§4.2) rather than a CPU-only contract.
//! Grounded in the teacher's `backend/cuda/mod.rs`: a device + loaded PTX
//! module held behind an `Arc`, elementwise kernels launched per call.
//! Movement/reduction/matmul are not yet ported to device kernels and report
//! `BackendError` instead of silently running on the host.

use std::sync::Arc;

use cudarc::driver::{CudaDevice, LaunchAsync, LaunchConfig};

use crate::backend::storage::{CpuBuffer, Storage};
use crate::backend::{Backend, BinaryOp, CompareOp, ReduceOp, Scalar, TensorValue, UnaryOp};
use crate::dtype::Dtype;
use crate::errors::{AxError, AxResult};
use crate::shape::View;

const ELEMENTWISE_PTX: &str = r#"
extern "C" __global__ void exp_kernel(float* out, const float* in, int n) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) out[i] = expf(in[i]);
}
extern "C" __global__ void add_kernel(float* out, const float* a, const float* b, int n) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) out[i] = a[i] + b[i];
}
"#;

#[derive(Debug)]
pub struct CudaBackend {
    device: Arc<CudaDevice>,
}

impl CudaBackend {
    pub fn new(device_index: usize) -> AxResult<Self> {
        let device = CudaDevice::new(device_index)
            .map_err(|e| AxError::BackendError { op: "cuda_init".into(), message: format!("{e:?}") })?;
        let ptx = cudarc::nvrtc::compile_ptx(ELEMENTWISE_PTX)
            .map_err(|e| AxError::BackendError { op: "nvrtc_compile".into(), message: format!("{e:?}") })?;
        device
            .load_ptx(ptx, "elementwise", &["exp_kernel", "add_kernel"])
            .map_err(|e| AxError::BackendError { op: "load_ptx".into(), message: format!("{e:?}") })?;
        Ok(Self { device })
    }

    fn launch_unary(&self, name: &str, input: &TensorValue) -> AxResult<TensorValue> {
        let cpu = input.storage.buffer().as_f32()?;
        let host: Vec<f32> = cpu.as_slice().expect("flat buffer").to_vec();
        let n = host.len();
        let d_in = self.device.htod_sync_copy(&host).map_err(cuda_err("htod"))?;
        let mut d_out = self.device.alloc_zeros::<f32>(n).map_err(cuda_err("alloc"))?;
        let func = self
            .device
            .get_func("elementwise", name)
            .ok_or_else(|| AxError::BackendError { op: name.into(), message: "kernel not loaded".into() })?;
        let cfg = LaunchConfig::for_num_elems(n as u32);
        unsafe { func.launch(cfg, (&mut d_out, &d_in, n as i32)) }.map_err(cuda_err(name))?;
        let result = self.device.dtoh_sync_copy(&d_out).map_err(cuda_err("dtoh"))?;
        let storage = Storage::new(CpuBuffer::F32(ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[n]), result).unwrap()));
        Ok(TensorValue::new(View::contiguous(input.view.shape()), storage))
    }
}

fn cuda_err(op: &str) -> impl Fn(cudarc::driver::DriverError) -> AxError + '_ {
    move |e| AxError::BackendError { op: op.into(), message: format!("{e:?}") }
}

fn unimplemented(op: &str) -> AxError {
    AxError::BackendError { op: op.into(), message: "not yet ported to a CUDA kernel".into() }
}

impl Backend for CudaBackend {
    fn allocate(&self, dtype: Dtype, num_elements: usize) -> AxResult<Storage> {
        Err(unimplemented("allocate")).map_err(|e| {
            let _ = (dtype, num_elements);
            e
        })
    }

    fn upload(&self, bytes: &[u8], dtype: Dtype, shape: &[usize]) -> AxResult<TensorValue> {
        crate::backend::cpu::CpuBackend::new().upload(bytes, dtype, shape)
    }

    fn download(&self, value: &TensorValue) -> AxResult<Vec<u8>> {
        crate::backend::cpu::CpuBackend::new().download(value)
    }

    fn fill(&self, dtype: Dtype, shape: &[usize], scalar: Scalar) -> AxResult<TensorValue> {
        crate::backend::cpu::CpuBackend::new().fill(dtype, shape, scalar)
    }

    fn iota(&self, shape: &[usize], start: f64, step: f64, dtype: Dtype) -> AxResult<TensorValue> {
        crate::backend::cpu::CpuBackend::new().iota(shape, start, step, dtype)
    }

    fn elementwise_unary(&self, op: UnaryOp, input: &TensorValue) -> AxResult<TensorValue> {
        match op {
            UnaryOp::Exp if input.dtype() == Dtype::F32 => self.launch_unary("exp_kernel", input),
            _ => Err(unimplemented("elementwise_unary")),
        }
    }

    fn elementwise_binary(&self, op: BinaryOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        let _ = (op, lhs, rhs);
        Err(unimplemented("elementwise_binary"))
    }

    fn reduce(&self, op: ReduceOp, input: &TensorValue, axes: &[usize]) -> AxResult<TensorValue> {
        let _ = (op, input, axes);
        Err(unimplemented("reduce"))
    }

    fn matmul(&self, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        let _ = (lhs, rhs);
        Err(unimplemented("matmul"))
    }

    fn compare(&self, op: CompareOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        let _ = (op, lhs, rhs);
        Err(unimplemented("compare"))
    }

    fn cast(&self, input: &TensorValue, target: Dtype) -> AxResult<TensorValue> {
        let _ = (input, target);
        Err(unimplemented("cast"))
    }

    fn copy_contiguous(&self, input: &TensorValue) -> AxResult<TensorValue> {
        let _ = input;
        Err(unimplemented("copy_contiguous"))
    }
}
