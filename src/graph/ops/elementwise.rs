use crate::array::Array;
use crate::backend::{Backend, BinaryOp, TensorValue, UnaryOp};
use crate::errors::AxResult;
use crate::graph::ops::Op;

#[derive(Debug)]
pub struct Unary(pub UnaryOp);

impl Op for Unary {
    fn name(&self) -> &'static str {
        match self.0 {
            UnaryOp::Neg => "neg",
            UnaryOp::Recip => "recip",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sq => "sq",
        }
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.elementwise_unary(self.0, &parents[0])
    }

    fn vjp(&self, parents: &[Array], output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let x = &parents[0];
        let g = grad_output;
        let contrib = match self.0 {
            UnaryOp::Neg => g.neg()?,
            UnaryOp::Recip => g.neg()?.mul(&x.sq()?.recip()?)?,
            UnaryOp::Exp => g.mul(output)?,
            UnaryOp::Log => g.div(x)?,
            UnaryOp::Sqrt => g.div(&output.scale(2.0)?)?,
            UnaryOp::Sq => g.scale(2.0)?.mul(x)?,
        };
        Ok(vec![Some(contrib)])
    }
}

#[derive(Debug)]
pub struct Binary(pub BinaryOp);

impl Op for Binary {
    fn name(&self) -> &'static str {
        match self.0 {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Minimum => "minimum",
            BinaryOp::Maximum => "maximum",
        }
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.elementwise_binary(self.0, &parents[0], &parents[1])
    }

    fn vjp(&self, parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let (lhs, rhs) = (&parents[0], &parents[1]);
        let g = grad_output;
        let (gl, gr) = match self.0 {
            BinaryOp::Add => (g.clone(), g.clone()),
            BinaryOp::Sub => (g.clone(), g.neg()?),
            BinaryOp::Mul => (g.mul(rhs)?, g.mul(lhs)?),
            BinaryOp::Div => {
                let gl = g.div(rhs)?;
                let gr = g.neg()?.mul(lhs)?.div(&rhs.sq()?)?;
                (gl, gr)
            }
            BinaryOp::Minimum => {
                let mask_l = lhs.le(rhs)?.cast(lhs.dtype())?;
                let mask_r = rhs.lt(lhs)?.cast(rhs.dtype())?;
                (g.mul(&mask_l)?, g.mul(&mask_r)?)
            }
            BinaryOp::Maximum => {
                let mask_l = lhs.ge(rhs)?.cast(lhs.dtype())?;
                let mask_r = rhs.gt(lhs)?.cast(rhs.dtype())?;
                (g.mul(&mask_l)?, g.mul(&mask_r)?)
            }
        };
        Ok(vec![Some(gl), Some(gr)])
    }
}
