#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! `wavekron` discretizes linear PDEs whose spatial operator is a sum of
//! separable tensor-product terms on a sparse grid in a discontinuous
//! Galerkin multiwavelet basis, and advances them in time by turning every
//! Kronecker-product apply into a schedule of small batched matrix products.

pub mod basis;
pub mod batch;
pub mod builtins;
pub mod chunk;
pub mod coefficients;
pub mod element;
pub mod error;
pub mod kronmult;
pub mod lib_dispatch;
pub mod output;
pub mod pde;
pub mod real;
pub mod tensor;
pub mod time;
