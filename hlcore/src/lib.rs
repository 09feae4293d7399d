//! High-level shader module model.
//!
//! A front end describes the shader being compiled through an
//! [`module::HlModule`]: its entry point, shader model, resource bindings,
//! signatures and per-function stage properties. Between stages the model is
//! persisted as named metadata of the host [`hlinstr::module::Module`] by the
//! [`codec`], and reloaded by the next stage.
//!
//! The crate also carries the helpers that keep shader facts alive while the
//! IR is being rewritten: [`precise`] marks and the per-element debug
//! descriptors of [`debug`].

pub mod annotation;
pub mod codec;
pub mod config;
pub mod debug;
pub mod dxil;
pub mod magic;
pub mod module;
pub mod precise;
pub mod props;
pub mod resource;
pub mod signature;
pub mod utils;
