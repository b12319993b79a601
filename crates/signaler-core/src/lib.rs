//! Convergence polling for CloudFormation resources that must be signalled
//! from outside the instance.

pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod health;
pub mod instance;
pub mod machine;
pub mod memory;
pub mod ports;
pub mod response;
pub mod token;

pub use error::{Result, SignalerError};
pub use handler::{HandlerResponse, Signaler};
