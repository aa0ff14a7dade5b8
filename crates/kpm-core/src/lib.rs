//! Post-processing of Kernel Polynomial Method moment tensors into optical
//! conductivities.

pub mod common;
pub mod domain;
pub mod numerics;
pub mod response;
pub mod serialization;
pub mod store;

pub use domain::{
    ExecutionMode, ResponseArtifact, ResponseError, ResponseErrorCategory, ResponseKind,
    ResponseRequest, ResponseResult, SystemInfo,
};
pub use response::{
    ResponseFunction, ResponseOutcome, ResponseSettings, run_response, run_response_with_store,
};
pub use store::{DataStore, Dataset, MomentStore, StoreError};
