//! # rs-stack
//!
//! Typed AWS resource topology descriptors with CloudFormation template
//! synthesis.
//!
//! ## Modules
//! - [`resources`]: Typed property records for buckets, functions, and tables
//! - [`stack`]: The [`Stack`] descriptor, resource handles, grants, and outputs
//! - [`template`]: Synthesis of a stack into a CloudFormation JSON template
//! - [`hello_stack`]: The reference bucket + lambda + table topology
//!
//! ## Usage
//! Declare resources on a [`Stack`], wire them through handles, then
//! synthesize:
//!
//! ```rust
//! use rs_stack::{hello_world_stack, synthesize};
//!
//! let stack = hello_world_stack()?;
//! let template = synthesize(&stack)?;
//! assert!(template.to_json_string().is_ok());
//! # Ok::<(), rs_stack::StackError>(())
//! ```
//!
//! ## Notes
//! - The crate is a descriptor only: it never calls AWS. Diffing, ordering,
//!   apply/rollback, and drift detection belong to the provisioning engine
//!   that consumes the template.
//! - Removal policies default to `Retain`; `Destroy` is a per-resource opt-in.
pub mod resources;

pub use resources::{
    Attribute, AttributeType, BucketProps, Code, FunctionProps, RemovalPolicy, Resource, Runtime,
    TableProps, MAX_INLINE_CODE_BYTES,
};

pub mod stack;

pub use stack::{
    Access, BucketHandle, Expr, FunctionHandle, Grant, Output, Stack, StackError, TableHandle,
};

pub mod template;

pub use template::{synthesize, Template};

pub mod hello_stack;

pub use hello_stack::{hello_world_stack, HELLO_HANDLER_BODY};
