//! Resource Topology Descriptor
//!
//! This module provides:
//! - [`Stack`]: an ordered collection of declared resources, permission
//!   grants, and named outputs
//! - Typed handles ([`BucketHandle`], [`FunctionHandle`], [`TableHandle`])
//!   returned on declaration, exposing late-bound attribute references
//! - [`Expr`]: literal or deferred values (`Ref` / `GetAtt`) that the
//!   provisioning engine resolves after resources are materialized
//!
//! A `Stack` is assembled once, synchronously, and handed to synthesis (see
//! [`crate::template`]). It performs only structural validation: identifier
//! rules, uniqueness, and grant targets. Provisioning-time failures (naming
//! collisions, quotas, permission denials) surface in the external engine,
//! not here.

use crate::resources::{
    BucketProps, Code, FunctionProps, Resource, TableProps, MAX_INLINE_CODE_BYTES,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors that can occur while declaring or synthesizing a stack.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("invalid stack name: {0:?}")]
    InvalidStackName(String),

    #[error("invalid logical id: {0:?} (must be alphanumeric, at most 255 characters)")]
    InvalidLogicalId(String),

    #[error("duplicate logical id: {0:?}")]
    DuplicateLogicalId(String),

    #[error("invalid environment variable name {name:?} on function {function:?}")]
    InvalidEnvName { function: String, name: String },

    #[error("function {0:?} has empty inline code")]
    EmptyInlineCode(String),

    #[error("function {id:?} inline code is {len} bytes, limit is {limit}")]
    InlineCodeTooLarge { id: String, len: usize, limit: usize },

    #[error("grant references unknown or mismatched {kind} {id:?}")]
    UnknownGrantTarget { kind: &'static str, id: String },

    #[error("invalid output name: {0:?}")]
    InvalidOutputName(String),

    #[error("duplicate output name: {0:?}")]
    DuplicateOutput(String),

    #[error("{context} references undeclared resource {target:?}")]
    UnresolvedReference { context: String, target: String },
}

/// CloudFormation logical-id rule: alphanumeric only.
static LOGICAL_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Stack names additionally allow hyphens.
static STACK_NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Lambda environment variable names.
static ENV_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn is_valid_logical_id(id: &str) -> bool {
    let re = LOGICAL_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{1,255}$").unwrap());
    re.is_match(id)
}

fn is_valid_stack_name(name: &str) -> bool {
    let re = STACK_NAME_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9\-]{0,127}$").unwrap());
    re.is_match(name)
}

fn is_valid_env_name(name: &str) -> bool {
    let re = ENV_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    re.is_match(name)
}

/// A literal or late-bound value.
///
/// `Ref` and `GetAtt` are deferred attribute lookups: they name a declared
/// resource whose physical attributes exist only after the provisioning
/// engine materializes it. Synthesis renders them as CloudFormation `Ref` /
/// `Fn::GetAtt` and verifies the target is declared.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    Lit(String),
    Ref(String),
    GetAtt {
        logical_id: String,
        attribute: String,
    },
}

impl Expr {
    pub fn lit(value: impl Into<String>) -> Self {
        Expr::Lit(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Expr::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// The declared resource this expression depends on, if any.
    pub fn referenced_id(&self) -> Option<&str> {
        match self {
            Expr::Lit(_) => None,
            Expr::Ref(id) => Some(id),
            Expr::GetAtt { logical_id, .. } => Some(logical_id),
        }
    }
}

/// Handle to a declared S3 bucket.
///
/// Carries only the logical id; the physical bucket name exists after
/// provisioning and is reachable through [`BucketHandle::bucket_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHandle {
    logical_id: String,
}

impl BucketHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The generated physical bucket name (a `Ref`).
    pub fn bucket_name(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// The bucket ARN (a `GetAtt`).
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// Handle to a declared Lambda function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    logical_id: String,
}

impl FunctionHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The generated function name (a `Ref`).
    pub fn function_name(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// The function ARN (a `GetAtt`).
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// Handle to a declared DynamoDB table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    logical_id: String,
}

impl TableHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The physical table name (a `Ref`).
    pub fn table_name(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// The table ARN (a `GetAtt`).
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// Access level carried by a grant.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    Read,
}

/// A declared intent to allow one resource to access another.
///
/// Enforcement belongs to the provisioning engine's permission model;
/// synthesis translates each grant into an IAM policy on the grantee's
/// execution role.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Logical id of the function receiving access.
    pub grantee: String,
    /// Logical id of the bucket being accessed.
    pub resource: String,
    pub access: Access,
}

/// A named value exposed after the stack is provisioned.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub name: String,
    pub value: Expr,
    pub description: String,
}

/// An ordered, validated declaration of cloud resources and their wiring.
///
/// # Example
/// ```rust
/// use rs_stack::{BucketProps, RemovalPolicy, Stack};
///
/// let mut stack = Stack::new("demo-stack")?;
/// let bucket = stack.add_bucket(
///     "AssetBucket",
///     BucketProps { versioned: true, removal_policy: RemovalPolicy::Retain },
/// )?;
/// stack.add_output("AssetBucketName", bucket.bucket_name(), "Generated bucket name")?;
/// # Ok::<(), rs_stack::StackError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    /// Declaration order is preserved; logical ids are unique.
    resources: Vec<(String, Resource)>,
    grants: Vec<Grant>,
    outputs: Vec<Output>,
}

impl Stack {
    /// Creates an empty stack.
    ///
    /// # Arguments
    /// * `name` - Stack name; must start with a letter and contain only
    ///   alphanumerics and hyphens, at most 128 characters
    ///
    /// # Returns
    /// The empty `Stack`, or `StackError::InvalidStackName`
    pub fn new(name: impl Into<String>) -> Result<Self, StackError> {
        let name = name.into();
        if !is_valid_stack_name(&name) {
            return Err(StackError::InvalidStackName(name));
        }
        Ok(Self {
            name,
            resources: Vec::new(),
            grants: Vec::new(),
            outputs: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared resources in declaration order.
    pub fn resources(&self) -> &[(String, Resource)] {
        &self.resources
    }

    /// Looks up a declared resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|(id, _)| id == logical_id)
            .map(|(_, resource)| resource)
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    fn register(&mut self, logical_id: String, resource: Resource) -> Result<(), StackError> {
        if !is_valid_logical_id(&logical_id) {
            return Err(StackError::InvalidLogicalId(logical_id));
        }
        if self.resource(&logical_id).is_some() {
            return Err(StackError::DuplicateLogicalId(logical_id));
        }
        self.resources.push((logical_id, resource));
        Ok(())
    }

    /// Declares an S3 bucket.
    ///
    /// # Arguments
    /// * `logical_id` - Unique alphanumeric identity within the stack
    /// * `props` - Desired bucket state
    ///
    /// # Returns
    /// A [`BucketHandle`] exposing the bucket's generated name and ARN
    pub fn add_bucket(
        &mut self,
        logical_id: impl Into<String>,
        props: BucketProps,
    ) -> Result<BucketHandle, StackError> {
        let logical_id = logical_id.into();
        self.register(logical_id.clone(), Resource::Bucket(props))?;
        Ok(BucketHandle { logical_id })
    }

    /// Declares a Lambda function.
    ///
    /// Environment variable names are validated here; inline code must be
    /// non-empty and within the `ZipFile` size limit.
    ///
    /// # Returns
    /// A [`FunctionHandle`] exposing the function's generated name and ARN
    pub fn add_function(
        &mut self,
        logical_id: impl Into<String>,
        props: FunctionProps,
    ) -> Result<FunctionHandle, StackError> {
        let logical_id = logical_id.into();

        let Code::Inline(body) = &props.code;
        if body.trim().is_empty() {
            return Err(StackError::EmptyInlineCode(logical_id));
        }
        if body.len() > MAX_INLINE_CODE_BYTES {
            return Err(StackError::InlineCodeTooLarge {
                id: logical_id,
                len: body.len(),
                limit: MAX_INLINE_CODE_BYTES,
            });
        }
        for name in props.environment.keys() {
            if !is_valid_env_name(name) {
                return Err(StackError::InvalidEnvName {
                    function: logical_id,
                    name: name.clone(),
                });
            }
        }

        self.register(logical_id.clone(), Resource::Function(props))?;
        Ok(FunctionHandle { logical_id })
    }

    /// Declares a DynamoDB table.
    ///
    /// # Returns
    /// A [`TableHandle`] exposing the table's name and ARN
    pub fn add_table(
        &mut self,
        logical_id: impl Into<String>,
        props: TableProps,
    ) -> Result<TableHandle, StackError> {
        let logical_id = logical_id.into();
        self.register(logical_id.clone(), Resource::Table(props))?;
        Ok(TableHandle { logical_id })
    }

    /// Records a read-capability grant from a function onto a bucket.
    ///
    /// Both handles must belong to this stack. The grant is a declared
    /// intent; synthesis turns it into an IAM policy.
    pub fn grant_read(
        &mut self,
        bucket: &BucketHandle,
        function: &FunctionHandle,
    ) -> Result<(), StackError> {
        match self.resource(bucket.logical_id()) {
            Some(Resource::Bucket(_)) => {}
            _ => {
                return Err(StackError::UnknownGrantTarget {
                    kind: "bucket",
                    id: bucket.logical_id().to_string(),
                })
            }
        }
        match self.resource(function.logical_id()) {
            Some(Resource::Function(_)) => {}
            _ => {
                return Err(StackError::UnknownGrantTarget {
                    kind: "function",
                    id: function.logical_id().to_string(),
                })
            }
        }
        self.grants.push(Grant {
            grantee: function.logical_id().to_string(),
            resource: bucket.logical_id().to_string(),
            access: Access::Read,
        });
        Ok(())
    }

    /// Declares a named output exposed after provisioning.
    ///
    /// # Arguments
    /// * `name` - Unique alphanumeric output name
    /// * `value` - Literal or late-bound value to expose
    /// * `description` - Human-readable description
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Expr,
        description: impl Into<String>,
    ) -> Result<(), StackError> {
        let name = name.into();
        if !is_valid_logical_id(&name) {
            return Err(StackError::InvalidOutputName(name));
        }
        if self.outputs.iter().any(|output| output.name == name) {
            return Err(StackError::DuplicateOutput(name));
        }
        self.outputs.push(Output {
            name,
            value,
            description: description.into(),
        });
        Ok(())
    }
}
