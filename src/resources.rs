//! Typed Cloud Resource Definitions
//!
//! This module provides strongly-typed property records for the resource kinds
//! a stack can declare: S3 buckets, Lambda functions, and DynamoDB tables.
//! These types carry only desired state; nothing here talks to AWS. The
//! provisioning engine (CloudFormation) interprets them after synthesis.
//!
//! All types are serializable via Serde for introspection and tooling.

use crate::stack::Expr;
use serde::Serialize;
use std::collections::BTreeMap;

/// Behavior applied to a resource when its stack is deleted.
///
/// Defaults to `Retain`, so destroying data is always an explicit opt-in at
/// the declaration site. `Destroy` is intended for dev/test stacks only.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
}

impl RemovalPolicy {
    /// The CloudFormation `DeletionPolicy` / `UpdateReplacePolicy` value.
    pub fn cfn_value(self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Destroy => "Delete",
        }
    }
}

/// Lambda execution runtime identifiers.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Runtime {
    Nodejs16X,
    Nodejs18X,
    Nodejs20X,
    Python39,
    Python312,
    ProvidedAl2023,
}

impl Runtime {
    /// The canonical AWS runtime identifier string.
    pub fn identifier(self) -> &'static str {
        match self {
            Runtime::Nodejs16X => "nodejs16.x",
            Runtime::Nodejs18X => "nodejs18.x",
            Runtime::Nodejs20X => "nodejs20.x",
            Runtime::Python39 => "python3.9",
            Runtime::Python312 => "python3.12",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

/// Maximum size in bytes for inline function source (the CloudFormation
/// `ZipFile` limit).
pub const MAX_INLINE_CODE_BYTES: usize = 4096;

/// Source payload for a Lambda function.
///
/// Only inline source is supported: the body is embedded in the template as
/// `Code.ZipFile`. The descriptor never reads the filesystem or S3.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Code {
    Inline(String),
}

impl Code {
    /// Wraps an inline source body.
    pub fn from_inline(body: impl Into<String>) -> Self {
        Code::Inline(body.into())
    }

    /// The source text as embedded in the template.
    pub fn body(&self) -> &str {
        match self {
            Code::Inline(body) => body,
        }
    }
}

/// DynamoDB key attribute types, with their CloudFormation type codes.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    /// The CloudFormation `AttributeType` code (`S`, `N`, or `B`).
    pub fn cfn_code(self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

/// A named key attribute (e.g. a table partition key).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Desired state for an S3 bucket.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BucketProps {
    /// Enable object versioning on the bucket.
    pub versioned: bool,
    pub removal_policy: RemovalPolicy,
}

/// Desired state for a Lambda function.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionProps {
    pub runtime: Runtime,
    /// Entry-point reference, e.g. `index.handler`.
    pub handler: String,
    pub code: Code,
    /// Environment variable names mapped to literal or late-bound values.
    pub environment: BTreeMap<String, Expr>,
}

impl FunctionProps {
    pub fn new(runtime: Runtime, handler: impl Into<String>, code: Code) -> Self {
        Self {
            runtime,
            handler: handler.into(),
            code,
            environment: BTreeMap::new(),
        }
    }

    /// Adds an environment variable entry.
    pub fn with_env(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.environment.insert(name.into(), value);
        self
    }
}

/// Desired state for a DynamoDB table.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableProps {
    /// Explicit physical table name. When `None`, the provisioning engine
    /// generates one.
    pub table_name: Option<String>,
    pub partition_key: Attribute,
    pub removal_policy: RemovalPolicy,
}

impl TableProps {
    pub fn new(partition_key: Attribute) -> Self {
        Self {
            table_name: None,
            partition_key,
            removal_policy: RemovalPolicy::default(),
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

/// A declared resource and its desired state.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Bucket(BucketProps),
    Function(FunctionProps),
    Table(TableProps),
}

impl Resource {
    /// Short kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Bucket(_) => "bucket",
            Resource::Function(_) => "function",
            Resource::Table(_) => "table",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_identifiers() {
        let cases = [
            (Runtime::Nodejs16X, "nodejs16.x"),
            (Runtime::Nodejs20X, "nodejs20.x"),
            (Runtime::Python312, "python3.12"),
            (Runtime::ProvidedAl2023, "provided.al2023"),
        ];
        for (runtime, expected) in cases {
            assert_eq!(runtime.identifier(), expected);
        }
    }

    #[test]
    fn test_attribute_type_codes() {
        assert_eq!(AttributeType::String.cfn_code(), "S");
        assert_eq!(AttributeType::Number.cfn_code(), "N");
        assert_eq!(AttributeType::Binary.cfn_code(), "B");
    }

    #[test]
    fn test_removal_policy_defaults_to_retain() {
        assert_eq!(RemovalPolicy::default(), RemovalPolicy::Retain);
        assert_eq!(BucketProps::default().removal_policy, RemovalPolicy::Retain);
        assert_eq!(RemovalPolicy::Destroy.cfn_value(), "Delete");
    }

    #[test]
    fn test_function_props_env_builder() {
        let props = FunctionProps::new(
            Runtime::Nodejs16X,
            "index.handler",
            Code::from_inline("exports.handler = async () => {};"),
        )
        .with_env("STAGE", Expr::lit("dev"))
        .with_env("BUCKET_NAME", Expr::reference("MyBucket"));

        assert_eq!(props.environment.len(), 2);
        assert_eq!(props.environment["STAGE"], Expr::lit("dev"));
        assert_eq!(props.environment["BUCKET_NAME"], Expr::reference("MyBucket"));
    }

    #[test]
    fn test_table_props_builder() {
        let props = TableProps::new(Attribute::new("id", AttributeType::String))
            .with_table_name("MyTable")
            .with_removal_policy(RemovalPolicy::Destroy);

        assert_eq!(props.table_name.as_deref(), Some("MyTable"));
        assert_eq!(props.partition_key.name, "id");
        assert_eq!(props.removal_policy, RemovalPolicy::Destroy);
    }
}
