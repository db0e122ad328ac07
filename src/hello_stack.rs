//! Hello-World Topology
//!
//! The reference three-resource stack: a versioned S3 bucket, a Node.js
//! Lambda reading from it, and a DynamoDB table, with the bucket and table
//! names exposed as outputs. Useful as a smoke-test descriptor and as the
//! canonical example of wiring resources through handles.

use crate::resources::{
    Attribute, AttributeType, BucketProps, Code, FunctionProps, RemovalPolicy, Runtime, TableProps,
};
use crate::stack::{Stack, StackError};

/// Inline handler body: logs a fixed message and returns a fixed
/// HTTP-style response. Opaque payload as far as the descriptor is
/// concerned.
pub const HELLO_HANDLER_BODY: &str = r#"
exports.handler = async function(event) {
  console.log('Lambda invoked!');
  return { statusCode: 200, body: 'Hello, World!' };
}
"#;

/// Builds the hello-world stack descriptor.
///
/// Removal policies are `Destroy` throughout: this topology is meant for
/// dev/test environments only.
///
/// # Returns
/// The assembled [`Stack`], ready for synthesis
pub fn hello_world_stack() -> Result<Stack, StackError> {
    let mut stack = Stack::new("MyCdkProjectStack")?;

    let bucket = stack.add_bucket(
        "MyFirstBucket",
        BucketProps {
            versioned: true,
            removal_policy: RemovalPolicy::Destroy,
        },
    )?;

    let function = stack.add_function(
        "MyLambda",
        FunctionProps::new(
            Runtime::Nodejs16X,
            "index.handler",
            Code::from_inline(HELLO_HANDLER_BODY),
        )
        .with_env("BUCKET_NAME", bucket.bucket_name()),
    )?;

    stack.grant_read(&bucket, &function)?;

    let table = stack.add_table(
        "MyTable",
        TableProps::new(Attribute::new("id", AttributeType::String))
            .with_table_name("MyTable")
            .with_removal_policy(RemovalPolicy::Destroy),
    )?;

    stack.add_output(
        "MyBucketName",
        bucket.bucket_name(),
        "The name of the S3 bucket",
    )?;
    stack.add_output(
        "MyTableName",
        table.table_name(),
        "The name of the DynamoDB table",
    )?;

    Ok(stack)
}
