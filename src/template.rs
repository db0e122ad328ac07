//! CloudFormation Template Synthesis
//!
//! This module translates a [`Stack`] descriptor into a CloudFormation JSON
//! template:
//! - Buckets, functions, and tables become their `AWS::*` resource bodies
//! - Each function gets a synthesized execution role with the basic Lambda
//!   execution managed policy
//! - Read grants become an IAM policy attached to the grantee's role, using
//!   the standard read action set over the bucket and its objects
//! - Late-bound [`Expr`] values render as `Ref` / `Fn::GetAtt`
//!
//! Synthesis is single-pass and deterministic: the same stack always yields
//! byte-identical JSON. Every reference is checked against the declared
//! resources; dangling targets are reported as [`StackError`]s.

use crate::resources::{BucketProps, FunctionProps, RemovalPolicy, Resource, TableProps};
use crate::stack::{Expr, Grant, Stack, StackError};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Template format version understood by the provisioning engine.
const FORMAT_VERSION: &str = "2010-09-09";

/// Actions granted by a read grant, mirroring the standard S3 read set.
const S3_READ_ACTIONS: [&str; 3] = ["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// A synthesized CloudFormation template.
///
/// Resource and output maps are keyed by logical id and stored sorted, so
/// serialization is deterministic.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,

    #[serde(rename = "Resources")]
    resources: Map<String, Value>,

    #[serde(rename = "Outputs", skip_serializing_if = "Map::is_empty")]
    outputs: Map<String, Value>,
}

impl Template {
    /// The template resource bodies, keyed by logical id.
    pub fn resources(&self) -> &Map<String, Value> {
        &self.resources
    }

    /// Looks up a resource body by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// The template outputs, keyed by output name.
    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    /// Serializes the template as pretty-printed JSON.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Renders a literal or late-bound value into template JSON.
fn render_expr(expr: &Expr) -> Value {
    match expr {
        Expr::Lit(value) => json!(value),
        Expr::Ref(logical_id) => json!({ "Ref": logical_id }),
        Expr::GetAtt {
            logical_id,
            attribute,
        } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
    }
}

/// Checks that a late-bound value targets a declared resource.
fn check_resolvable(stack: &Stack, expr: &Expr, context: &str) -> Result<(), StackError> {
    if let Some(target) = expr.referenced_id() {
        if stack.resource(target).is_none() {
            return Err(StackError::UnresolvedReference {
                context: context.to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

fn removal_policy_entries(body: &mut Map<String, Value>, policy: RemovalPolicy) {
    body.insert("DeletionPolicy".to_string(), json!(policy.cfn_value()));
    body.insert("UpdateReplacePolicy".to_string(), json!(policy.cfn_value()));
}

fn bucket_body(props: &BucketProps) -> Value {
    let mut body = Map::new();
    body.insert("Type".to_string(), json!("AWS::S3::Bucket"));
    if props.versioned {
        body.insert(
            "Properties".to_string(),
            json!({ "VersioningConfiguration": { "Status": "Enabled" } }),
        );
    }
    removal_policy_entries(&mut body, props.removal_policy);
    Value::Object(body)
}

fn function_body(props: &FunctionProps, role_id: &str, policy_id: Option<&str>) -> Value {
    let mut properties = Map::new();
    properties.insert("Code".to_string(), json!({ "ZipFile": props.code.body() }));
    properties.insert("Handler".to_string(), json!(props.handler));
    properties.insert("Runtime".to_string(), json!(props.runtime.identifier()));
    properties.insert(
        "Role".to_string(),
        json!({ "Fn::GetAtt": [role_id, "Arn"] }),
    );
    if !props.environment.is_empty() {
        let variables: Map<String, Value> = props
            .environment
            .iter()
            .map(|(name, value)| (name.clone(), render_expr(value)))
            .collect();
        properties.insert(
            "Environment".to_string(),
            json!({ "Variables": variables }),
        );
    }

    // The function must come up after its role, and after any grant policy
    // so the first invocation already holds the granted permissions.
    let mut depends_on: Vec<&str> = Vec::new();
    if let Some(policy_id) = policy_id {
        depends_on.push(policy_id);
    }
    depends_on.push(role_id);

    json!({
        "Type": "AWS::Lambda::Function",
        "Properties": properties,
        "DependsOn": depends_on,
    })
}

fn execution_role_body() -> Value {
    json!({
        "Type": "AWS::IAM::Role",
        "Properties": {
            "AssumeRolePolicyDocument": {
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": "lambda.amazonaws.com" },
                }],
                "Version": "2012-10-17",
            },
            "ManagedPolicyArns": [{
                "Fn::Join": ["", [
                    "arn:",
                    { "Ref": "AWS::Partition" },
                    ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
                ]],
            }],
        },
    })
}

fn grant_statement(grant: &Grant) -> Value {
    json!({
        "Action": S3_READ_ACTIONS,
        "Effect": "Allow",
        "Resource": [
            { "Fn::GetAtt": [grant.resource, "Arn"] },
            { "Fn::Join": ["", [{ "Fn::GetAtt": [grant.resource, "Arn"] }, "/*"]] },
        ],
    })
}

fn grant_policy_body(policy_id: &str, role_id: &str, grants: &[&Grant]) -> Value {
    let statements: Vec<Value> = grants.iter().map(|grant| grant_statement(grant)).collect();
    json!({
        "Type": "AWS::IAM::Policy",
        "Properties": {
            "PolicyDocument": {
                "Statement": statements,
                "Version": "2012-10-17",
            },
            "PolicyName": policy_id,
            "Roles": [{ "Ref": role_id }],
        },
    })
}

fn table_body(props: &TableProps) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "KeySchema".to_string(),
        json!([{ "AttributeName": props.partition_key.name, "KeyType": "HASH" }]),
    );
    properties.insert(
        "AttributeDefinitions".to_string(),
        json!([{
            "AttributeName": props.partition_key.name,
            "AttributeType": props.partition_key.ty.cfn_code(),
        }]),
    );
    properties.insert(
        "ProvisionedThroughput".to_string(),
        json!({ "ReadCapacityUnits": 5, "WriteCapacityUnits": 5 }),
    );
    if let Some(table_name) = &props.table_name {
        properties.insert("TableName".to_string(), json!(table_name));
    }

    let mut body = Map::new();
    body.insert("Type".to_string(), json!("AWS::DynamoDB::Table"));
    body.insert("Properties".to_string(), Value::Object(properties));
    removal_policy_entries(&mut body, props.removal_policy);
    Value::Object(body)
}

/// Claims a logical id for a synthesized resource, rejecting collisions with
/// declared ids.
fn claim_synthesized_id(stack: &Stack, id: String) -> Result<String, StackError> {
    if stack.resource(&id).is_some() {
        return Err(StackError::DuplicateLogicalId(id));
    }
    Ok(id)
}

/// Synthesizes a stack descriptor into a CloudFormation template.
///
/// # Arguments
/// * `stack` - The assembled descriptor
///
/// # Returns
/// The deterministic [`Template`], or a [`StackError`] for dangling
/// references or synthesized-id collisions
pub fn synthesize(stack: &Stack) -> Result<Template, StackError> {
    debug!(
        stack = stack.name(),
        resources = stack.resources().len(),
        grants = stack.grants().len(),
        outputs = stack.outputs().len(),
        "synthesizing template"
    );

    let mut resources = Map::new();

    for (logical_id, resource) in stack.resources() {
        match resource {
            Resource::Bucket(props) => {
                resources.insert(logical_id.clone(), bucket_body(props));
            }
            Resource::Table(props) => {
                resources.insert(logical_id.clone(), table_body(props));
            }
            Resource::Function(props) => {
                for (name, value) in &props.environment {
                    let context =
                        format!("environment variable {name:?} on function {logical_id:?}");
                    check_resolvable(stack, value, &context)?;
                }

                let role_id =
                    claim_synthesized_id(stack, format!("{logical_id}ServiceRole"))?;
                resources.insert(role_id.clone(), execution_role_body());

                let grants: Vec<&Grant> = stack
                    .grants()
                    .iter()
                    .filter(|grant| &grant.grantee == logical_id)
                    .collect();
                let policy_id = if grants.is_empty() {
                    None
                } else {
                    let policy_id =
                        claim_synthesized_id(stack, format!("{logical_id}DefaultPolicy"))?;
                    resources.insert(
                        policy_id.clone(),
                        grant_policy_body(&policy_id, &role_id, &grants),
                    );
                    Some(policy_id)
                };

                resources.insert(
                    logical_id.clone(),
                    function_body(props, &role_id, policy_id.as_deref()),
                );
            }
        }
    }

    let mut outputs = Map::new();
    for output in stack.outputs() {
        let context = format!("output {:?}", output.name);
        check_resolvable(stack, &output.value, &context)?;
        outputs.insert(
            output.name.clone(),
            json!({
                "Description": output.description,
                "Value": render_expr(&output.value),
            }),
        );
    }

    Ok(Template {
        format_version: FORMAT_VERSION,
        resources,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{
        Attribute, AttributeType, BucketProps, Code, FunctionProps, RemovalPolicy, Runtime,
        TableProps,
    };

    fn demo_stack() -> Stack {
        let mut stack = Stack::new("demo-stack").unwrap();
        let bucket = stack
            .add_bucket(
                "AssetBucket",
                BucketProps {
                    versioned: true,
                    removal_policy: RemovalPolicy::Destroy,
                },
            )
            .unwrap();
        let function = stack
            .add_function(
                "Worker",
                FunctionProps::new(
                    Runtime::Nodejs16X,
                    "index.handler",
                    Code::from_inline("exports.handler = async () => {};"),
                )
                .with_env("BUCKET_NAME", bucket.bucket_name()),
            )
            .unwrap();
        stack.grant_read(&bucket, &function).unwrap();
        stack
            .add_table(
                "Records",
                TableProps::new(Attribute::new("id", AttributeType::String))
                    .with_table_name("Records")
                    .with_removal_policy(RemovalPolicy::Destroy),
            )
            .unwrap();
        stack
            .add_output("AssetBucketName", bucket.bucket_name(), "The bucket name")
            .unwrap();
        stack
    }

    #[test]
    fn test_bucket_versioning_and_deletion_policy() {
        let template = synthesize(&demo_stack()).unwrap();
        let bucket = template.resource("AssetBucket").unwrap();

        assert_eq!(bucket["Type"], "AWS::S3::Bucket");
        assert_eq!(
            bucket["Properties"]["VersioningConfiguration"]["Status"],
            "Enabled"
        );
        assert_eq!(bucket["DeletionPolicy"], "Delete");
        assert_eq!(bucket["UpdateReplacePolicy"], "Delete");
    }

    #[test]
    fn test_unversioned_bucket_has_no_properties() {
        let mut stack = Stack::new("plain").unwrap();
        stack
            .add_bucket("Plain", BucketProps::default())
            .unwrap();
        let template = synthesize(&stack).unwrap();
        let bucket = template.resource("Plain").unwrap();

        assert!(bucket.get("Properties").is_none());
        assert_eq!(bucket["DeletionPolicy"], "Retain");
    }

    #[test]
    fn test_function_body_and_environment() {
        let template = synthesize(&demo_stack()).unwrap();
        let function = template.resource("Worker").unwrap();

        assert_eq!(function["Type"], "AWS::Lambda::Function");
        assert_eq!(function["Properties"]["Runtime"], "nodejs16.x");
        assert_eq!(function["Properties"]["Handler"], "index.handler");
        assert_eq!(
            function["Properties"]["Code"]["ZipFile"],
            "exports.handler = async () => {};"
        );
        assert_eq!(
            function["Properties"]["Environment"]["Variables"]["BUCKET_NAME"],
            serde_json::json!({ "Ref": "AssetBucket" })
        );
        assert_eq!(
            function["Properties"]["Role"],
            serde_json::json!({ "Fn::GetAtt": ["WorkerServiceRole", "Arn"] })
        );
        assert_eq!(
            function["DependsOn"],
            serde_json::json!(["WorkerDefaultPolicy", "WorkerServiceRole"])
        );
    }

    #[test]
    fn test_execution_role_synthesized_per_function() {
        let template = synthesize(&demo_stack()).unwrap();
        let role = template.resource("WorkerServiceRole").unwrap();

        assert_eq!(role["Type"], "AWS::IAM::Role");
        assert_eq!(
            role["Properties"]["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
    }

    #[test]
    fn test_read_grant_becomes_iam_policy() {
        let template = synthesize(&demo_stack()).unwrap();
        let policy = template.resource("WorkerDefaultPolicy").unwrap();

        assert_eq!(policy["Type"], "AWS::IAM::Policy");
        let statement = &policy["Properties"]["PolicyDocument"]["Statement"][0];
        assert_eq!(
            statement["Action"],
            serde_json::json!(["s3:GetObject*", "s3:GetBucket*", "s3:List*"])
        );
        assert_eq!(
            statement["Resource"][0],
            serde_json::json!({ "Fn::GetAtt": ["AssetBucket", "Arn"] })
        );
        assert_eq!(
            policy["Properties"]["Roles"],
            serde_json::json!([{ "Ref": "WorkerServiceRole" }])
        );
    }

    #[test]
    fn test_table_schema_and_name() {
        let template = synthesize(&demo_stack()).unwrap();
        let table = template.resource("Records").unwrap();

        assert_eq!(table["Type"], "AWS::DynamoDB::Table");
        assert_eq!(
            table["Properties"]["KeySchema"],
            serde_json::json!([{ "AttributeName": "id", "KeyType": "HASH" }])
        );
        assert_eq!(
            table["Properties"]["AttributeDefinitions"][0]["AttributeType"],
            "S"
        );
        assert_eq!(table["Properties"]["TableName"], "Records");
        assert_eq!(table["DeletionPolicy"], "Delete");
    }

    #[test]
    fn test_outputs_render_references() {
        let template = synthesize(&demo_stack()).unwrap();
        let output = &template.outputs()["AssetBucketName"];

        assert_eq!(output["Description"], "The bucket name");
        assert_eq!(output["Value"], serde_json::json!({ "Ref": "AssetBucket" }));
    }

    #[test]
    fn test_unresolved_env_reference_rejected() {
        let mut stack = Stack::new("broken").unwrap();
        stack
            .add_function(
                "Worker",
                FunctionProps::new(
                    Runtime::Nodejs16X,
                    "index.handler",
                    Code::from_inline("exports.handler = async () => {};"),
                )
                .with_env("BUCKET_NAME", Expr::reference("NoSuchBucket")),
            )
            .unwrap();

        let err = synthesize(&stack).unwrap_err();
        assert!(matches!(
            err,
            StackError::UnresolvedReference { target, .. } if target == "NoSuchBucket"
        ));
    }

    #[test]
    fn test_unresolved_output_reference_rejected() {
        let mut stack = Stack::new("broken").unwrap();
        stack
            .add_output("Dangling", Expr::reference("Ghost"), "Points nowhere")
            .unwrap();

        let err = synthesize(&stack).unwrap_err();
        assert!(matches!(
            err,
            StackError::UnresolvedReference { target, .. } if target == "Ghost"
        ));
    }

    #[test]
    fn test_synthesized_id_collision_rejected() {
        let mut stack = Stack::new("collide").unwrap();
        stack
            .add_bucket("WorkerServiceRole", BucketProps::default())
            .unwrap();
        stack
            .add_function(
                "Worker",
                FunctionProps::new(
                    Runtime::Nodejs16X,
                    "index.handler",
                    Code::from_inline("exports.handler = async () => {};"),
                ),
            )
            .unwrap();

        assert_eq!(
            synthesize(&stack).unwrap_err(),
            StackError::DuplicateLogicalId("WorkerServiceRole".to_string()),
        );
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let stack = demo_stack();
        let first = synthesize(&stack).unwrap();
        let second = synthesize(&stack).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.to_json_string().unwrap(),
            second.to_json_string().unwrap()
        );
    }
}
