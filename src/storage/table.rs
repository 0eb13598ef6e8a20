//! DynamoDB table construct.
//!
//! # Responsibilities
//! - Declare the table with its key schema, billing mode, TTL, recovery and stream settings
//! - Bind the table name into functions and grant them read or read/write access
//!
//! # Design Decisions
//! - Tables are retained by default; `removal_policy = "destroy"` is logged as a warning
//! - Attribute definitions are derived from the key schema and indexes, never declared by hand

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::compute::FunctionHandle;
use crate::synth::iam::{PolicyStatement, DYNAMODB_READ_ACTIONS, DYNAMODB_WRITE_ACTIONS};
use crate::synth::intrinsics::{get_att, reference, sub_with};
use crate::synth::{
    logical_id, Construct, ConstructError, ConstructResult, RemovalPolicy, Resource, Stack,
};

/// Environment key carrying the table name.
pub const TABLE_ENV: &str = "DYNAMODB_TABLE";

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum AttributeType {
    #[default]
    S,
    N,
    B,
}

impl AttributeType {
    fn as_str(self) -> &'static str {
        match self {
            AttributeType::S => "S",
            AttributeType::N => "N",
            AttributeType::B => "B",
        }
    }
}

/// A key attribute: name and scalar type (default: string).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type", default)]
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned,
}

/// What a stream record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamView {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

impl StreamView {
    fn as_str(self) -> &'static str {
        match self {
            StreamView::KeysOnly => "KEYS_ONLY",
            StreamView::NewImage => "NEW_IMAGE",
            StreamView::OldImage => "OLD_IMAGE",
            StreamView::NewAndOldImages => "NEW_AND_OLD_IMAGES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    All,
    KeysOnly,
}

/// Global secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub partition_key: Option<KeyAttribute>,
    pub sort_key: Option<KeyAttribute>,
    pub projection: Projection,
}

fn default_ttl_attribute() -> String {
    "ttl".to_string()
}

/// Props for [`TableConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TableProps {
    pub id: String,
    pub table_name: Option<String>,
    pub partition_key: Option<KeyAttribute>,
    pub sort_key: Option<KeyAttribute>,
    pub billing_mode: BillingMode,
    /// Required with provisioned billing, rejected otherwise.
    pub read_capacity: Option<u32>,
    pub write_capacity: Option<u32>,
    /// TTL attribute (default: "ttl"); empty disables TTL.
    pub ttl_attribute: String,
    pub point_in_time_recovery: bool,
    pub stream: Option<StreamView>,
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub removal_policy: RemovalPolicy,
    /// Functions granted read/write access.
    pub functions: Vec<String>,
    /// Functions granted read access.
    pub read_functions: Vec<String>,
}

impl Default for TableProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            table_name: None,
            partition_key: None,
            sort_key: None,
            billing_mode: BillingMode::default(),
            read_capacity: None,
            write_capacity: None,
            ttl_attribute: default_ttl_attribute(),
            point_in_time_recovery: true,
            stream: None,
            global_secondary_indexes: Vec::new(),
            removal_policy: RemovalPolicy::default(),
            functions: Vec::new(),
            read_functions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableConstruct {
    pub props: TableProps,
}

fn key_schema(partition: &KeyAttribute, sort: Option<&KeyAttribute>) -> Value {
    let mut schema = vec![json!({ "AttributeName": partition.name, "KeyType": "HASH" })];
    if let Some(sort) = sort {
        schema.push(json!({ "AttributeName": sort.name, "KeyType": "RANGE" }));
    }
    json!(schema)
}

/// Collect attribute definitions, rejecting one name with two types.
fn add_attribute(
    construct: &str,
    definitions: &mut Vec<KeyAttribute>,
    attribute: &KeyAttribute,
) -> ConstructResult<()> {
    if attribute.name.trim().is_empty() {
        return Err(ConstructError::invalid(construct, "key", "attribute name is empty"));
    }
    match definitions.iter().find(|d| d.name == attribute.name) {
        Some(existing) if existing.attribute_type != attribute.attribute_type => {
            Err(ConstructError::invalid(
                construct,
                "key",
                format!("attribute `{}` is declared with two types", attribute.name),
            ))
        }
        Some(_) => Ok(()),
        None => {
            definitions.push(attribute.clone());
            Ok(())
        }
    }
}

impl TableConstruct {
    pub fn new(props: TableProps) -> Self {
        Self { props }
    }

    fn throughput(&self) -> ConstructResult<Option<Value>> {
        let p = &self.props;
        match p.billing_mode {
            BillingMode::PayPerRequest => {
                if p.read_capacity.is_some() || p.write_capacity.is_some() {
                    return Err(ConstructError::dependency(
                        &p.id,
                        "read_capacity",
                        "billing_mode = \"provisioned\"",
                    ));
                }
                Ok(None)
            }
            BillingMode::Provisioned => {
                let read = p
                    .read_capacity
                    .ok_or_else(|| ConstructError::missing(&p.id, "read_capacity"))?;
                let write = p
                    .write_capacity
                    .ok_or_else(|| ConstructError::missing(&p.id, "write_capacity"))?;
                if read == 0 || write == 0 {
                    return Err(ConstructError::invalid(
                        &p.id,
                        "read_capacity",
                        "capacity must be positive",
                    ));
                }
                Ok(Some(json!({ "ReadCapacityUnits": read, "WriteCapacityUnits": write })))
            }
        }
    }

    /// Declare the table and its outputs. Returns the table's logical id.
    pub fn build(&self, stack: &mut Stack) -> ConstructResult<String> {
        let p = &self.props;
        if p.id.trim().is_empty() {
            return Err(ConstructError::missing("table", "id"));
        }
        let partition = p
            .partition_key
            .as_ref()
            .ok_or_else(|| ConstructError::missing(&p.id, "partition_key"))?;
        let throughput = self.throughput()?;

        let mut definitions = Vec::new();
        add_attribute(&p.id, &mut definitions, partition)?;
        if let Some(sort) = &p.sort_key {
            add_attribute(&p.id, &mut definitions, sort)?;
        }

        let mut indexes = Vec::with_capacity(p.global_secondary_indexes.len());
        for gsi in &p.global_secondary_indexes {
            if gsi.index_name.trim().is_empty() {
                return Err(ConstructError::missing(&p.id, "global_secondary_indexes.index_name"));
            }
            if p
                .global_secondary_indexes
                .iter()
                .filter(|other| other.index_name == gsi.index_name)
                .count()
                > 1
            {
                return Err(ConstructError::invalid(
                    &p.id,
                    "global_secondary_indexes",
                    format!("index `{}` is declared more than once", gsi.index_name),
                ));
            }
            let gsi_partition = gsi.partition_key.as_ref().ok_or_else(|| {
                ConstructError::missing(&p.id, "global_secondary_indexes.partition_key")
            })?;
            add_attribute(&p.id, &mut definitions, gsi_partition)?;
            if let Some(sort) = &gsi.sort_key {
                add_attribute(&p.id, &mut definitions, sort)?;
            }
            let mut index = json!({
                "IndexName": gsi.index_name,
                "KeySchema": key_schema(gsi_partition, gsi.sort_key.as_ref()),
                "Projection": {
                    "ProjectionType": match gsi.projection {
                        Projection::All => "ALL",
                        Projection::KeysOnly => "KEYS_ONLY",
                    }
                },
            });
            if let Some(throughput) = &throughput {
                index["ProvisionedThroughput"] = throughput.clone();
            }
            indexes.push(index);
        }

        let attribute_definitions: Vec<Value> = definitions
            .iter()
            .map(|d| json!({ "AttributeName": d.name, "AttributeType": d.attribute_type.as_str() }))
            .collect();

        let mut properties = json!({
            "BillingMode": match p.billing_mode {
                BillingMode::PayPerRequest => "PAY_PER_REQUEST",
                BillingMode::Provisioned => "PROVISIONED",
            },
            "AttributeDefinitions": attribute_definitions,
            "KeySchema": key_schema(partition, p.sort_key.as_ref()),
            "PointInTimeRecoverySpecification": {
                "PointInTimeRecoveryEnabled": p.point_in_time_recovery
            },
            "SSESpecification": { "SSEEnabled": true },
        });
        if let Some(name) = &p.table_name {
            properties["TableName"] = json!(name);
        }
        if let Some(throughput) = throughput {
            properties["ProvisionedThroughput"] = throughput;
        }
        if !p.ttl_attribute.trim().is_empty() {
            properties["TimeToLiveSpecification"] =
                json!({ "AttributeName": p.ttl_attribute, "Enabled": true });
        }
        if let Some(view) = p.stream {
            properties["StreamSpecification"] = json!({ "StreamViewType": view.as_str() });
        }
        if !indexes.is_empty() {
            properties["GlobalSecondaryIndexes"] = json!(indexes);
        }

        if p.removal_policy == RemovalPolicy::Destroy {
            tracing::warn!(construct = %p.id, "Table will be deleted with the stack");
        }
        let table_id = stack.add_resource(
            logical_id(&[&p.id, "Table"]),
            Resource::new("AWS::DynamoDB::Table", properties).with_removal_policy(p.removal_policy),
        )?;

        stack.add_exported_output(
            logical_id(&[&p.id, "TableName"]),
            reference(&table_id),
            "Table name",
        )?;
        stack.add_exported_output(
            logical_id(&[&p.id, "TableArn"]),
            get_att(&table_id, "Arn"),
            "Table ARN",
        )?;
        if p.stream.is_some() {
            stack.add_exported_output(
                logical_id(&[&p.id, "TableStreamArn"]),
                get_att(&table_id, "StreamArn"),
                "Table stream ARN",
            )?;
        }
        Ok(table_id)
    }
}

/// Bind a table name into functions and grant access to the table and its indexes.
pub(crate) fn bind_table(
    stack: &mut Stack,
    table_id: &str,
    env_key: &str,
    writers: &[FunctionHandle],
    readers: &[FunctionHandle],
) -> ConstructResult<()> {
    let resources = vec![
        get_att(table_id, "Arn"),
        sub_with("${Arn}/index/*", json!({ "Arn": get_att(table_id, "Arn") })),
    ];
    for handle in writers {
        handle.bind_environment(stack, env_key, reference(table_id))?;
        handle.grant(
            stack,
            PolicyStatement::allow_all(
                &[DYNAMODB_READ_ACTIONS, DYNAMODB_WRITE_ACTIONS],
                resources.clone(),
            ),
        )?;
    }
    for handle in readers {
        handle.bind_environment(stack, env_key, reference(table_id))?;
        handle.grant(stack, PolicyStatement::allow(DYNAMODB_READ_ACTIONS, resources.clone()))?;
    }
    Ok(())
}

impl Construct for TableConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "table"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let writers = stack.functions(&p.id, &p.functions)?;
        let readers = stack.functions(&p.id, &p.read_functions)?;
        let table_id = self.build(stack)?;
        bind_table(stack, &table_id, TABLE_ENV, &writers, &readers)
    }
}
