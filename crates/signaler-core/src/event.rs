//! Inbound payload shapes.
//!
//! Three shapes arrive at the same entry point: provisioning-protocol requests
//! from a CloudFormation custom resource, scheduled ticks carrying the
//! [`TICK_REQUEST_ID`] sentinel, and CloudTrail management events for newly
//! launched instances. Unknown fields are ignored everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request id reserved for scheduled ticks.
pub const TICK_REQUEST_ID: &str = "__Event__";

pub const STACK_NAME_TAG: &str = "aws:cloudformation:stack-name";
pub const LOGICAL_ID_TAG: &str = "aws:cloudformation:logical-id";

// ---------------------------------------------------------------------------
// ResourceProperties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
    /// Schedule rule name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Counter parameter key.
    #[serde(
        default,
        rename = "SchedulerSSMParameter",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduler_ssm_parameter: Option<String>,
}

// ---------------------------------------------------------------------------
// RequestType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Other(s) => s,
        }
    }
}

impl From<String> for RequestType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Create" => RequestType::Create,
            "Update" => RequestType::Update,
            "Delete" => RequestType::Delete,
            _ => RequestType::Other(s),
        }
    }
}

impl From<RequestType> for String {
    fn from(t: RequestType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Provisioning protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
}

// ---------------------------------------------------------------------------
// Scheduled tick
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduledTick {
    #[serde(default)]
    pub resource_properties: ResourceProperties,
}

// ---------------------------------------------------------------------------
// CloudTrail management event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementEventDetail {
    #[serde(default)]
    pub management_event: bool,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub request_parameters: Option<RequestParameters>,
    #[serde(default)]
    pub response_elements: Option<ResponseElements>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(default)]
    pub tag_specification_set: Option<TagSpecificationSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagSpecificationSet {
    #[serde(default)]
    pub items: Vec<TagSpecification>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSpecification {
    pub resource_type: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseElements {
    #[serde(default)]
    pub instances_set: Option<InstancesSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstancesSet {
    #[serde(default)]
    pub items: Vec<LaunchedInstance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedInstance {
    pub instance_id: String,
}

impl ManagementEventDetail {
    /// True when an `instance` tag specification carries both expected tags.
    pub fn tags_instance(&self, stack_name: &str, logical_id: &str) -> bool {
        let Some(set) = self
            .request_parameters
            .as_ref()
            .and_then(|p| p.tag_specification_set.as_ref())
        else {
            return false;
        };
        set.items
            .iter()
            .filter(|spec| spec.resource_type == "instance")
            .any(|spec| {
                let has = |key: &str, value: &str| {
                    spec.tags.iter().any(|t| t.key == key && t.value == value)
                };
                has(STACK_NAME_TAG, stack_name) && has(LOGICAL_ID_TAG, logical_id)
            })
    }

    pub fn launched_instance_id(&self) -> Option<&str> {
        self.response_elements
            .as_ref()
            .and_then(|r| r.instances_set.as_ref())
            .and_then(|s| s.items.first())
            .map(|i| i.instance_id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Metadata about the current invocation, supplied by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub request_id: String,
    pub log_stream_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_type_keeps_unknown_values() {
        let t: RequestType = serde_json::from_value(json!("Replace")).unwrap();
        assert_eq!(t, RequestType::Other("Replace".into()));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!("Replace"));
        let t: RequestType = serde_json::from_value(json!("Update")).unwrap();
        assert_eq!(t, RequestType::Update);
    }

    #[test]
    fn resource_properties_use_protocol_names() {
        let props: ResourceProperties = serde_json::from_value(json!({
            "ServiceToken": "arn:aws:lambda:...",
            "StackName": "MyStack",
            "Event": "CFSignalerRule-MyStack",
            "SchedulerSSMParameter": "MyStack/CFSignalerFunction/SchedulerFlag"
        }))
        .unwrap();
        assert_eq!(props.stack_name.as_deref(), Some("MyStack"));
        assert_eq!(props.event.as_deref(), Some("CFSignalerRule-MyStack"));
        assert_eq!(
            props.scheduler_ssm_parameter.as_deref(),
            Some("MyStack/CFSignalerFunction/SchedulerFlag")
        );
    }

    #[test]
    fn management_event_tag_matching_requires_both_tags() {
        let detail: ManagementEventDetail = serde_json::from_value(json!({
            "managementEvent": true,
            "eventName": "RunInstances",
            "requestParameters": {
                "tagSpecificationSet": {
                    "items": [
                        {"resourceType": "volume", "tags": [
                            {"key": STACK_NAME_TAG, "value": "MyStack"},
                            {"key": LOGICAL_ID_TAG, "value": "EC2Instance"}
                        ]},
                        {"resourceType": "instance", "tags": [
                            {"key": STACK_NAME_TAG, "value": "MyStack"}
                        ]}
                    ]
                }
            },
            "responseElements": {"instancesSet": {"items": [{"instanceId": "i-0abc"}]}}
        }))
        .unwrap();
        assert!(!detail.tags_instance("MyStack", "EC2Instance"));
        assert_eq!(detail.launched_instance_id(), Some("i-0abc"));
    }
}
