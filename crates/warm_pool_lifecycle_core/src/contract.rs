use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const LIFECYCLE_ACTION_RESULT_CONTINUE: &str = "CONTINUE";

const TOKEN_LOG_PREFIX_LEN: usize = 8;

/// EventBridge envelope as delivered to the handler. Only `detail` is needed to
/// complete the action; the routing fields are kept so the rule pattern can be
/// re-checked when they are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleEventEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "detail-type")]
    pub detail_type: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub detail: Option<LifecycleEventDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleEventDetail {
    #[serde(default, rename = "LifecycleHookName")]
    pub lifecycle_hook_name: Option<String>,
    #[serde(default, rename = "LifecycleActionToken")]
    pub lifecycle_action_token: Option<String>,
    #[serde(default, rename = "AutoScalingGroupName")]
    pub auto_scaling_group_name: Option<String>,
    #[serde(default, rename = "EC2InstanceId")]
    pub ec2_instance_id: Option<String>,
    #[serde(default, rename = "Origin")]
    pub origin: Option<String>,
    #[serde(default, rename = "Destination")]
    pub destination: Option<String>,
    #[serde(default, rename = "LifecycleTransition")]
    pub lifecycle_transition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub lifecycle_hook_name: String,
    pub lifecycle_action_token: String,
    pub auto_scaling_group_name: String,
    pub ec2_instance_id: String,
}

impl LifecycleEvent {
    /// Shortened token for log lines; the full token can complete the action.
    pub fn token_prefix(&self) -> &str {
        let token = self.lifecycle_action_token.as_str();
        match token.char_indices().nth(TOKEN_LOG_PREFIX_LEN) {
            Some((index, _)) => &token[..index],
            None => token,
        }
    }
}

/// Parameters of the control-plane `CompleteLifecycleAction` call, serialized
/// with the API's own parameter names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CompleteLifecycleActionRequest {
    pub lifecycle_hook_name: String,
    pub lifecycle_action_token: String,
    pub auto_scaling_group_name: String,
    pub lifecycle_action_result: String,
    pub instance_id: String,
}

impl CompleteLifecycleActionRequest {
    pub fn continue_from(event: &LifecycleEvent) -> Self {
        Self {
            lifecycle_hook_name: event.lifecycle_hook_name.clone(),
            lifecycle_action_token: event.lifecycle_action_token.clone(),
            auto_scaling_group_name: event.auto_scaling_group_name.clone(),
            lifecycle_action_result: LIFECYCLE_ACTION_RESULT_CONTINUE.to_string(),
            instance_id: event.ec2_instance_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn parse_envelope(event: Value) -> Result<LifecycleEventEnvelope, ValidationError> {
    if !event.is_object() {
        return Err(ValidationError::new("Event payload must be a JSON object"));
    }

    serde_json::from_value(event)
        .map_err(|error| ValidationError::new(format!("Malformed lifecycle event: {error}")))
}

pub fn validate_envelope(
    envelope: &LifecycleEventEnvelope,
) -> Result<LifecycleEvent, ValidationError> {
    let Some(detail) = envelope.detail.as_ref() else {
        return Err(ValidationError::new("Event is missing the detail object"));
    };

    validate_detail(detail)
}

pub fn validate_detail(detail: &LifecycleEventDetail) -> Result<LifecycleEvent, ValidationError> {
    let fields = [
        ("LifecycleHookName", &detail.lifecycle_hook_name),
        ("LifecycleActionToken", &detail.lifecycle_action_token),
        ("AutoScalingGroupName", &detail.auto_scaling_group_name),
        ("EC2InstanceId", &detail.ec2_instance_id),
    ];

    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| required_value(value).is_none())
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(ValidationError::new(format!(
            "Lifecycle event detail is missing required fields: {}",
            missing.join(", ")
        )));
    }

    Ok(LifecycleEvent {
        lifecycle_hook_name: required_string(&detail.lifecycle_hook_name),
        lifecycle_action_token: required_string(&detail.lifecycle_action_token),
        auto_scaling_group_name: required_string(&detail.auto_scaling_group_name),
        ec2_instance_id: required_string(&detail.ec2_instance_id),
    })
}

fn required_value(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

fn required_string(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn request_fingerprint(request: &CompleteLifecycleActionRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(request));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).unwrap_or_default()
}
