use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::contract::{LifecycleEventEnvelope, ValidationError};

pub const EVENT_SOURCE: &str = "aws.autoscaling";
pub const LAUNCH_LIFECYCLE_DETAIL_TYPE: &str = "EC2 Instance-launch Lifecycle Action";
pub const WARM_POOL_ORIGIN: &str = "WarmPool";
pub const AUTO_SCALING_GROUP_DESTINATION: &str = "AutoScalingGroup";
pub const COMPLETE_LIFECYCLE_ACTION_PERMISSION: &str = "autoscaling:CompleteLifecycleAction";

/// EventBridge rule pattern matching instances leaving the warm pool for the
/// group itself.
pub fn warm_pool_rule_pattern() -> Value {
    json!({
        "source": [EVENT_SOURCE],
        "detail-type": [LAUNCH_LIFECYCLE_DETAIL_TYPE],
        "detail": {
            "Origin": [WARM_POOL_ORIGIN],
            "Destination": [AUTO_SCALING_GROUP_DESTINATION],
        },
    })
}

pub fn complete_lifecycle_action_policy(auto_scaling_group_arn: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [COMPLETE_LIFECYCLE_ACTION_PERMISSION],
                "Resource": [auto_scaling_group_arn],
            }
        ],
    })
}

/// State instances wait in while they sit in the warm pool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WarmPoolState {
    #[default]
    #[serde(alias = "RUNNING")]
    Running,
    #[serde(alias = "STOPPED")]
    Stopped,
    #[serde(alias = "HIBERNATED")]
    Hibernated,
}

impl WarmPoolState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Hibernated => "Hibernated",
        }
    }

    /// Resolves an optional state name, falling back to `Running` when unset.
    pub fn resolve(raw: Option<&str>) -> Result<Self, ValidationError> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "hibernated" => Ok(Self::Hibernated),
            _ => Err(ValidationError::new(format!(
                "Unsupported warm pool state '{raw}' (expected RUNNING, STOPPED, or HIBERNATED)"
            ))),
        }
    }
}

/// `PutWarmPool` parameters for the group the handler serves. Unset sizes are
/// left out so the service defaults apply.
pub fn warm_pool_configuration(
    state: WarmPoolState,
    min_size: Option<u32>,
    max_prepared_capacity: Option<u32>,
) -> Value {
    let mut document = Map::new();
    document.insert("PoolState".to_string(), Value::from(state.as_str()));
    if let Some(min_size) = min_size {
        document.insert("MinSize".to_string(), Value::from(min_size));
    }
    if let Some(max_prepared_capacity) = max_prepared_capacity {
        document.insert(
            "MaxGroupPreparedCapacity".to_string(),
            Value::from(max_prepared_capacity),
        );
    }
    Value::Object(document)
}

/// Re-applies the rule pattern to a delivered envelope. Absent fields are not
/// treated as mismatches so direct invocations carrying only `detail` pass.
pub fn check_envelope(envelope: &LifecycleEventEnvelope) -> Result<(), ValidationError> {
    expect_field("source", envelope.source.as_deref(), EVENT_SOURCE)?;
    expect_field(
        "detail-type",
        envelope.detail_type.as_deref(),
        LAUNCH_LIFECYCLE_DETAIL_TYPE,
    )?;

    if let Some(detail) = envelope.detail.as_ref() {
        expect_field("detail.Origin", detail.origin.as_deref(), WARM_POOL_ORIGIN)?;
        expect_field(
            "detail.Destination",
            detail.destination.as_deref(),
            AUTO_SCALING_GROUP_DESTINATION,
        )?;
    }

    Ok(())
}

fn expect_field(name: &str, actual: Option<&str>, expected: &str) -> Result<(), ValidationError> {
    match actual {
        Some(value) if value != expected => Err(ValidationError::new(format!(
            "Unsupported event: {name} is '{value}' (expected '{expected}')"
        ))),
        _ => Ok(()),
    }
}
