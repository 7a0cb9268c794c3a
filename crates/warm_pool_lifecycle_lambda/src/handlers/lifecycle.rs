use serde::{Deserialize, Serialize};
use serde_json::json;
use warm_pool_lifecycle_core::contract::{
    parse_envelope, request_fingerprint, validate_envelope, CompleteLifecycleActionRequest,
    ValidationError,
};
use warm_pool_lifecycle_core::event_pattern::check_envelope;

use crate::adapters::autoscaling::LifecycleActionCompleter;
use crate::config::HandlerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleCompletionResponse {
    pub status: String,
    pub lifecycle_hook_name: String,
    pub auto_scaling_group_name: String,
    pub instance_id: String,
    pub lifecycle_action_result: String,
    pub request_fingerprint: String,
    pub event_time: Option<String>,
    pub lifecycle_transition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleErrorKind {
    Validation,
    ControlPlane,
}

impl LifecycleErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::ControlPlane => "control_plane_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleHandlerError {
    pub kind: LifecycleErrorKind,
    pub message: String,
}

impl From<ValidationError> for LifecycleHandlerError {
    fn from(error: ValidationError) -> Self {
        Self {
            kind: LifecycleErrorKind::Validation,
            message: error.message().to_string(),
        }
    }
}

impl std::fmt::Display for LifecycleHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for LifecycleHandlerError {}

/// Completes the pending launch lifecycle action named by `event` with
/// `CONTINUE`. Exactly one control-plane call is made on success and none when
/// the event fails validation. Failures are returned as-is; redelivery is left
/// to the invoking platform.
pub fn handle_lifecycle_event(
    event: serde_json::Value,
    config: &HandlerConfig,
    completer: &impl LifecycleActionCompleter,
) -> Result<LifecycleCompletionResponse, LifecycleHandlerError> {
    let envelope = parse_envelope(event).inspect_err(log_validation_failure)?;

    if config.enforce_event_pattern {
        check_envelope(&envelope).inspect_err(log_validation_failure)?;
    }

    let lifecycle_event = validate_envelope(&envelope).inspect_err(log_validation_failure)?;
    let request = CompleteLifecycleActionRequest::continue_from(&lifecycle_event);
    let fingerprint = request_fingerprint(&request);
    let lifecycle_transition = envelope
        .detail
        .as_ref()
        .and_then(|detail| detail.lifecycle_transition.clone());

    log_lifecycle_info(
        "lifecycle_event_received",
        json!({
            "event_id": envelope.id,
            "event_time": envelope.time,
            "lifecycle_transition": lifecycle_transition,
            "lifecycle_hook_name": request.lifecycle_hook_name.clone(),
            "auto_scaling_group_name": request.auto_scaling_group_name.clone(),
            "instance_id": request.instance_id.clone(),
            "lifecycle_action_token_prefix": lifecycle_event.token_prefix(),
            "request_fingerprint": fingerprint.clone(),
        }),
    );

    if let Err(error) = completer.complete_lifecycle_action(&request) {
        log_lifecycle_error(
            "lifecycle_action_failed",
            json!({
                "error_kind": LifecycleErrorKind::ControlPlane.as_str(),
                "auto_scaling_group_name": request.auto_scaling_group_name.clone(),
                "instance_id": request.instance_id.clone(),
                "request_fingerprint": fingerprint.clone(),
                "error": error.clone(),
            }),
        );
        return Err(LifecycleHandlerError {
            kind: LifecycleErrorKind::ControlPlane,
            message: error,
        });
    }

    log_lifecycle_info(
        "lifecycle_action_completed",
        json!({
            "auto_scaling_group_name": request.auto_scaling_group_name.clone(),
            "instance_id": request.instance_id.clone(),
            "lifecycle_action_result": request.lifecycle_action_result.clone(),
            "request_fingerprint": fingerprint.clone(),
        }),
    );

    Ok(LifecycleCompletionResponse {
        status: "completed".to_string(),
        lifecycle_hook_name: request.lifecycle_hook_name,
        auto_scaling_group_name: request.auto_scaling_group_name,
        instance_id: request.instance_id,
        lifecycle_action_result: request.lifecycle_action_result,
        request_fingerprint: fingerprint,
        event_time: envelope.time,
        lifecycle_transition,
    })
}

fn log_validation_failure(error: &ValidationError) {
    log_lifecycle_error(
        "lifecycle_action_failed",
        json!({
            "error_kind": LifecycleErrorKind::Validation.as_str(),
            "error": error.message(),
        }),
    );
}

fn log_lifecycle_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "lifecycle_handler",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_lifecycle_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "lifecycle_handler",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;

    struct RecordingCompleter {
        requests: Mutex<Vec<CompleteLifecycleActionRequest>>,
    }

    impl RecordingCompleter {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompleteLifecycleActionRequest> {
            self.requests.lock().expect("poisoned mutex").clone()
        }
    }

    impl LifecycleActionCompleter for RecordingCompleter {
        fn complete_lifecycle_action(
            &self,
            request: &CompleteLifecycleActionRequest,
        ) -> Result<(), String> {
            self.requests
                .lock()
                .expect("poisoned mutex")
                .push(request.clone());
            Ok(())
        }
    }

    struct FailingCompleter {
        attempts: Mutex<usize>,
        message: &'static str,
    }

    impl FailingCompleter {
        fn new(message: &'static str) -> Self {
            Self {
                attempts: Mutex::new(0),
                message,
            }
        }

        fn attempts(&self) -> usize {
            *self.attempts.lock().expect("poisoned mutex")
        }
    }

    impl LifecycleActionCompleter for FailingCompleter {
        fn complete_lifecycle_action(
            &self,
            _request: &CompleteLifecycleActionRequest,
        ) -> Result<(), String> {
            *self.attempts.lock().expect("poisoned mutex") += 1;
            Err(self.message.to_string())
        }
    }

    fn bare_event() -> Value {
        json!({
            "detail": {
                "LifecycleHookName": "h1",
                "LifecycleActionToken": "t1",
                "AutoScalingGroupName": "asg1",
                "EC2InstanceId": "i-123"
            }
        })
    }

    fn fixture_event() -> Value {
        serde_json::from_str(include_str!("../../fixtures/warm_pool_launch_event.json"))
            .expect("fixture should be valid json")
    }

    #[test]
    fn completes_action_with_continue() {
        let completer = RecordingCompleter::new();
        let response = handle_lifecycle_event(bare_event(), &HandlerConfig::default(), &completer)
            .expect("handler should succeed");

        assert_eq!(
            completer.requests(),
            vec![CompleteLifecycleActionRequest {
                lifecycle_hook_name: "h1".to_string(),
                lifecycle_action_token: "t1".to_string(),
                auto_scaling_group_name: "asg1".to_string(),
                lifecycle_action_result: "CONTINUE".to_string(),
                instance_id: "i-123".to_string(),
            }]
        );
        assert_eq!(response.status, "completed");
        assert_eq!(response.instance_id, "i-123");
        assert_eq!(response.lifecycle_action_result, "CONTINUE");
    }

    #[test]
    fn completes_action_for_eventbridge_delivery() {
        let completer = RecordingCompleter::new();
        let response =
            handle_lifecycle_event(fixture_event(), &HandlerConfig::default(), &completer)
                .expect("handler should succeed");

        let requests = completer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].lifecycle_hook_name, "warm-pool-launch-hook");
        assert_eq!(
            requests[0].lifecycle_action_token,
            "71514b9d-6a40-4b26-8523-05e7ee35fa40"
        );
        assert_eq!(response.auto_scaling_group_name, "web-asg");
        assert_eq!(response.event_time.as_deref(), Some("2026-03-04T17:36:12Z"));
        assert_eq!(
            response.lifecycle_transition.as_deref(),
            Some("autoscaling:EC2_INSTANCE_LAUNCHING")
        );
    }

    #[test]
    fn bare_detail_event_reports_no_envelope_metadata() {
        let completer = RecordingCompleter::new();
        let response = handle_lifecycle_event(bare_event(), &HandlerConfig::default(), &completer)
            .expect("handler should succeed");

        assert!(response.event_time.is_none());
        assert!(response.lifecycle_transition.is_none());
    }

    #[test]
    fn padded_identifiers_are_forwarded_unchanged() {
        let completer = RecordingCompleter::new();
        let mut event = bare_event();
        event["detail"]["EC2InstanceId"] = Value::from(" i-123 ");

        handle_lifecycle_event(event, &HandlerConfig::default(), &completer)
            .expect("padded identifier should still validate");

        assert_eq!(completer.requests()[0].instance_id, " i-123 ");
    }

    #[test]
    fn missing_instance_id_fails_without_calling_control_plane() {
        let completer = RecordingCompleter::new();
        let mut event = bare_event();
        if let Some(detail) = event["detail"].as_object_mut() {
            detail.remove("EC2InstanceId");
        }

        let error = handle_lifecycle_event(event, &HandlerConfig::default(), &completer)
            .expect_err("missing instance id should fail");

        assert_eq!(error.kind, LifecycleErrorKind::Validation);
        assert!(error.message.contains("EC2InstanceId"));
        assert!(completer.requests().is_empty());
    }

    #[test]
    fn each_missing_field_is_rejected_before_dispatch() {
        for field in [
            "LifecycleHookName",
            "LifecycleActionToken",
            "AutoScalingGroupName",
            "EC2InstanceId",
        ] {
            let completer = RecordingCompleter::new();
            let mut event = bare_event();
            event["detail"][field] = Value::from("");

            let error = handle_lifecycle_event(event, &HandlerConfig::default(), &completer)
                .expect_err("empty field should fail");

            assert_eq!(error.kind, LifecycleErrorKind::Validation);
            assert!(error.message.contains(field), "{field} not named");
            assert!(completer.requests().is_empty());
        }
    }

    #[test]
    fn event_without_detail_is_rejected() {
        let completer = RecordingCompleter::new();
        let error = handle_lifecycle_event(
            json!({"source": "aws.autoscaling"}),
            &HandlerConfig::default(),
            &completer,
        )
        .expect_err("missing detail should fail");

        assert_eq!(error.kind, LifecycleErrorKind::Validation);
        assert!(completer.requests().is_empty());
    }

    #[test]
    fn control_plane_failure_propagates_without_retry() {
        let completer =
            FailingCompleter::new("ValidationError: No active Lifecycle Action found with token t1");
        let error = handle_lifecycle_event(bare_event(), &HandlerConfig::default(), &completer)
            .expect_err("control plane failure should fail the invocation");

        assert_eq!(error.kind, LifecycleErrorKind::ControlPlane);
        assert!(error.message.contains("No active Lifecycle Action"));
        assert_eq!(completer.attempts(), 1);
        assert!(error.to_string().starts_with("control_plane_error: "));
    }

    #[test]
    fn repeated_event_builds_identical_request() {
        let completer = RecordingCompleter::new();
        let first = handle_lifecycle_event(bare_event(), &HandlerConfig::default(), &completer)
            .expect("first delivery should succeed");
        let second = handle_lifecycle_event(bare_event(), &HandlerConfig::default(), &completer)
            .expect("second delivery should succeed");

        let requests = completer.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(first.request_fingerprint, second.request_fingerprint);
    }

    #[test]
    fn enforced_pattern_rejects_other_origins() {
        let completer = RecordingCompleter::new();
        let mut event = fixture_event();
        event["detail"]["Origin"] = Value::from("EC2");
        event["detail"]["Destination"] = Value::from("WarmPool");

        let error = handle_lifecycle_event(event, &HandlerConfig::default(), &completer)
            .expect_err("launch into warm pool should be rejected");

        assert_eq!(error.kind, LifecycleErrorKind::Validation);
        assert!(error.message.starts_with("Unsupported event"));
        assert!(completer.requests().is_empty());
    }

    #[test]
    fn relaxed_pattern_completes_other_origins() {
        let completer = RecordingCompleter::new();
        let mut event = fixture_event();
        event["detail"]["Origin"] = Value::from("EC2");
        let config = HandlerConfig {
            enforce_event_pattern: false,
        };

        handle_lifecycle_event(event, &config, &completer).expect("handler should succeed");

        assert_eq!(completer.requests().len(), 1);
    }
}
