use aws_sdk_autoscaling::config::retry::RetryConfig;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use warm_pool_lifecycle_core::contract::CompleteLifecycleActionRequest;
use warm_pool_lifecycle_lambda::adapters::autoscaling::LifecycleActionCompleter;
use warm_pool_lifecycle_lambda::config::HandlerConfig;
use warm_pool_lifecycle_lambda::handlers::lifecycle::{
    handle_lifecycle_event, LifecycleCompletionResponse,
};

struct AwsAutoScalingCompleter {
    autoscaling_client: aws_sdk_autoscaling::Client,
}

impl LifecycleActionCompleter for AwsAutoScalingCompleter {
    fn complete_lifecycle_action(
        &self,
        request: &CompleteLifecycleActionRequest,
    ) -> Result<(), String> {
        let client = self.autoscaling_client.clone();
        let request = request.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .complete_lifecycle_action()
                    .lifecycle_hook_name(request.lifecycle_hook_name)
                    .lifecycle_action_token(request.lifecycle_action_token)
                    .auto_scaling_group_name(request.auto_scaling_group_name)
                    .lifecycle_action_result(request.lifecycle_action_result)
                    .instance_id(request.instance_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        format!(
                            "failed to complete lifecycle action: {}",
                            DisplayErrorContext(&error)
                        )
                    })
            })
        })
    }
}

struct RuntimeDependencies {
    config: HandlerConfig,
    completer: AwsAutoScalingCompleter,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<LifecycleCompletionResponse, Error> {
    handle_lifecycle_event(event.payload, &deps.config, &deps.completer)
        .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = HandlerConfig::from_env().map_err(Error::from)?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    // Redelivery belongs to the invoking platform.
    let autoscaling_config = aws_sdk_autoscaling::config::Builder::from(&aws_config)
        .retry_config(RetryConfig::disabled())
        .build();

    let deps = RuntimeDependencies {
        config,
        completer: AwsAutoScalingCompleter {
            autoscaling_client: aws_sdk_autoscaling::Client::from_conf(autoscaling_config),
        },
    };
    let deps = &deps;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
