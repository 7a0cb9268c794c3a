use warm_pool_lifecycle_core::contract::CompleteLifecycleActionRequest;

pub trait LifecycleActionCompleter {
    fn complete_lifecycle_action(&self, request: &CompleteLifecycleActionRequest)
        -> Result<(), String>;
}
