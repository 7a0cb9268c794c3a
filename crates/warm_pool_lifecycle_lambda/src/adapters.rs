pub mod autoscaling;
