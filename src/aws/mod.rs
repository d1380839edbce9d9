pub mod aws_config;
pub mod aws_signer;
pub mod s3_store;
pub mod sqs_queue;
