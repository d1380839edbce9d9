use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::aws::aws_config::AwsConfig;
use crate::aws::aws_signer::{AwsSigner, SigningInput, host_header};
use crate::queue::MessageQueue;
use crate::types::queue_message::QueueMessage;

const JSON_PROTOCOL: &str = "application/x-amz-json-1.0";

/// Most entries SQS accepts in one batch request.
const MAX_BATCH_ENTRIES: usize = 10;

/// SQS over its JSON protocol.
#[derive(Clone, Debug)]
pub struct SqsQueue {
    http: reqwest::Client,
    signer: AwsSigner,
    queue_url: String,
    endpoint: Url,
    wait_time_secs: u64,
}

impl SqsQueue {
    pub fn new(config: AwsConfig, queue_url: &str, wait_time_secs: u64) -> Result<Self> {
        let parsed =
            Url::parse(queue_url).with_context(|| format!("invalid queue url {queue_url}"))?;
        let endpoint = Url::parse(&format!("{}/", parsed.origin().ascii_serialization()))
            .with_context(|| format!("invalid queue endpoint for {queue_url}"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            signer: AwsSigner::new(config, "sqs"),
            queue_url: queue_url.to_string(),
            endpoint,
            wait_time_secs,
        })
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, payload: Value) -> Result<T> {
        let body = serde_json::to_vec(&payload)?;
        let host = host_header(&self.endpoint)?;
        let target = format!("AmazonSQS.{action}");

        let input = SigningInput {
            method: "POST",
            host: &host,
            path: "/",
            query: "",
            headers: &[("content-type", JSON_PROTOCOL), ("x-amz-target", target.as_str())],
            payload: &body,
        };
        let headers = self.signer.signed_headers(&input, Utc::now())?;

        let resp = self
            .http
            .post(self.endpoint.clone())
            .headers(headers)
            .header(CONTENT_TYPE, JSON_PROTOCOL)
            .header("x-amz-target", &target)
            .body(body)
            .send()
            .await
            .with_context(|| format!("sqs {action} failed"))?;

        let status = resp.status();
        let text = resp.text().await.context("read response body failed")?;

        if !status.is_success() {
            anyhow::bail!("sqs {action} http error {status}: {text}");
        }

        match serde_json::from_str(&text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::error!(error = %e, %text, "failed to parse sqs JSON response");
                anyhow::bail!("parse sqs {action} response failed: {e}; raw={text}");
            }
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<String> {
        let result: SendMessageResult = self
            .call(
                "SendMessage",
                json!({ "QueueUrl": self.queue_url, "MessageBody": body }),
            )
            .await?;

        Ok(result.message_id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let result: ReceiveMessageResult = self
            .call(
                "ReceiveMessage",
                json!({
                    "QueueUrl": self.queue_url,
                    "MaxNumberOfMessages": max.clamp(1, MAX_BATCH_ENTRIES),
                    "WaitTimeSeconds": self.wait_time_secs,
                }),
            )
            .await?;

        Ok(result
            .messages
            .into_iter()
            .map(|message| QueueMessage {
                id: message.message_id,
                receipt: message.receipt_handle,
                body: message.body,
            })
            .collect())
    }

    async fn acknowledge(&self, messages: &[QueueMessage]) -> Result<()> {
        for chunk in messages.chunks(MAX_BATCH_ENTRIES) {
            let result: DeleteMessageBatchResult = self
                .call(
                    "DeleteMessageBatch",
                    json!({ "QueueUrl": self.queue_url, "Entries": delete_entries(chunk) }),
                )
                .await?;

            if !result.failed.is_empty() {
                anyhow::bail!("sqs failed to delete messages: {:?}", result.failed);
            }
        }

        Ok(())
    }
}

fn delete_entries(messages: &[QueueMessage]) -> Vec<Value> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| json!({ "Id": index.to_string(), "ReceiptHandle": message.receipt }))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResult {
    message_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResult {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    message_id: String,
    receipt_handle: String,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageBatchResult {
    #[serde(default)]
    failed: Vec<BatchResultError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[allow(dead_code)]
struct BatchResultError {
    id: String,
    code: String,
    #[serde(default)]
    message: Option<String>,
}
