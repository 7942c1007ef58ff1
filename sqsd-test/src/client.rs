//! Client for the sqsd Query API

use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;

/// Client for interacting with sqsd
pub struct SqsdClient {
    base_url: String,
    client: Client,
}

/// A message returned by ReceiveMessage
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub md5_of_body: String,
    pub body: String,
}

/// Per-entry outcome of a DeleteMessageBatch call
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Ids of entries that were deleted
    pub successful: Vec<String>,
    /// `(id, error code)` of entries that failed
    pub failed: Vec<(String, String)>,
}

impl SqsdClient {
    /// Create a new client
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { base_url, client }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a Query API action and return the XML body of a successful reply
    pub async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<String, ClientError> {
        let mut form = vec![("Action", action)];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(format!("{}/", self.base_url))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(ClientError::Service {
                status,
                code: extract_xml_value(&text, "Code").unwrap_or_default(),
                message: extract_xml_value(&text, "Message").unwrap_or_default(),
            })
        }
    }

    /// Create a queue and return its URL
    pub async fn create_queue(&self, name: &str) -> Result<String, ClientError> {
        let text = self.call("CreateQueue", &[("QueueName", name)]).await?;
        extract_xml_value(&text, "QueueUrl")
            .ok_or_else(|| ClientError::ParseError("Failed to parse queue URL".to_string()))
    }

    /// Look up the URL of an existing queue
    pub async fn get_queue_url(&self, name: &str) -> Result<String, ClientError> {
        let text = self.call("GetQueueUrl", &[("QueueName", name)]).await?;
        extract_xml_value(&text, "QueueUrl")
            .ok_or_else(|| ClientError::ParseError("Failed to parse queue URL".to_string()))
    }

    /// List queue URLs, optionally filtered by name prefix
    pub async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>, ClientError> {
        let params: Vec<(&str, &str)> = prefix
            .map(|p| vec![("QueueNamePrefix", p)])
            .unwrap_or_default();
        let text = self.call("ListQueues", &params).await?;
        Ok(extract_all(&text, "QueueUrl"))
    }

    /// Send a message and return its id
    pub async fn send_message(&self, queue_url: &str, body: &str) -> Result<String, ClientError> {
        self.send_message_delayed(queue_url, body, 0).await
    }

    /// Send a message that becomes visible after `delay_seconds`
    pub async fn send_message_delayed(
        &self,
        queue_url: &str,
        body: &str,
        delay_seconds: u64,
    ) -> Result<String, ClientError> {
        let delay = delay_seconds.to_string();
        let text = self
            .call(
                "SendMessage",
                &[
                    ("QueueUrl", queue_url),
                    ("MessageBody", body),
                    ("DelaySeconds", &delay),
                ],
            )
            .await?;
        extract_xml_value(&text, "MessageId")
            .ok_or_else(|| ClientError::ParseError("Failed to parse message ID".to_string()))
    }

    /// Receive up to `max` messages, long polling for `wait_seconds`
    pub async fn receive_messages(
        &self,
        queue_url: &str,
        max: u32,
        wait_seconds: u64,
    ) -> Result<Vec<ReceivedMessage>, ClientError> {
        let max = max.to_string();
        let wait = wait_seconds.to_string();
        let text = self
            .call(
                "ReceiveMessage",
                &[
                    ("QueueUrl", queue_url),
                    ("MaxNumberOfMessages", &max),
                    ("WaitTimeSeconds", &wait),
                ],
            )
            .await?;

        extract_all(&text, "Message")
            .iter()
            .map(|m| {
                let field = |tag: &str| {
                    extract_xml_value(m, tag)
                        .ok_or_else(|| ClientError::ParseError(format!("Message without {}", tag)))
                };
                Ok(ReceivedMessage {
                    message_id: field("MessageId")?,
                    receipt_handle: field("ReceiptHandle")?,
                    md5_of_body: field("MD5OfBody")?,
                    body: unescape_xml(&field("Body")?),
                })
            })
            .collect()
    }

    /// Delete a message by receipt handle
    pub async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), ClientError> {
        self.call(
            "DeleteMessage",
            &[("QueueUrl", queue_url), ("ReceiptHandle", receipt_handle)],
        )
        .await?;
        Ok(())
    }

    /// Delete several messages; `entries` are `(id, receipt handle)` pairs
    pub async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: &[(&str, &str)],
    ) -> Result<BatchOutcome, ClientError> {
        let keys: Vec<(String, String)> = (1..=entries.len())
            .map(|n| {
                (
                    format!("DeleteMessageBatchRequestEntry.{}.Id", n),
                    format!("DeleteMessageBatchRequestEntry.{}.ReceiptHandle", n),
                )
            })
            .collect();

        let mut params = vec![("QueueUrl", queue_url)];
        for ((id_key, handle_key), (id, handle)) in keys.iter().zip(entries) {
            params.push((id_key.as_str(), *id));
            params.push((handle_key.as_str(), *handle));
        }

        let text = self.call("DeleteMessageBatch", &params).await?;

        let mut outcome = BatchOutcome::default();
        for entry in extract_all(&text, "DeleteMessageBatchResultEntry") {
            if let Some(id) = extract_xml_value(&entry, "Id") {
                outcome.successful.push(unescape_xml(&id));
            }
        }
        for entry in extract_all(&text, "BatchResultErrorEntry") {
            let id = extract_xml_value(&entry, "Id").unwrap_or_default();
            let code = extract_xml_value(&entry, "Code").unwrap_or_default();
            outcome.failed.push((unescape_xml(&id), code));
        }
        Ok(outcome)
    }

    /// Fetch the attributes of a queue
    pub async fn get_queue_attributes(
        &self,
        queue_url: &str,
    ) -> Result<HashMap<String, String>, ClientError> {
        let text = self
            .call(
                "GetQueueAttributes",
                &[("QueueUrl", queue_url), ("AttributeName.1", "All")],
            )
            .await?;

        Ok(extract_all(&text, "Attribute")
            .iter()
            .filter_map(|a| Some((extract_xml_value(a, "Name")?, extract_xml_value(a, "Value")?)))
            .collect())
    }
}

/// Extract the first value of `tag` from an XML document
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open_tag = format!("<{}>", tag);
    let close_tag = format!("</{}>", tag);

    let start = xml.find(&open_tag)? + open_tag.len();
    let end = xml[start..].find(&close_tag)?;
    Some(xml[start..start + end].to_string())
}

/// Extract every value of `tag`, in document order
fn extract_all(xml: &str, tag: &str) -> Vec<String> {
    let open_tag = format!("<{}>", tag);
    let close_tag = format!("</{}>", tag);

    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open_tag) {
        let after = &rest[start + open_tag.len()..];
        let Some(end) = after.find(&close_tag) else {
            break;
        };
        values.push(after[..end].to_string());
        rest = &after[end + close_tag.len()..];
    }
    values
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{status} {code}: {message}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// AWS error code of a service error
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
