//! XML formatting for SQS Query API responses

use sqsd_core::{escape_xml, AwsError};

use crate::storage::Delivery;

const SQS_XMLNS: &str = "http://queue.amazonaws.com/doc/2012-11-05/";

/// Outcome of one `DeleteMessageBatch` entry
#[derive(Debug)]
pub enum BatchEntryResult {
    Deleted { id: String },
    Failed { id: String, error: AwsError },
}

/// Wrap a result element in the action's response envelope
fn envelope(action: &str, result: Option<&str>, request_id: &str) -> String {
    let result = result
        .map(|inner| format!("  <{action}Result>\n{inner}  </{action}Result>\n"))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<{action}Response xmlns="{SQS_XMLNS}">
{result}  <ResponseMetadata>
    <RequestId>{request_id}</RequestId>
  </ResponseMetadata>
</{action}Response>"#
    )
}

pub fn format_create_queue(queue_url: &str, request_id: &str) -> String {
    let inner = format!("    <QueueUrl>{}</QueueUrl>\n", escape_xml(queue_url));
    envelope("CreateQueue", Some(&inner), request_id)
}

pub fn format_get_queue_url(queue_url: &str, request_id: &str) -> String {
    let inner = format!("    <QueueUrl>{}</QueueUrl>\n", escape_xml(queue_url));
    envelope("GetQueueUrl", Some(&inner), request_id)
}

pub fn format_list_queues(queue_urls: &[String], request_id: &str) -> String {
    let inner: String = queue_urls
        .iter()
        .map(|url| format!("    <QueueUrl>{}</QueueUrl>\n", escape_xml(url)))
        .collect();
    envelope("ListQueues", Some(&inner), request_id)
}

pub fn format_send_message(message_id: &str, md5_of_body: &str, request_id: &str) -> String {
    let inner = format!(
        "    <MD5OfMessageBody>{}</MD5OfMessageBody>\n    <MessageId>{}</MessageId>\n",
        md5_of_body, message_id
    );
    envelope("SendMessage", Some(&inner), request_id)
}

fn format_message(delivery: &Delivery) -> String {
    let msg = &delivery.message;
    format!(
        r#"    <Message>
      <MessageId>{}</MessageId>
      <ReceiptHandle>{}</ReceiptHandle>
      <MD5OfBody>{}</MD5OfBody>
      <Body>{}</Body>
      <Attribute>
        <Name>SentTimestamp</Name>
        <Value>{}</Value>
      </Attribute>
      <Attribute>
        <Name>ApproximateReceiveCount</Name>
        <Value>{}</Value>
      </Attribute>
    </Message>
"#,
        msg.id(),
        delivery.receipt_handle,
        msg.md5_of_body(),
        escape_xml(&msg.body_text()),
        msg.sent_timestamp(),
        msg.receive_count()
    )
}

pub fn format_receive_message(deliveries: &[Delivery], request_id: &str) -> String {
    let inner: String = deliveries.iter().map(format_message).collect();
    envelope("ReceiveMessage", Some(&inner), request_id)
}

pub fn format_delete_message(request_id: &str) -> String {
    envelope("DeleteMessage", None, request_id)
}

pub fn format_delete_message_batch(results: &[BatchEntryResult], request_id: &str) -> String {
    let inner: String = results
        .iter()
        .map(|r| match r {
            BatchEntryResult::Deleted { id } => format!(
                "    <DeleteMessageBatchResultEntry>\n      <Id>{}</Id>\n    </DeleteMessageBatchResultEntry>\n",
                escape_xml(id)
            ),
            BatchEntryResult::Failed { id, error } => format!(
                r#"    <BatchResultErrorEntry>
      <Id>{}</Id>
      <SenderFault>{}</SenderFault>
      <Code>{}</Code>
      <Message>{}</Message>
    </BatchResultErrorEntry>
"#,
                escape_xml(id),
                error.code.fault() == "Sender",
                error.code.as_str(),
                escape_xml(&error.message)
            ),
        })
        .collect();
    envelope("DeleteMessageBatch", Some(&inner), request_id)
}

pub fn format_get_queue_attributes(attributes: &[(&str, String)], request_id: &str) -> String {
    let inner: String = attributes
        .iter()
        .map(|(name, value)| {
            format!(
                "    <Attribute>\n      <Name>{}</Name>\n      <Value>{}</Value>\n    </Attribute>\n",
                name,
                escape_xml(value)
            )
        })
        .collect();
    envelope("GetQueueAttributes", Some(&inner), request_id)
}
