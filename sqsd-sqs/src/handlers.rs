//! HTTP handlers for the SQS Query API
//!
//! Requests carry their action in the `Action` parameter (or an
//! `X-Amz-Target: AmazonSQS.<Action>` header) and their arguments as
//! form-encoded pairs in the query string and/or body.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sqsd_core::{AwsError, ErrorCode, RequestId};

use crate::state::SqsState;
use crate::storage::{queue_name_from_url, Delivery, Message, Queue};
use crate::xml::{self, BatchEntryResult};

/// Most messages a single ReceiveMessage may return
pub const MAX_RECEIVE_MESSAGES: usize = 10;
/// Most entries a single batch request may carry
pub const MAX_BATCH_ENTRIES: usize = 10;
/// Largest `DelaySeconds` SQS accepts
pub const MAX_DELAY_SECONDS: u64 = 900;

type Params = HashMap<String, String>;

/// Request context shared by every action handler
struct QueryRequest<'a> {
    method: &'a Method,
    path: &'a str,
    params: Params,
    request_id: String,
}

impl QueryRequest<'_> {
    fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str, AwsError> {
        self.param(name).ok_or_else(|| AwsError::missing_parameter(name))
    }
}

/// Handle any SQS Query API request
pub async fn handle_request(
    State(state): State<Arc<SqsState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = parse_params(uri.query(), &body);
    let action = action_name(&params, &headers).unwrap_or_default();
    let request_id = RequestId::new().id;

    info!(action = %action, path = %uri.path(), "SQS request");

    let request = QueryRequest {
        method: &method,
        path: uri.path(),
        params,
        request_id,
    };

    let result = match action.as_str() {
        "CreateQueue" => handle_create_queue(&state, &request),
        "GetQueueUrl" => handle_get_queue_url(&state, &request),
        "ListQueues" => handle_list_queues(&state, &request),
        "SendMessage" => handle_send_message(&state, &request),
        "ReceiveMessage" => handle_receive_message(&state, &request).await,
        "DeleteMessage" => handle_delete_message(&state, &request),
        "DeleteMessageBatch" => handle_delete_message_batch(&state, &request),
        "GetQueueAttributes" => handle_get_queue_attributes(&state, &request),
        _ => {
            warn!(action = %action, "Unknown SQS action");
            Err(AwsError::new(
                ErrorCode::InvalidAction,
                format!("The action {} is not valid for this endpoint.", action),
            ))
        }
    };

    match result {
        Ok(xml) => xml_response(StatusCode::OK, xml, &request.request_id),
        Err(err) => error_response(err.with_request_id(request.request_id.clone())),
    }
}

/// Clear every queue; used to isolate test runs
pub async fn handle_reset(State(state): State<Arc<SqsState>>) -> impl IntoResponse {
    let dropped = state.registry.reset();
    Json(serde_json::json!({ "status": "reset", "queues": dropped }))
}

// === Request parsing ===

/// Merge query-string and form-body parameters; body values win
fn parse_params(query: Option<&str>, body: &[u8]) -> Params {
    let mut params: Params = query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    params.extend(
        form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned())),
    );
    params
}

fn action_name(params: &Params, headers: &HeaderMap) -> Option<String> {
    if let Some(action) = params.get("Action") {
        return Some(action.clone());
    }
    headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .map(|target| target.trim_start_matches("AmazonSQS.").to_string())
}

/// Find the queue a request addresses
///
/// GET requests name the queue in the path. Other methods use `QueueUrl`,
/// falling back to the path when the parameter is absent.
fn resolve_queue(state: &SqsState, request: &QueryRequest<'_>) -> Result<Arc<Queue>, AwsError> {
    let address = if *request.method == Method::GET {
        request.path
    } else {
        request.param("QueueUrl").unwrap_or(request.path)
    };

    let name = queue_name_from_url(address);
    if name.is_empty() {
        return Err(AwsError::missing_parameter("QueueUrl"));
    }

    state.registry.lookup(name).map_err(|e| {
        warn!(queue = %name, "No such queue");
        AwsError::from(e)
    })
}

fn parse_u64(request: &QueryRequest<'_>, name: &str) -> Result<Option<u64>, AwsError> {
    request
        .param(name)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| {
                AwsError::new(
                    ErrorCode::InvalidParameterValue,
                    format!("Value {} for parameter {} is invalid.", v, name),
                )
            })
        })
        .transpose()
}

// === Handlers ===

fn handle_create_queue(state: &SqsState, request: &QueryRequest<'_>) -> Result<String, AwsError> {
    let name = request.required("QueueName")?;
    let queue = state.registry.create(name)?;
    Ok(xml::format_create_queue(queue.url(), &request.request_id))
}

fn handle_get_queue_url(state: &SqsState, request: &QueryRequest<'_>) -> Result<String, AwsError> {
    let name = request.required("QueueName")?;
    let queue = state.registry.lookup(name)?;
    info!(name = %name, url = %queue.url(), "Resolved queue URL");
    Ok(xml::format_get_queue_url(queue.url(), &request.request_id))
}

fn handle_list_queues(state: &SqsState, request: &QueryRequest<'_>) -> Result<String, AwsError> {
    let prefix = request.param("QueueNamePrefix").unwrap_or("");
    let urls: Vec<String> = state
        .registry
        .list()
        .iter()
        .filter(|q| q.name().starts_with(prefix))
        .map(|q| q.url().to_string())
        .collect();
    Ok(xml::format_list_queues(&urls, &request.request_id))
}

fn handle_send_message(state: &Arc<SqsState>, request: &QueryRequest<'_>) -> Result<String, AwsError> {
    let queue = resolve_queue(state, request)?;
    let body = request.required("MessageBody")?;
    if let Some(c) = body.chars().find(|c| !is_allowed_body_char(*c)) {
        return Err(AwsError::new(
            ErrorCode::InvalidMessageContents,
            format!(
                "Invalid binary character '#x{:X}' was found in the message body.",
                u32::from(c)
            ),
        ));
    }

    let delay_seconds = parse_u64(request, "DelaySeconds")?.unwrap_or(0);
    if delay_seconds > MAX_DELAY_SECONDS {
        return Err(AwsError::new(
            ErrorCode::InvalidParameterValue,
            format!(
                "Value {} for parameter DelaySeconds is invalid. Reason: must be between 0 and {}.",
                delay_seconds, MAX_DELAY_SECONDS
            ),
        ));
    }
    let delay = Duration::from_secs(delay_seconds).max(state.delay);

    let message = Message::new(body.to_string());
    let message_id = message.id().to_string();
    let md5_of_body = message.md5_of_body().to_string();

    if delay.is_zero() {
        queue.push(message)?;
    } else {
        info!(queue = %queue.name(), message_id = %message_id, ?delay, "Delaying message");
        spawn_delayed_push(Arc::clone(state), queue, message, delay);
    }

    Ok(xml::format_send_message(
        &message_id,
        &md5_of_body,
        &request.request_id,
    ))
}

/// Characters SQS accepts in a message body; the same set XML 1.0 allows
fn is_allowed_body_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}'
            | '\u{A}'
            | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Make `message` visible on `queue` after `delay`, unless the queue has been
/// replaced or reset in the meantime
fn spawn_delayed_push(state: Arc<SqsState>, queue: Arc<Queue>, message: Message, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let current = state.registry.lookup(queue.name());
        if !matches!(&current, Ok(q) if Arc::ptr_eq(q, &queue)) {
            warn!(
                queue = %queue.name(),
                message_id = %message.id(),
                "Queue was replaced before delayed message became visible; dropping it"
            );
            return;
        }

        if let Err(e) = queue.push(message) {
            warn!(queue = %queue.name(), error = %e, "Failed to deliver delayed message");
        }
    });
}

async fn handle_receive_message(
    state: &SqsState,
    request: &QueryRequest<'_>,
) -> Result<String, AwsError> {
    let queue = resolve_queue(state, request)?;

    // An unparseable wait is treated as no wait at all
    let wait = request
        .param("WaitTimeSeconds")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
        .min(state.max_wait);

    let max_messages = request
        .param("MaxNumberOfMessages")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_RECEIVE_MESSAGES);

    let first = if wait.is_zero() {
        queue.front()?
    } else {
        queue.front_wait(wait).await?
    };

    let mut deliveries: Vec<Delivery> = first.into_iter().collect();
    while !deliveries.is_empty() && deliveries.len() < max_messages {
        match queue.front()? {
            Some(d) => deliveries.push(d),
            None => break,
        }
    }

    info!(queue = %queue.name(), count = deliveries.len(), "Received messages");
    Ok(xml::format_receive_message(&deliveries, &request.request_id))
}

fn handle_delete_message(state: &SqsState, request: &QueryRequest<'_>) -> Result<String, AwsError> {
    let queue = resolve_queue(state, request)?;
    let receipt_handle = request.required("ReceiptHandle")?;
    queue.delete(receipt_handle)?;
    Ok(xml::format_delete_message(&request.request_id))
}

/// Collect `DeleteMessageBatchRequestEntry.N.*` pairs, N counting from 1
fn batch_entries(request: &QueryRequest<'_>) -> Result<Vec<(String, String)>, AwsError> {
    let mut entries = Vec::new();
    for n in 1.. {
        let id_key = format!("DeleteMessageBatchRequestEntry.{}.Id", n);
        let handle_key = format!("DeleteMessageBatchRequestEntry.{}.ReceiptHandle", n);

        let (id, handle) = match (request.param(&id_key), request.param(&handle_key)) {
            (None, None) => break,
            (_, None) => return Err(AwsError::missing_parameter(&handle_key)),
            (id, Some(handle)) => (id.map_or_else(|| n.to_string(), str::to_string), handle),
        };
        entries.push((id, handle.to_string()));
    }
    Ok(entries)
}

fn handle_delete_message_batch(
    state: &SqsState,
    request: &QueryRequest<'_>,
) -> Result<String, AwsError> {
    let queue = resolve_queue(state, request)?;
    let entries = batch_entries(request)?;

    if entries.is_empty() {
        return Err(AwsError::new(
            ErrorCode::EmptyBatchRequest,
            "There should be at least one DeleteMessageBatchRequestEntry in the request.",
        ));
    }
    if entries.len() > MAX_BATCH_ENTRIES {
        return Err(AwsError::new(
            ErrorCode::TooManyEntriesInBatchRequest,
            format!(
                "Maximum number of entries per request are {}. You have sent {}.",
                MAX_BATCH_ENTRIES,
                entries.len()
            ),
        ));
    }
    let mut seen = HashSet::new();
    if let Some((id, _)) = entries.iter().find(|(id, _)| !seen.insert(id.as_str())) {
        return Err(AwsError::new(
            ErrorCode::BatchEntryIdsNotDistinct,
            format!("Id {} repeated.", id),
        ));
    }

    let handles: Vec<&str> = entries.iter().map(|(_, h)| h.as_str()).collect();
    let results: Vec<BatchEntryResult> = queue
        .delete_batch(&handles)
        .into_iter()
        .zip(entries.iter())
        .map(|(result, (id, _))| match result {
            Ok(()) => BatchEntryResult::Deleted { id: id.clone() },
            Err(e) => BatchEntryResult::Failed {
                id: id.clone(),
                error: e.into(),
            },
        })
        .collect();

    let failed = results
        .iter()
        .filter(|r| matches!(r, BatchEntryResult::Failed { .. }))
        .count();
    info!(queue = %queue.name(), total = results.len(), failed, "Batch delete");

    Ok(xml::format_delete_message_batch(&results, &request.request_id))
}

fn handle_get_queue_attributes(
    state: &SqsState,
    request: &QueryRequest<'_>,
) -> Result<String, AwsError> {
    let queue = resolve_queue(state, request)?;
    let attributes = [
        ("QueueArn", state.registry.queue_arn(queue.name())),
        ("ApproximateNumberOfMessages", queue.pending_len().to_string()),
        (
            "ApproximateNumberOfMessagesNotVisible",
            queue.in_flight_len().to_string(),
        ),
        ("DelaySeconds", state.delay.as_secs().to_string()),
    ];
    Ok(xml::format_get_queue_attributes(&attributes, &request.request_id))
}

// === Responses ===

fn xml_response(status: StatusCode, body: String, request_id: &str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/xml"),
    );
    if let Ok(value) = header::HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-amzn-requestid", value);
    }
    response
}

fn error_response(err: AwsError) -> Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let request_id = err.request_id.clone();
    xml_response(status, err.to_xml(), &request_id)
}
