//! Stdio JSON-RPC host for the Model Context Protocol.
//!
//! Messages may arrive either `Content-Length` framed or as newline-delimited
//! JSON; each reply uses the framing of the message it answers. Requests run
//! on their own tasks and replies funnel through a single writer task, so
//! responses may be written in a different order than requests arrived.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    BufReader,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::registry::{InvocationResult, JSON_MIME_TYPE, Registry};
use crate::resources::error_payload;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "confluence-mcp";
const INSTRUCTIONS: &str = "Tools and resources for a Confluence Cloud or Datacenter instance. \
Read confluence://config first to check which deployment is configured. Page bodies use \
Confluence storage format (XHTML). Search tools accept CQL.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    ContentLength,
    Line,
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// One inbound message, or the text that failed to parse.
type Inbound = (Framing, Result<Value, String>);

async fn read_message<R>(reader: &mut R) -> Result<Option<Inbound>, io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if !in_headers {
            let body = trimmed.trim_start();
            if body.is_empty() {
                continue;
            }
            if body.starts_with('{') || body.starts_with('[') {
                let parsed = serde_json::from_str(body).map_err(|e| e.to_string());
                return Ok(Some((Framing::Line, parsed)));
            }
            in_headers = true;
        } else if trimmed.is_empty() {
            break;
        }

        if let Some((name, value)) = trimmed.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "Invalid Content-Length header")
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length header")
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let parsed = serde_json::from_slice(&payload).map_err(|e| e.to_string());
    Ok(Some((Framing::ContentLength, parsed)))
}

async fn write_message<W>(writer: &mut W, framing: Framing, value: &Value) -> Result<(), io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

/// Cancellation handle of one in-flight request. Ids are not trusted to be
/// unique, so each request also carries its own sequence number.
struct Ticket {
    key: String,
    seq: u64,
    token: CancellationToken,
}

type InFlight = HashMap<String, Vec<(u64, CancellationToken)>>;

fn ticket_token(ticket: Option<&Ticket>) -> CancellationToken {
    ticket.map_or_else(CancellationToken::new, |ticket| ticket.token.clone())
}

#[derive(Clone)]
pub struct McpServer {
    registry: Arc<Registry>,
    session_id: String,
    in_flight: Arc<Mutex<InFlight>>,
    next_seq: Arc<AtomicU64>,
}

impl McpServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            session_id: format!("stdio-{}", Uuid::now_v7()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn serve_stdio(self) -> Result<(), String> {
        self.serve(io::stdin(), io::stdout()).await
    }

    /// Serve until `reader` reaches EOF, then wait for in-flight requests to
    /// finish writing their replies.
    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<(), String>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!(
            event = "mcp_session_started",
            session_id = %self.session_id,
            tools = self.registry.list_operations().len(),
            resources = self.registry.list_resources().len(),
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<(Framing, Value)>();
        let writer_task = tokio::spawn(async move {
            while let Some((framing, message)) = rx.recv().await {
                write_message(&mut writer, framing, &message).await?;
            }
            Ok::<(), io::Error>(())
        });

        let mut reader = BufReader::new(reader);
        let read_result = loop {
            let (framing, parsed) = match read_message(&mut reader).await {
                Ok(Some(inbound)) => inbound,
                Ok(None) => break Ok(()),
                Err(err) => break Err(format!("Failed to read MCP message: {err}")),
            };
            let incoming = match parsed {
                Ok(incoming) => incoming,
                Err(err) => {
                    let response =
                        error_response(Value::Null, RpcError::parse_error(format!("Parse error: {err}")));
                    let _ = tx.send((framing, response));
                    continue;
                }
            };
            self.accept(incoming, framing, &tx);
        };

        drop(tx);
        let write_result = writer_task
            .await
            .map_err(|e| format!("MCP writer task failed: {e}"))?
            .map_err(|e| format!("Failed to write MCP response: {e}"));

        tracing::info!(event = "mcp_session_ended", session_id = %self.session_id);
        read_result.and(write_result)
    }

    /// Notifications are handled inline so a cancellation takes effect before
    /// the next message is read; requests are spawned.
    fn accept(&self, incoming: Value, framing: Framing, tx: &mpsc::UnboundedSender<(Framing, Value)>) {
        let is_request = incoming
            .as_object()
            .is_some_and(|obj| obj.contains_key("id") && obj.contains_key("method"));
        if incoming.is_object() && !is_request {
            if let Some(response) = self.handle_non_request(&incoming) {
                let _ = tx.send((framing, response));
            }
            return;
        }

        let tickets: Vec<Option<Ticket>> = match &incoming {
            Value::Array(items) => items.iter().map(|item| self.register(item)).collect(),
            single => vec![self.register(single)],
        };

        let server = self.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let reply = server.handle_incoming(incoming, &tickets).await;
            for ticket in tickets.iter().flatten() {
                server.release(ticket);
            }
            if let Some(reply) = reply {
                let _ = tx.send((framing, reply));
            }
        });
    }

    /// Record a cancellation token for a request that carries an id.
    fn register(&self, item: &Value) -> Option<Ticket> {
        let obj = item.as_object()?;
        if !obj.contains_key("method") {
            return None;
        }
        let ticket = Ticket {
            key: request_key(obj.get("id")?),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight
                .entry(ticket.key.clone())
                .or_default()
                .push((ticket.seq, ticket.token.clone()));
        }
        Some(ticket)
    }

    /// Drop only this request's entry; another request may share its id.
    fn release(&self, ticket: &Ticket) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        if let Some(entries) = in_flight.get_mut(&ticket.key) {
            entries.retain(|(seq, _)| *seq != ticket.seq);
            if entries.is_empty() {
                in_flight.remove(&ticket.key);
            }
        }
    }

    fn handle_non_request(&self, incoming: &Value) -> Option<Value> {
        match self.validate(incoming) {
            Err(response) => Some(response),
            Ok(None) => None,
            Ok(Some((method, params))) => {
                self.handle_notification(method, params);
                None
            }
        }
    }

    async fn handle_incoming(&self, incoming: Value, tickets: &[Option<Ticket>]) -> Option<Value> {
        let Some(batch) = incoming.as_array() else {
            let cancel = ticket_token(tickets.first().and_then(Option::as_ref));
            return self.handle_single(incoming, cancel).await;
        };
        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }
        let mut responses = Vec::new();
        for (index, item) in batch.iter().enumerate() {
            let cancel = ticket_token(tickets.get(index).and_then(Option::as_ref));
            if let Some(response) = self.handle_single(item.clone(), cancel).await {
                responses.push(response);
            }
        }
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    /// `Ok(None)` for messages without a method (client responses).
    fn validate<'a>(&self, incoming: &'a Value) -> Result<Option<(&'a str, Value)>, Value> {
        let Some(obj) = incoming.as_object() else {
            return Err(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };
        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Err(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }
        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Ok(None);
        };
        Ok(Some((method, obj.get("params").cloned().unwrap_or(Value::Null))))
    }

    async fn handle_single(&self, incoming: Value, cancel: CancellationToken) -> Option<Value> {
        let (method, params) = match self.validate(&incoming) {
            Err(response) => return Some(response),
            Ok(None) => return None,
            Ok(Some(parts)) => parts,
        };
        let Some(id) = incoming.get("id").cloned() else {
            self.handle_notification(method, params);
            return None;
        };
        Some(match self.handle_request(method, params, cancel).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    fn handle_notification(&self, method: &str, params: Value) {
        if method != "notifications/cancelled" {
            return;
        }
        let Some(request_id) = params.get("requestId") else {
            return;
        };
        let tokens: Vec<CancellationToken> = self
            .in_flight
            .lock()
            .ok()
            .and_then(|in_flight| in_flight.get(&request_key(request_id)).cloned())
            .map(|entries| entries.into_iter().map(|(_, token)| token).collect())
            .unwrap_or_default();
        if !tokens.is_empty() {
            tracing::info!(
                event = "mcp_request_cancelled",
                request_id = %request_id,
                requests = tokens.len(),
            );
        }
        for token in tokens {
            token.cancel();
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params, cancel).await,
            "resources/list" => Ok(self.resources_list_payload(false)),
            "resources/templates/list" => Ok(self.resources_list_payload(true)),
            "resources/read" => self.handle_resources_read(params, cancel).await,
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": INSTRUCTIONS
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .list_operations()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    fn resources_list_payload(&self, templated: bool) -> Value {
        let uri_key = if templated { "uriTemplate" } else { "uri" };
        let entries: Vec<Value> = self
            .registry
            .list_resources()
            .into_iter()
            .filter(|resource| resource.templated == templated)
            .map(|resource| {
                json!({
                    uri_key: resource.uri,
                    "name": resource.name,
                    "description": resource.description,
                    "mimeType": resource.mime_type,
                })
            })
            .collect();
        if templated {
            json!({ "resourceTemplates": entries })
        } else {
            json!({ "resources": entries })
        }
    }

    async fn handle_tools_call(
        &self,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;
        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let result = self.registry.invoke(name, &args, cancel).await;
        let is_error = !result.is_success();
        Ok(json!({
            "content": [{ "type": "text", "text": result.text() }],
            "isError": is_error
        }))
    }

    async fn handle_resources_read(
        &self,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("resources/read requires string field 'uri'"))?;

        let (mime_type, text) = match self.registry.resolve(uri, cancel).await {
            InvocationResult::Success { payload, mime_type } => (mime_type, payload),
            InvocationResult::Failure(failure) => {
                let mime_type = self
                    .registry
                    .resource_mime_type(uri)
                    .unwrap_or(JSON_MIME_TYPE)
                    .to_string();
                let text = error_payload(&mime_type, &failure.message);
                (mime_type, text)
            }
        };
        Ok(json!({
            "contents": [{ "uri": uri, "mimeType": mime_type, "text": text }]
        }))
    }
}
