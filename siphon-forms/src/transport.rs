//! Transport classification for captured submissions.
//!
//! Applied in order: server action, GraphQL, JSON-RPC, then REST as the
//! catch-all. WebSocket detection is separate and only reachable when
//! frames were captured.

use crate::capture::{CapturedRequest, CapturedWsFrame};
use crate::pattern::{
    FormTransport, GraphqlDescriptor, JsonRpcDescriptor, ServerActionDescriptor, ServerActionKind,
    WebsocketDescriptor, WsProtocol,
};
use once_cell::sync::Lazy;
use regex::Regex;
use siphon_common::util::{to_camel_case, to_snake_case};
use url::Url;

static MUTATION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"mutation\s+(\w+)").unwrap());

/// Event-name fragments that suggest a submission.
const SUBMIT_EVENT_HINTS: &[&str] = &["submit", "create", "update", "send"];

/// Classification of one captured request.
#[derive(Debug, Clone)]
pub struct TransportDetection {
    pub transport: FormTransport,
    pub server_action: Option<ServerActionDescriptor>,
    pub graphql: Option<GraphqlDescriptor>,
    pub json_rpc: Option<JsonRpcDescriptor>,
}

impl TransportDetection {
    fn rest() -> Self {
        Self {
            transport: FormTransport::Rest,
            server_action: None,
            graphql: None,
            json_rpc: None,
        }
    }
}

/// Classify the transport of a captured mutation request.
pub fn detect_transport(page_url: &str, request: &CapturedRequest) -> TransportDetection {
    if let Some(server_action) = detect_server_action(page_url, request) {
        return TransportDetection {
            transport: FormTransport::ServerAction,
            server_action: Some(server_action),
            graphql: None,
            json_rpc: None,
        };
    }

    if let Some(graphql) = detect_graphql(request) {
        return TransportDetection {
            transport: FormTransport::Graphql,
            server_action: None,
            graphql: Some(graphql),
            json_rpc: None,
        };
    }

    if let Some(json_rpc) = detect_json_rpc(request) {
        return TransportDetection {
            transport: FormTransport::JsonRpc,
            server_action: None,
            graphql: None,
            json_rpc: Some(json_rpc),
        };
    }

    TransportDetection::rest()
}

fn detect_server_action(page_url: &str, request: &CapturedRequest) -> Option<ServerActionDescriptor> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return None;
    }

    // Next.js marks server actions with a dedicated header
    if let Some(action_id) = request.header("next-action") {
        return Some(ServerActionDescriptor {
            kind: ServerActionKind::NextJs,
            action_id: Some(action_id.to_string()),
        });
    }

    let same_route = same_path(page_url, &request.url);

    // Remix posts back to the route with an `_action` discriminator
    if same_route {
        if let Some(pairs) = request.body_form_pairs() {
            if let Some((_, action)) = pairs.iter().find(|(k, _)| k == "_action") {
                return Some(ServerActionDescriptor {
                    kind: ServerActionKind::Remix,
                    action_id: Some(action.clone()),
                });
            }
        }

        // Same-route form POST without a discriminator: still Remix-shaped
        if request
            .content_type()
            .is_some_and(|ct| ct.contains("form-urlencoded") || ct.contains("multipart"))
        {
            return Some(ServerActionDescriptor {
                kind: ServerActionKind::Remix,
                action_id: None,
            });
        }
    }

    None
}

fn same_path(page_url: &str, request_url: &str) -> bool {
    let (Ok(page), Ok(request)) = (Url::parse(page_url), Url::parse(request_url)) else {
        return false;
    };
    page.host_str() == request.host_str()
        && page.path().trim_end_matches('/') == request.path().trim_end_matches('/')
}

fn detect_graphql(request: &CapturedRequest) -> Option<GraphqlDescriptor> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return None;
    }
    let url_lower = request.url.to_lowercase();
    if !(url_lower.contains("graphql") || url_lower.contains("gql") || url_lower.contains("query"))
    {
        return None;
    }

    let body = request.body_json()?;
    let query = body.get("query")?.as_str()?;
    if !query.trim_start().starts_with("mutation") {
        return None;
    }

    let mutation_name = MUTATION_NAME
        .captures(query)
        .map(|captures| captures[1].to_string());

    Some(GraphqlDescriptor {
        mutation_name,
        query: query.to_string(),
    })
}

fn detect_json_rpc(request: &CapturedRequest) -> Option<JsonRpcDescriptor> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return None;
    }
    if !request.content_type()?.contains("json") {
        return None;
    }

    let body = request.body_json()?;
    let method = body.get("method")?.as_str()?;
    let version2 = body.get("jsonrpc").and_then(|v| v.as_str()) == Some("2.0");

    Some(JsonRpcDescriptor {
        method: method.to_string(),
        version2,
    })
}

/// Pick the WebSocket frame carrying the submission, scoring sent frames
/// by form-field overlap and submit-like event names.
pub fn detect_ws_submission(
    frames: &[&CapturedWsFrame],
    field_names: &[String],
) -> Option<WebsocketDescriptor> {
    let mut best: Option<(usize, &CapturedWsFrame)> = None;

    for frame in frames {
        let score = score_frame(frame, field_names);
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, frame));
        }
    }

    let (_, frame) = best?;
    let protocol = infer_protocol(frame);
    let event = infer_event(frame, protocol);

    Some(WebsocketDescriptor {
        url: frame.url.clone(),
        protocol,
        event,
        payload_template: frame.payload.clone(),
    })
}

fn score_frame(frame: &CapturedWsFrame, field_names: &[String]) -> usize {
    let mut score = 0;

    for name in field_names {
        let camel = to_camel_case(name);
        let snake = to_snake_case(name);
        let quoted = |n: &str| format!("\"{n}\"");
        if frame.payload.contains(&quoted(name))
            || frame.payload.contains(&quoted(&camel))
            || frame.payload.contains(&quoted(&snake))
        {
            score += 2;
        }
    }

    let lower = frame.payload.to_lowercase();
    if SUBMIT_EVENT_HINTS.iter().any(|hint| lower.contains(hint)) {
        score += 1;
    }

    score
}

fn infer_protocol(frame: &CapturedWsFrame) -> WsProtocol {
    let url = frame.url.to_lowercase();
    if url.contains("socket.io") {
        return WsProtocol::SocketIo;
    }
    if url.contains("sockjs") {
        return WsProtocol::Sockjs;
    }
    // Socket.IO event frames start with the "42" message type, or carry
    // an explicit event key
    if frame.payload.starts_with("42") || frame.payload.contains("\"event\"") {
        return WsProtocol::SocketIo;
    }
    WsProtocol::Raw
}

fn infer_event(frame: &CapturedWsFrame, protocol: WsProtocol) -> Option<String> {
    if protocol != WsProtocol::SocketIo {
        return None;
    }

    // 42["eventName", {...}]
    if let Some(stripped) = frame.payload.strip_prefix("42") {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(stripped) {
            if let Some(serde_json::Value::String(event)) = items.first() {
                return Some(event.clone());
            }
        }
    }

    serde_json::from_str::<serde_json::Value>(&frame.payload)
        .ok()?
        .get("event")?
        .as_str()
        .map(String::from)
}
