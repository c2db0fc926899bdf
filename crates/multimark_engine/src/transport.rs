use engine_logging::engine_warn;

use crate::host::TabId;
use crate::protocol::{ErrorCode, MessageHandler, Request, Response};

/// Decodes a JSON request, dispatches it and encodes the reply.
///
/// Malformed payloads are answered with an `invalidRequest` error instead of
/// failing the channel.
pub fn handle_json<H: MessageHandler + ?Sized>(
    handler: &mut H,
    sender: Option<TabId>,
    payload: &str,
) -> String {
    let response = match serde_json::from_str::<Request>(payload) {
        Ok(request) => handler.handle(sender, request),
        Err(err) => {
            engine_warn!("rejecting malformed message: {err}");
            Response::error(ErrorCode::InvalidRequest, err.to_string())
        }
    };
    encode_response(&response)
}

pub fn encode_response(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|err| {
        format!(r#"{{"status":"error","code":"invalidRequest","message":"{err}"}}"#)
    })
}
