//! Messages exchanged between the query surface, the document engine and the
//! background. Requests are tagged by `action`; replies are plain objects whose
//! shape depends on the action.

use multimark_core::{Direction, SearchResult, TermView, ThemeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::TabId;
use crate::log_store::SearchLogEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Ping,
    Search {
        query: String,
        #[serde(default)]
        persist: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        theme: Option<ThemeId>,
    },
    Navigate {
        direction: Direction,
    },
    GetSearchTerms,
    RemoveSearchTerm {
        index: usize,
    },
    ClearHighlights {
        scope: ClearScope,
    },
    #[serde(rename_all = "camelCase")]
    LogSearch {
        search_log: SearchLogEntry,
    },
    ContentScriptLoaded,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Search { .. } => "search",
            Request::Navigate { .. } => "navigate",
            Request::GetSearchTerms => "getSearchTerms",
            Request::RemoveSearchTerm { .. } => "removeSearchTerm",
            Request::ClearHighlights { .. } => "clearHighlights",
            Request::LogSearch { .. } => "logSearch",
            Request::ContentScriptLoaded => "contentScriptLoaded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    Transient,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReply {
    pub match_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_match: Option<usize>,
    pub search_limit_reached: bool,
}

impl SearchReply {
    pub fn limit_reached() -> Self {
        Self {
            match_count: 0,
            current_match: None,
            search_limit_reached: true,
        }
    }

    pub fn into_result(self) -> SearchResult {
        SearchResult {
            match_count: self.match_count,
            current_match: self.current_match.unwrap_or(0),
            limit_reached: self.search_limit_reached,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateReply {
    pub match_count: usize,
    pub current_match: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsReply {
    pub terms: Vec<TermView>,
    /// Theme the engine hands to the next persistent commit.
    pub next_theme: ThemeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Ok,
    Acknowledged,
    Logged,
    Removed,
    NotFound,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// The receiving context does not handle this action.
    UnsupportedAction,
    InvalidRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorTag {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: ErrorTag,
    pub code: ErrorCode,
    pub message: String,
}

/// Reply to a [`Request`]. Untagged on the wire: variants are told apart by
/// their fields, so the declaration order matters for decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Search(SearchReply),
    Navigate(NavigateReply),
    Terms(TermsReply),
    Error(ErrorReply),
    Status(StatusReply),
}

impl Response {
    pub fn status(status: Status) -> Self {
        Response::Status(StatusReply { status })
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error(ErrorReply {
            status: ErrorTag::Error,
            code,
            message: message.into(),
        })
    }

    pub fn unsupported(request: &Request) -> Self {
        Self::error(
            ErrorCode::UnsupportedAction,
            format!("action `{}` is not handled here", request.action()),
        )
    }

    pub fn into_search(self) -> Result<SearchReply, ProtocolError> {
        match self {
            Response::Search(reply) => Ok(reply),
            other => Err(ProtocolError::unexpected("search", other)),
        }
    }

    pub fn into_navigate(self) -> Result<NavigateReply, ProtocolError> {
        match self {
            Response::Navigate(reply) => Ok(reply),
            other => Err(ProtocolError::unexpected("navigate", other)),
        }
    }

    pub fn into_terms(self) -> Result<TermsReply, ProtocolError> {
        match self {
            Response::Terms(reply) => Ok(reply),
            other => Err(ProtocolError::unexpected("terms", other)),
        }
    }

    pub fn into_status(self) -> Result<Status, ProtocolError> {
        match self {
            Response::Status(reply) => Ok(reply.status),
            other => Err(ProtocolError::unexpected("status", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("remote rejected the request ({code:?}): {message}")]
    Remote { code: ErrorCode, message: String },
    #[error("expected a {expected} reply, got {found}")]
    UnexpectedResponse {
        expected: &'static str,
        found: String,
    },
}

impl ProtocolError {
    fn unexpected(expected: &'static str, response: Response) -> Self {
        match response {
            Response::Error(reply) => ProtocolError::Remote {
                code: reply.code,
                message: reply.message,
            },
            other => ProtocolError::UnexpectedResponse {
                expected,
                found: format!("{other:?}"),
            },
        }
    }
}

/// A context that answers requests. `sender` is the tab the request came
/// from, when it came from a page.
pub trait MessageHandler {
    fn handle(&mut self, sender: Option<TabId>, request: Request) -> Response;
}
