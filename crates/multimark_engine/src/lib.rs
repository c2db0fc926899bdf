//! Multimark engine: page DOM and highlighting, the message protocol, and the
//! contexts that exchange it (document engine, background, simulated browser,
//! injection coordinator).
mod background;
mod browser;
mod coordinator;
mod decode;
mod engine;
mod highlight;
mod host;
mod log_store;
mod page;
mod persist;
mod protocol;
mod runtime;
mod session;
mod transport;

pub use background::{Background, BackgroundHandle, BackgroundLink, Command, CommandOutcome};
pub use browser::{BrowserSettings, SimulatedBrowser};
pub use coordinator::{CoordinatorError, CoordinatorSettings, InjectionCoordinator};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use engine::{Clock, DocumentEngine, EngineConfig};
pub use highlight::{HighlightId, LiteralMatcher, ScanError};
pub use host::{HostError, TabHost, TabId, TabInfo};
pub use log_store::{
    FileStorage, LogStore, LogStoreSettings, MemoryStorage, SearchLogEntry, StorageArea,
    StorageError,
};
pub use page::{
    LivePage, Marker, PageDocument, PageElement, PageError, PageNode, CURRENT_CLASS,
    HIGHLIGHT_CLASS,
};
pub use persist::{ensure_storage_dir, DocumentDir, PersistError};
pub use protocol::{
    ClearScope, ErrorCode, ErrorReply, ErrorTag, MessageHandler, NavigateReply, ProtocolError,
    Request, Response, SearchReply, Status, StatusReply, TermsReply,
};
pub use runtime::EngineHandle;
pub use transport::{encode_response, handle_json};
