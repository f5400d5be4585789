pub mod events;
mod msg;
mod ws;

pub use events::{ClientEvent, MessagePayload, ServerEvent};
pub use msg::{MAX_MESSAGE_LEN, handle_send};
pub use ws::disconnect;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::chat_ws))
}
