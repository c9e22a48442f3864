mod list;
mod new;
mod room;
mod ws;

pub mod log;
pub mod members;
pub mod msg;
pub mod reconcile;
pub mod session;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use log::list_messages;
pub use members::{find_or_create_room, get_peer, list_rooms, RoomSummary};
pub use msg::send_msg;
pub use reconcile::{ClientMessageView, Delivery, RoomView, ViewEvent};
pub use session::{RoomSession, SubscriberState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::rooms))
        .route("/with/{profile_id}", post(new::message_profile))
        .route("/{room_id}", get(room::room).post(room::send))
        .route("/{room_id}/ws", get(ws::room_ws))
}
