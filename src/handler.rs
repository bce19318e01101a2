// HTTP handler bindings for the arena transport
//
// Thin wrappers that bind Rocket routes to the GameServer. Handlers are
// responsible for:
// - Extracting the GameServer from Rocket's managed state
// - Turning connection ids and raw bodies into server calls
// - Streaming outbound events as server-sent events

use rocket::http::Status;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use bomb_arena::server::{ConnectionId, GameServer};

/// GET / endpoint
/// Returns server metadata
#[get("/")]
pub fn index(server: &State<GameServer>) -> Json<Value> {
    Json(json!({
        "name": "bomb-arena",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": server.room_count(),
        "connections": server.connection_count(),
    }))
}

/// POST /connect endpoint
/// Opens a connection; the id addresses every other endpoint
#[post("/connect")]
pub fn connect(server: &State<GameServer>) -> Json<Value> {
    let id = server.connect();
    Json(json!({ "connectionId": id }))
}

/// GET /events/<id> endpoint
/// Server-sent event stream of everything addressed to the connection.
/// Can be opened once per connection; closing it closes the connection.
#[get("/events/<id>")]
pub fn events(server: &State<GameServer>, id: ConnectionId) -> Option<EventStream![]> {
    let mut feed = server.take_events(id)?;
    Some(EventStream! {
        while let Some(event) = feed.recv().await {
            yield Event::json(&event).event(event.kind());
        }
    })
}

/// POST /command/<id> endpoint
/// Body is one raw JSON command
#[post("/command/<id>", data = "<body>")]
pub async fn command(server: &State<GameServer>, id: ConnectionId, body: String) -> Status {
    if server.dispatch(id, &body).await {
        Status::Accepted
    } else {
        Status::NotFound
    }
}

/// DELETE /connect/<id> endpoint
/// Closes the connection and frees its seat
#[delete("/connect/<id>")]
pub fn disconnect(server: &State<GameServer>, id: ConnectionId) -> Status {
    if server.disconnect(id) {
        Status::NoContent
    } else {
        Status::NotFound
    }
}
