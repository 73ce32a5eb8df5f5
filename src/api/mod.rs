use rocket::{http::Status, response::status::Custom, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod admin_logs;
mod auth;
mod feedback;
mod petitions;
mod polls;
mod settings;
mod signatures;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(users::routes());
    routes.extend(petitions::routes());
    routes.extend(polls::routes());
    routes.extend(feedback::routes());
    routes.extend(settings::routes());
    routes.extend(admin_logs::routes());
    routes.extend(signatures::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_error]
}

/// Render failures that never reached a handler (guards, unmatched routes,
/// malformed bodies) in the same JSON shape as handler errors.
#[catch(default)]
fn json_error(status: Status, _req: &Request<'_>) -> Custom<Json<ErrorBody>> {
    let message = match status.code {
        401 => "Authentication required",
        403 => "You do not have permission to do that",
        _ => status.reason().unwrap_or("Unknown error"),
    };
    Custom(
        status,
        Json(ErrorBody {
            status: status.code,
            message: message.to_string(),
        }),
    )
}
