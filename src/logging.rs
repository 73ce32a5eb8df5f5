use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

/// Response header echoing the request ID, so clients can quote it in bug reports.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A unique identifier for a particular request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID. This wraps around back to zero if you somehow exceed a usize.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allow the ID to be accessed via request guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// A rocket fairing that logs every request and response, tagging both with
/// the request's ID.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Civix API listening on {protocol}://{ip}:{port}/api");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        info!("->req{id} {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        res.set_header(Header::new(REQUEST_ID_HEADER, id.to_string()));

        let code = res.status();
        let route = match req.route() {
            Some(r) => match r.name {
                Some(ref name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            },
            None => "UNKNOWN ROUTE".to_string(),
        };
        let log_msg = format!("<-rsp{id} {code} {route}");
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}
