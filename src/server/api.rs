//! Lead API server.

use hyper::body::Incoming;
use hyper::{Method, Request, Response};

use super::{Body, Handler, json_response, read_body};
use crate::leads::service::{ApiReply, ApiResponse, INVALID_FORM, LeadService};

pub const ROUTE_LEAD: &str = "/api/submit-lead";
pub const ROUTE_BOOKING: &str = "/api/submit-booking";
pub const ROUTE_CREDIT: &str = "/api/submit-credit-application";

/// Serves the three submission routes.
#[derive(Debug, Clone)]
pub struct ApiServer {
    service: LeadService,
}

impl ApiServer {
    #[must_use]
    pub const fn new(service: LeadService) -> Self {
        Self { service }
    }

    /// Route a decoded request.
    pub async fn dispatch(&self, method: &Method, path: &str, body: &[u8]) -> ApiReply {
        match (path, method) {
            (ROUTE_LEAD, &Method::POST) => self.service.submit_lead(body).await,
            (ROUTE_BOOKING, &Method::POST) => self.service.submit_booking(body).await,
            (ROUTE_CREDIT, &Method::POST) => self.service.submit_credit_application(body).await,
            (ROUTE_CREDIT, &Method::GET) => self.service.credit_status(),
            (ROUTE_LEAD | ROUTE_BOOKING | ROUTE_CREDIT, _) => {
                ApiReply::new(405, ApiResponse::failed("Method not allowed"))
            }
            _ => ApiReply::new(404, ApiResponse::failed("Not found")),
        }
    }
}

impl Handler for ApiServer {
    async fn handle(&self, request: Request<Incoming>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let reply = match read_body(body).await {
            Ok(body) => self.dispatch(&parts.method, &path, &body).await,
            Err(e) => {
                tracing::warn!(%path, error = %e, "Unreadable request body");
                ApiReply::new(400, ApiResponse::failed(INVALID_FORM))
            }
        };

        tracing::info!(method = %parts.method, %path, status = reply.status, "API request");
        let mut response = json_response(reply.status, &reply.body);
        if reply.status == 405 {
            let allow = if path == ROUTE_CREDIT { "GET, POST" } else { "POST" };
            response
                .headers_mut()
                .insert(hyper::header::ALLOW, hyper::header::HeaderValue::from_static(allow));
        }
        response
    }
}
