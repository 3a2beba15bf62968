//! The fixed requests and responses the fixture server and the scenarios use

use crate::error::Result;
use crate::http::RawMessage;

/// The only path the fixture answers with a success response
pub const SUCCESS_PATH: &str = "/saysomething";

pub const SUCCESS_HTTP_REQUEST: &str = "GET /saysomething HTTP/1.1\r\n\
                                        Host: localhost:8083\r\n\
                                        Accept: */*\r\n\
                                        User-Agent: RawHTTP";

pub const NOT_FOUND_HTTP_REQUEST: &str = "GET /does/not/exist HTTP/1.1\r\n\
                                          Host: localhost:8083\r\n\
                                          Accept: */*\r\n\
                                          User-Agent: RawHTTP";

pub const SUCCESS_HTTP_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
                                         Content-Type: text/plain\r\n\
                                         Content-Length: 9\r\n\
                                         \r\n\
                                         something";

pub const NOT_FOUND_HTTP_RESPONSE: &str = "HTTP/1.1 404 Not Found\r\n\
                                           Content-Type: text/plain\r\n\
                                           Content-Length: 18\r\n\
                                           \r\n\
                                           Resource Not Found";

/// What a CLI that logs its request prints between the request and the
/// response: the blank line ending the request, then a newline.
pub const LOGGED_REQUEST_SEPARATOR: &str = "\r\n\r\n\n";

/// The request text of the canned requests, aimed at another authority
pub fn request_for(path: &str, authority: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: {authority}\r\nAccept: */*\r\nUser-Agent: RawHTTP")
}

/// Expected output of a CLI that logs `request` before printing `response`
pub fn logged_exchange(request: &str, response: &str) -> String {
    format!("{request}{LOGGED_REQUEST_SEPARATOR}{response}")
}

/// One literal path mapped to one canned response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureRoute {
    pub path: String,
    pub response: RawMessage,
}

/// The success route plus the catch-all not-found response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureRoutes {
    success: FixtureRoute,
    not_found: RawMessage,
}

impl FixtureRoutes {
    pub fn new(success: FixtureRoute, not_found: RawMessage) -> Self {
        Self { success, not_found }
    }

    /// `/saysomething` answered with `something`, everything else with a 404
    pub fn standard() -> Result<Self> {
        Ok(Self::new(
            FixtureRoute {
                path: SUCCESS_PATH.to_string(),
                response: RawMessage::parse_response_text(SUCCESS_HTTP_RESPONSE)?,
            },
            RawMessage::parse_response_text(NOT_FOUND_HTTP_RESPONSE)?,
        ))
    }

    /// Exact path match; anything else gets the not-found response
    pub fn route(&self, path: &str) -> &RawMessage {
        if path == self.success.path {
            &self.success.response
        } else {
            &self.not_found
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_responses_round_trip() {
        let routes = FixtureRoutes::standard().unwrap();
        assert_eq!(
            routes.route(SUCCESS_PATH).to_bytes(),
            SUCCESS_HTTP_RESPONSE.as_bytes()
        );
        assert_eq!(
            routes.route("/does/not/exist").to_bytes(),
            NOT_FOUND_HTTP_RESPONSE.as_bytes()
        );
    }

    #[test]
    fn test_routing_is_exact() {
        let routes = FixtureRoutes::standard().unwrap();
        assert_eq!(routes.route("/saysomething/").status_code(), Some(404));
        assert_eq!(routes.route("/SAYSOMETHING").status_code(), Some(404));
        assert_eq!(routes.route("").status_code(), Some(404));
        assert_eq!(routes.route("/saysomething").status_code(), Some(200));
    }

    #[test]
    fn test_request_for_matches_the_canned_shape() {
        assert_eq!(
            request_for("/saysomething", "localhost:8083"),
            SUCCESS_HTTP_REQUEST
        );
        assert_eq!(
            request_for("/does/not/exist", "localhost:8083"),
            NOT_FOUND_HTTP_REQUEST
        );
    }

    #[test]
    fn test_logged_exchange_separator_is_exact() {
        assert_eq!(logged_exchange("REQ", "RES"), "REQ\r\n\r\n\nRES");
    }
}
