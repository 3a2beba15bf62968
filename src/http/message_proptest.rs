//! Property-based tests for the raw message codec

#[cfg(test)]
mod tests {
    use crate::http::message::*;
    use proptest::prelude::*;

    fn header_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9-]{0,20}"
    }

    fn header_value() -> impl Strategy<Value = String> {
        "[!-~]([ -~]{0,30}[!-~])?"
    }

    fn path() -> impl Strategy<Value = String> {
        "(/[a-z0-9._-]{1,10}){1,4}"
    }

    prop_compose! {
        fn canonical_request()(
            method in prop_oneof![Just("GET"), Just("POST"), Just("PUT"), Just("DELETE")],
            path in path(),
            headers in prop::collection::vec((header_name(), header_value()), 0..8),
            body in prop::collection::vec(any::<u8>(), 0..64),
        ) -> Vec<u8> {
            let mut out = format!("{method} {path} HTTP/1.1\r\n").into_bytes();
            for (name, value) in headers {
                out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&body);
            out
        }
    }

    proptest! {
        #[test]
        fn test_canonical_bytes_round_trip(bytes in canonical_request()) {
            let message = RawMessage::from_bytes(&bytes).unwrap();
            prop_assert_eq!(message.to_bytes(), bytes);
        }

        #[test]
        fn test_header_order_is_preserved(
            headers in prop::collection::vec((header_name(), header_value()), 1..8),
        ) {
            let mut text = String::from("GET / HTTP/1.1\r\n");
            for (name, value) in &headers {
                text.push_str(&format!("{name}: {value}\r\n"));
            }
            let message = RawMessage::parse_request_text(&text).unwrap();
            let parsed: Vec<(String, String)> = message
                .headers()
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect();
            prop_assert_eq!(parsed, headers);
        }

        #[test]
        fn test_lf_and_crlf_text_parse_alike(
            path in path(),
            headers in prop::collection::vec((header_name(), header_value()), 0..5),
        ) {
            let mut lf = format!("GET {path} HTTP/1.1\n");
            let mut crlf = format!("GET {path} HTTP/1.1\r\n");
            for (name, value) in &headers {
                lf.push_str(&format!("{name}: {value}\n"));
                crlf.push_str(&format!("{name}: {value}\r\n"));
            }
            let a = RawMessage::parse_request_text(&lf).unwrap();
            let b = RawMessage::parse_request_text(&crlf).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
