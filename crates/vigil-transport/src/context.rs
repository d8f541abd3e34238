//! Per-connection request context captured at upgrade time.
//!
//! The context is the only thing the authorization layer gets to look
//! at: headers, cookies, and query parameters from the HTTP request that
//! opened the push connection. It is owned by the connection, lent out
//! by reference, and never cloned, so it cannot be cached and replayed
//! against a later connection.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Read-only credential material attached to one connection attempt.
#[derive(Debug, Default)]
pub struct ConnectionContext {
    remote_addr: Option<SocketAddr>,
    /// Header names are stored lower-cased.
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
}

impl ConnectionContext {
    /// Builds a context from raw request parts.
    ///
    /// Repeated headers keep the last value, except `cookie`, whose
    /// values are joined with `"; "` the way HTTP/2 splits them.
    pub fn new<I, K, V>(
        remote_addr: Option<SocketAddr>,
        headers: I,
        query: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map: HashMap<String, String> = HashMap::new();
        for (name, value) in headers {
            let name = name.as_ref().to_ascii_lowercase();
            let value = value.into();
            if name == "cookie" {
                if let Some(existing) = map.get_mut(&name) {
                    existing.push_str("; ");
                    existing.push_str(&value);
                    continue;
                }
            }
            map.insert(name, value);
        }

        Self {
            remote_addr,
            headers: map,
            query: query.map(parse_query).unwrap_or_default(),
        }
    }

    /// Address of the remote peer, if the transport knows it.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a cookie by exact name in the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// Returns the token of an `Authorization: Bearer <token>` header.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
            Some(token.trim())
        } else {
            None
        }
    }

    /// Looks up a query-string parameter of the upgrade request.
    ///
    /// Browser WebSocket clients cannot set headers, so tokens are
    /// commonly passed this way.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Undoes percent-encoding. A component that does not decode to UTF-8 is
/// kept as sent.
fn percent_decode(component: &str) -> String {
    urlencoding::decode(component)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| component.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(headers: &[(&str, &str)], query: Option<&str>) -> ConnectionContext {
        ConnectionContext::new(
            None,
            headers.iter().map(|(k, v)| (*k, v.to_string())),
            query,
        )
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let c = ctx(&[("X-Forwarded-For", "10.0.0.1")], None);
        assert_eq!(c.header("x-forwarded-for"), Some("10.0.0.1"));
        assert_eq!(c.header("X-FORWARDED-FOR"), Some("10.0.0.1"));
    }

    #[test]
    fn test_cookie_finds_named_pair() {
        let c = ctx(&[("Cookie", "lang=en; GZCTF_Token=abc123; theme=dark")], None);
        assert_eq!(c.cookie("GZCTF_Token"), Some("abc123"));
        assert_eq!(c.cookie("lang"), Some("en"));
        assert_eq!(c.cookie("missing"), None);
    }

    #[test]
    fn test_cookie_headers_are_merged() {
        let c = ctx(&[("cookie", "a=1"), ("cookie", "b=2")], None);
        assert_eq!(c.cookie("a"), Some("1"));
        assert_eq!(c.cookie("b"), Some("2"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            ctx(&[("Authorization", "Bearer tok")], None).bearer_token(),
            Some("tok")
        );
        assert_eq!(
            ctx(&[("Authorization", "bearer tok")], None).bearer_token(),
            Some("tok")
        );
        assert_eq!(
            ctx(&[("Authorization", "Basic dXNlcg==")], None).bearer_token(),
            None
        );
        assert_eq!(ctx(&[("Authorization", "Bearer ")], None).bearer_token(), None);
        assert_eq!(ctx(&[], None).bearer_token(), None);
    }

    #[test]
    fn test_query_parameters() {
        let c = ctx(&[], Some("id=7&access_token=xyz&flag"));
        assert_eq!(c.query("access_token"), Some("xyz"));
        assert_eq!(c.query("flag"), Some(""));
        assert_eq!(c.query("nope"), None);
    }

    #[test]
    fn test_query_parameters_are_percent_decoded() {
        let c = ctx(&[], Some("access_token=ab%2Fc%2Bd%3D%3D&re%74urn=%2Fadmin"));
        assert_eq!(c.query("access_token"), Some("ab/c+d=="));
        assert_eq!(c.query("return"), Some("/admin"));
    }

    #[test]
    fn test_literal_plus_in_query_is_kept() {
        let c = ctx(&[], Some("access_token=ab+cd"));
        assert_eq!(c.query("access_token"), Some("ab+cd"));
    }

    #[test]
    fn test_undecodable_query_value_is_kept_raw() {
        let c = ctx(&[], Some("access_token=%FF%FE"));
        assert_eq!(c.query("access_token"), Some("%FF%FE"));
    }
}
