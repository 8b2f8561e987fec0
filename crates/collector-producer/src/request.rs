//! Host-supplied view of a completed request and the field derivations.

use std::net::IpAddr;

/// Placeholder for an address or user agent that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// What the host knows about a request once its response is complete.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method as received.
    pub method: String,
    /// Administrative requests are never recorded.
    pub is_admin: bool,
    /// Path and query as received.
    pub request_uri: String,
    pub user_agent: Option<String>,
    /// `Client-IP` request header.
    pub client_ip_header: Option<String>,
    /// `X-Forwarded-For` request header, comma separated.
    pub forwarded_for: Option<String>,
    /// Address of the connected peer.
    pub peer_addr: Option<String>,
    /// Host session token, if the visitor has one.
    pub session_token: Option<String>,
    /// Response headers in the order they were sent.
    pub response_headers: Vec<(String, String)>,
}

impl RequestInfo {
    /// A non-administrative GET for `request_uri`.
    pub fn get(request_uri: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            request_uri: request_uri.into(),
            ..Default::default()
        }
    }

    /// First public address among `Client-IP`, `X-Forwarded-For` and the
    /// peer, in that order, or [`UNKNOWN`].
    pub fn client_ip(&self) -> String {
        [
            self.client_ip_header.as_deref(),
            self.forwarded_for.as_deref(),
            self.peer_addr.as_deref(),
        ]
        .into_iter()
        .flatten()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .find(|candidate| {
            candidate
                .parse::<IpAddr>()
                .map(|ip| is_public_ip(&ip))
                .unwrap_or(false)
        })
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Sanitized user agent, or [`UNKNOWN`] when the header was absent.
    pub fn user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) => sanitize_text(ua),
            None => UNKNOWN.to_string(),
        }
    }

    /// Value of the first `Content-Type` response header, trimmed.
    pub fn response_content_type(&self) -> String {
        self.response_headers
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default()
    }
}

/// Whether `ip` is outside the private and reserved ranges.
///
/// IPv4 excludes 10/8, 172.16/12, 192.168/16, 0/8, 127/8, 169.254/16 and
/// 240/4. IPv6 excludes ::, ::1, fc00::/7, fe80::/10 and IPv4-mapped
/// addresses.
pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let first = v4.octets()[0];
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || first == 0
                || first >= 240)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_unspecified()
                || v6.is_loopback()
                || (head & 0xfe00) == 0xfc00
                || (head & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some())
        }
    }
}

/// Make header text safe to store.
///
/// Drops `<script>` and `<style>` elements with their contents, strips the
/// remaining markup tags and percent-encoded octets, turns control
/// characters into spaces, collapses whitespace runs and trims.
pub fn sanitize_text(input: &str) -> String {
    let without_tags = strip_tags(&strip_script_and_style(input));
    let without_octets = strip_percent_octets(&without_tags);

    without_octets
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_script_and_style(input: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `input`
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some((start, name)) = next_raw_element(&lower, pos) {
        let end = lower[start..]
            .find('>')
            .map(|gt| start + gt + 1)
            .and_then(|body| {
                let close = format!("</{}>", name);
                lower[body..].find(&close).map(|at| body + at + close.len())
            });

        match end {
            Some(end) => {
                out.push_str(&input[pos..start]);
                pos = end;
            }
            None => {
                // Unclosed element, leave the opening tag to strip_tags
                out.push_str(&input[pos..=start]);
                pos = start + 1;
            }
        }
    }

    out.push_str(&input[pos..]);
    out
}

/// Earliest `<script` or `<style` at or after `from`.
fn next_raw_element(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    ["script", "style"]
        .into_iter()
        .filter_map(|name| {
            lower[from..]
                .find(&format!("<{}", name))
                .map(|at| (from + at, name))
        })
        .min_by_key(|(at, _)| *at)
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let opens_tag = c == '<'
            && chars.peek().is_some_and(|next| {
                next.is_ascii_alphabetic() || matches!(*next, '/' | '!' | '?')
            });

        if opens_tag {
            // Unterminated tags swallow the rest of the input
            for skipped in chars.by_ref() {
                if skipped == '>' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }

    out
}

fn strip_percent_octets(input: &str) -> String {
    let mut current = input.to_string();

    // Removing one octet can expose another, e.g. "%%4141"
    loop {
        let bytes = current.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        let mut removed = false;

        while i < bytes.len() {
            if bytes[i] == b'%'
                && i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit()
            {
                i += 3;
                removed = true;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }

        // Only ASCII bytes were removed, so the rest is still valid UTF-8
        current = String::from_utf8_lossy(&out).into_owned();
        if !removed {
            return current;
        }
    }
}

/// Join the site base URL with a request URI.
pub fn join_site_url(site_url: &str, request_uri: &str) -> String {
    let base = site_url.trim_end_matches('/');
    let path = request_uri.trim_start_matches('/');

    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
