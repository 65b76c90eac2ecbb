//! Stub resolver protocol
//!
//! The stub executable replaces the host application's resolver binary. It
//! understands just enough of the host's argument conventions to find the
//! target URL and two capability hints, then forwards everything to the
//! daemon as a single loopback query. Parsing lives here in the library so
//! it stays unit-testable; the network side is in `bin/ytdlp_stub.rs`.

use std::fmt;

use url::form_urlencoded;

use crate::errors::StubError;

/// Which host application invoked the stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubSource {
    VrChat,
    Resonite,
}

impl StubSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StubSource::VrChat => "vrchat",
            StubSource::Resonite => "resonite",
        }
    }
}

impl fmt::Display for StubSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed stub invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubInvocation {
    /// Target video URL
    pub url: String,
    /// AVPro playback requested (selects webm on the daemon side)
    pub avpro: bool,
    /// Invoking host application
    pub source: StubSource,
}

/// Parse the host's resolver arguments
///
/// The first argument starting with `http` (case-insensitive) is the URL.
/// A `[protocol^=http]` format filter anywhere marks a non-AVPro player;
/// a bare `-J` marks a Resonite invocation.
pub fn parse_args<I, S>(args: I) -> Result<StubInvocation, StubError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = None;
    let mut avpro = true;
    let mut source = StubSource::VrChat;

    for arg in args {
        let arg = arg.as_ref();

        if arg.contains("[protocol^=http]") {
            avpro = false;
            continue;
        }

        if arg == "-J" {
            source = StubSource::Resonite;
            continue;
        }

        if url.is_none()
            && arg
                .get(..4)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
        {
            url = Some(arg.to_string());
        }
    }

    match url {
        Some(url) => Ok(StubInvocation { url, avpro, source }),
        None => Err(StubError::NoUrl),
    }
}

/// Build the daemon request URL for an invocation
pub fn request_url(server_base: &str, invocation: &StubInvocation) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", &invocation.url)
        .append_pair("avpro", if invocation.avpro { "true" } else { "false" })
        .append_pair("source", invocation.source.as_str())
        .finish();

    format!(
        "{}/api/getvideo?{}",
        server_base.trim_end_matches('/'),
        query
    )
}
