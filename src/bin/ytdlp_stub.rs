//! ytdlp-stub: replacement resolver executable
//!
//! Installed in place of the host application's resolver binary. Forwards
//! the invocation to the local caching daemon and prints the daemon's reply
//! on stdout. The host treats the stub exactly like a normal resolver run:
//! stdout carries nothing but the server's body, and the process exits
//! quickly with no retries.

use std::process::ExitCode;

use vrc_video_cacher::app::stub::{parse_args, request_url};
use vrc_video_cacher::constants::server::DEFAULT_PORT;
use vrc_video_cacher::errors::StubError;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args).await {
        Ok(body) => {
            // An empty body means bypass; print nothing, not even a newline
            if !body.is_empty() {
                println!("{body}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<String, StubError> {
    let invocation = parse_args(args)?;
    let url = request_url(&format!("http://127.0.0.1:{DEFAULT_PORT}"), &invocation);

    let response = reqwest::get(&url).await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(StubError::ServerError {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
