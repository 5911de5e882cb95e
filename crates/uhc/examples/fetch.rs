//! Fetch a URL and print what the operation handlers receive.
//!
//! Run with: cargo run -p uhc --example fetch -- <url> [--stream]
//!
//! Set `RUST_LOG=uhc=debug` to see dispatcher traces, including hex dumps of body parts.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use uhc::{ReqwestUhc, Uhc, UhcConfig};

#[tokio::main]
async fn main() -> uhc::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: fetch <url> [--stream]");
        return Ok(());
    };
    let stream = args.any(|arg| arg == "--stream");

    let uhc = ReqwestUhc::with_config(UhcConfig::default().request_timeout(Duration::from_secs(15)))?;
    let (done_tx, done_rx) = oneshot::channel();

    uhc.execute_with(move |b| {
        let b = b
            .get()
            .path(url)
            .on_non_success(|response, body| {
                println!("HTTP {}: {}", response.status(), String::from_utf8_lossy(&body));
            })
            .on_error(|error| eprintln!("request failed: {error}"))
            .on_finally(move || {
                let _ = done_tx.send(());
            });

        if stream {
            b.on_200_streaming(|response| {
                println!("HTTP {} ({:?})", response.status(), response.content_type());
                let mut total = 0usize;
                move |chunk: &[u8]| {
                    if chunk.is_empty() {
                        println!("-- end of stream, {total} bytes");
                    } else {
                        total += chunk.len();
                        println!("-- chunk of {} bytes", chunk.len());
                    }
                }
            })
        } else {
            b.on_200_buffered(|response, body| {
                println!("HTTP {} ({} bytes)", response.status(), body.len());
                println!("{}", String::from_utf8_lossy(&body));
            })
        }
    })?;

    let _ = done_rx.await;
    Ok(())
}
