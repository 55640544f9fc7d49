//! Streams a live SSE endpoint in desktop-native mode.
//!
//! Gated on `WORDPOP_SSE_URL`; without it the example prints a hint and
//! exits. Set `RUST_LOG=wordpop_stream=debug` to watch transport selection
//! and frame delivery.

use wordpop_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SseError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = match std::env::var("WORDPOP_SSE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("set WORDPOP_SSE_URL to an SSE endpoint to run this example");
            return Ok(());
        }
    };

    let client = SseClient::builder()
        .context(ExecutionContext::DesktopApp)
        .build()?;

    let mut stream = client.start_stream(StreamRequest::new(url)).await?;
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Message { data, .. } => println!("{data}"),
            StreamEvent::HttpError { payload } => eprintln!("request rejected: {payload:?}"),
        }
    }
    stream.finish().await
}
