//! Loopback call - drive a media server through a WebRTC loopback setup.
//!
//! This example demonstrates:
//! - Dialing the media server and attaching a session to the duplex
//! - Creating a pipeline and a WebRTC endpoint connected to itself
//! - Receiving `IceCandidateFound` events through the session
//! - Cancelling the run on Ctrl-C via the process-wide registry
//!
//! # Running
//!
//! ```text
//! MEDIAGATE_MEDIA_SERVER_URL=ws://127.0.0.1:8888/kurento \
//! RUST_LOG=mediagate=debug cargo run --example loopback
//! ```

use std::sync::Arc;

use mediagate::media::{MediaPipeline, WebRtcEndpoint};
use mediagate::transport::{Duplex, RunOutcome};
use mediagate::{cancel_runners, GatewayConfig, Session};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mediagate=debug")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let mut duplex = Duplex::connect(&config.media_server_url).await?;
    let incoming = duplex.incoming().ok_or("inbound sequence already taken")?;

    let session = Arc::new(Session::new(duplex.sender(), config));
    session.set_event_handler(|event: Value| {
        let value = &event["params"]["value"];
        tracing::info!("Event {} from {}", value["type"], value["object"]);
    });
    let _reader = session.attach(incoming);
    let _sweeper = session.spawn_sweeper();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_runners();
        }
    });

    let pipeline = Arc::new(MediaPipeline::new(session.clone()));
    pipeline.create().await?;

    let endpoint = WebRtcEndpoint::new(pipeline.clone());
    endpoint.create().await?;
    endpoint.connect(&endpoint).await?;

    let subscription = endpoint.subscribe_candidates().await?;
    tracing::info!("Subscribed to ICE candidates: {}", subscription);

    let offer = endpoint.generate_offer().await?;
    tracing::info!("Offer:\n{}", offer);
    endpoint.gather_candidates().await?;

    match duplex.run(None).await {
        RunOutcome::Finished => tracing::info!("Media server connection ended"),
        RunOutcome::Cancelled => tracing::info!("Interrupted"),
        RunOutcome::TimedOut => {}
    }

    duplex.shutdown().await;
    Ok(())
}
