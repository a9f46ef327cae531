//! Example consumer for the relay.
//!
//! Brokers are expected to be server-side consumers rather than browsers,
//! so a plain WebSocket client like this is the reference integration: it
//! connects with its credential, prints every event it receives, and obeys
//! the `close` sentinel.
//!
//! ```bash
//! relay-client [credential] [url]
//! ```

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
};

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/broker_notifications";
const DEFAULT_CREDENTIAL: &str = "broker1";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let credential = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(DEFAULT_CREDENTIAL);
    let url = args.get(2).map(String::as_str).unwrap_or(DEFAULT_URL);

    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        credential.parse().context("invalid credential header")?,
    );

    let (mut ws, _) = connect_async(request)
        .await
        .context("failed to connect to relay")?;
    println!("connected to {} as {}", url, credential);

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if text == "close" {
                    ws.close(None).await?;
                    break;
                }
                println!("received {}", text);
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    println!("closed by server: {} {}", frame.code, frame.reason);
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("websocket error: {}", e);
                break;
            }
        }
    }

    Ok(())
}
