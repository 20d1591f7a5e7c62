use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::daemon::counter::Command;

use super::{ControlMessage, ControlResponse, ControlTransport};

/// Accepts control connections until `shutdown` is cancelled. Every request, status included, is
/// answered by the counter task so replies always reflect the store as of now.
pub async fn serve(
    listener: TcpListener,
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Listening for control messages on {}", listener.local_addr()?);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                return Ok(())
            }
            accepted = listener.accept() => {
                let (stream, address) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        error!("Failed to accept control connection {e:?}");
                        continue;
                    }
                };
                let span = tracing::info_span!("control connection", %address);
                let connection = handle_connection(stream, commands.clone());
                tokio::spawn(
                    async move {
                        if let Err(e) = connection.await {
                            warn!("Control connection ended with an error {e:?}");
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut commands: mpsc::Sender<Command>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received {line}");
        let response: ControlResponse = match serde_json::from_str::<ControlMessage>(&line) {
            Ok(message) => commands.request(message).await.into(),
            Err(e) => ControlResponse::Error {
                message: format!("Illegal control message: {e}"),
            },
        };

        let mut buffer = serde_json::to_vec(&response)?;
        buffer.push(b'\n');
        writer.write_all(&buffer).await?;
        writer.flush().await?;
    }
    Ok(())
}
