use std::net::Ipv4Addr;

use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

use crate::timer::snapshot::TimerSnapshot;

use super::{ControlMessage, ControlResponse, ControlTransport};

/// Connection to a daemon's control server.
pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
            .await
            .with_context(|| format!("Daemon is not listening on port {port}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }
}

impl ControlTransport for ControlClient {
    async fn request(&mut self, message: ControlMessage) -> Result<TimerSnapshot> {
        let mut buffer = serde_json::to_vec(&message)?;
        buffer.push(b'\n');
        self.writer.write_all(&buffer).await?;
        self.writer.flush().await?;

        let line = self
            .lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("Daemon closed the connection"))?;
        let response: ControlResponse = serde_json::from_str(&line)?;
        response.into()
    }
}
