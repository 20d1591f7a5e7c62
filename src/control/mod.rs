//! Control channel between the cli and the daemon. Messages are json objects, one per line:
//! `{"action":"startTimer"}` is answered with `{"status":"ok","snapshot":{...}}`.

pub mod client;
pub mod server;

use std::future::Future;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::{daemon::counter::Command, timer::snapshot::TimerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    StartTimer,
    StopTimer,
    Reset,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ControlResponse {
    Ok { snapshot: TimerSnapshot },
    Error { message: String },
}

impl From<Result<TimerSnapshot>> for ControlResponse {
    fn from(value: Result<TimerSnapshot>) -> Self {
        match value {
            Ok(snapshot) => ControlResponse::Ok { snapshot },
            Err(e) => ControlResponse::Error {
                message: format!("{e:#}"),
            },
        }
    }
}

impl From<ControlResponse> for Result<TimerSnapshot> {
    fn from(value: ControlResponse) -> Self {
        match value {
            ControlResponse::Ok { snapshot } => Ok(snapshot),
            ControlResponse::Error { message } => Err(anyhow!("Daemon failed: {message}")),
        }
    }
}

/// Anything that can deliver a [ControlMessage] to the counter and report the resulting state.
pub trait ControlTransport {
    fn request(&mut self, message: ControlMessage) -> impl Future<Output = Result<TimerSnapshot>>;
}

/// Talks to a counter task living in the same process.
impl ControlTransport for mpsc::Sender<Command> {
    async fn request(&mut self, message: ControlMessage) -> Result<TimerSnapshot> {
        let (reply, response) = oneshot::channel();
        mpsc::Sender::send(self, Command { message, reply })
            .await
            .map_err(|_| anyhow!("Counter task is not running"))?;
        response.await?
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use serde_json::json;

    use super::{ControlMessage, ControlResponse};

    #[test]
    fn test_message_format() -> Result<()> {
        assert_eq!(
            serde_json::to_value(ControlMessage::StartTimer)?,
            json!({ "action": "startTimer" })
        );
        assert_eq!(
            serde_json::from_value::<ControlMessage>(json!({ "action": "stopTimer" }))?,
            ControlMessage::StopTimer
        );
        assert!(serde_json::from_value::<ControlMessage>(json!({ "action": "pause" })).is_err());
        Ok(())
    }

    #[test]
    fn test_error_response() -> Result<()> {
        let response = ControlResponse::from(Err(anyhow!("disk is full")));
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "status": "error", "message": "disk is full" })
        );

        let result: Result<_> = response.into();
        assert!(result.is_err());
        Ok(())
    }
}
