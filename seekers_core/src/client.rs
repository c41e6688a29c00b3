//! Player side of the protocol.
//!
//! [`SeekersClient`] drives a remote player over any [`PlayerLink`]: it
//! performs the join handshake, then answers every status frame by running
//! the decide function on the same [`AiInput`] a locally hosted player
//! would receive.

use crate::colors::Color;
use crate::gateway::{AiInput, DecideFn};
use crate::protocol::{decode, encode, ClientMessage, CommandRequest, JoinRequest, JoinResponse, ProtocolError, ServerMessage};
use crate::scoring::MatchOutcome;

use seekers_env::{EnvError, PlayerLink};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Link error: {0}")]
    Link(#[from] EnvError),

    #[error("Join rejected: {0}")]
    Rejected(String),

    #[error("Not joined")]
    NotJoined,

    #[error("Link closed during handshake")]
    Disconnected,
}

pub struct SeekersClient<L: PlayerLink> {
    link: Arc<L>,
    decide: DecideFn,
    session: Option<JoinResponse>,
}

impl<L: PlayerLink> SeekersClient<L> {
    pub fn new(link: Arc<L>, decide: DecideFn) -> Self {
        Self {
            link,
            decide,
            session: None,
        }
    }

    /// Assignment received at join time.
    pub fn session(&self) -> Option<&JoinResponse> {
        self.session.as_ref()
    }

    /// Performs the join handshake.
    pub async fn join(&mut self, name: &str, color: Option<Color>) -> Result<JoinResponse, ClientError> {
        let request = JoinRequest {
            name: name.to_string(),
            color,
            seekers: None,
        };
        self.link.send(encode(0, &ClientMessage::Join(request))?).await?;

        let frame = self.link.recv().await.ok_or(ClientError::Disconnected)?;
        match decode::<ServerMessage>(&frame)? {
            ServerMessage::Joined(response) => {
                info!(
                    "Joined as {} '{}' with {} seekers",
                    response.player_id,
                    response.name,
                    response.seeker_ids.len()
                );
                self.session = Some(response.clone());
                Ok(response)
            }
            ServerMessage::JoinRejected { reason } => Err(ClientError::Rejected(reason)),
            other => Err(ProtocolError::Unexpected {
                expected: "joined",
                got: other.kind(),
            }
            .into()),
        }
    }

    /// Answers status frames until the match ends.
    ///
    /// Returns the outcome, or `None` if the engine closed the link first.
    pub async fn run(&mut self) -> Result<Option<MatchOutcome>, ClientError> {
        let (me, token) = match &self.session {
            Some(session) => (session.player_id, session.token),
            None => return Err(ClientError::NotJoined),
        };

        while let Some(frame) = self.link.recv().await {
            let status = match decode::<ServerMessage>(&frame)? {
                ServerMessage::Status(status) => status,
                ServerMessage::MatchOver(outcome) => {
                    info!("Match over: {:?}, winner {:?}", outcome.reason, outcome.winner);
                    return Ok(Some(outcome));
                }
                other => {
                    debug!("Ignoring {} message", other.kind());
                    continue;
                }
            };

            let Some(input) = AiInput::from_status(&status, me) else {
                warn!("Status for tick {} does not list {}", status.tick, me);
                continue;
            };
            for rejection in &input.rejected {
                debug!("Command for {} rejected: {}", rejection.seeker_id, rejection.reason);
            }

            let decide = Arc::clone(&self.decide);
            let commands = match tokio::task::spawn_blocking(move || decide(&input)).await {
                Ok(Ok(commands)) => commands,
                Ok(Err(e)) => {
                    warn!("Decide function failed at tick {}: {}", status.tick, e);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Decide function aborted at tick {}: {}", status.tick, e);
                    Vec::new()
                }
            };

            let request = CommandRequest {
                token,
                tick: status.tick,
                commands,
            };
            self.link.send(encode(status.tick, &ClientMessage::Command(request))?).await?;
        }

        debug!("Link closed by engine");
        Ok(None)
    }
}
