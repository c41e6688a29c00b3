//! SimWorld - The simulation harness container.
//!
//! Wraps a [`GameLoop`] running on a [`SimContext`] together with the
//! simulated links of its remote players, a recorder for the per-tick
//! status stream and scheduled link faults.

use crate::context::SimContext;
use crate::network::{SimLink, SimLinkController};

use seekers_core::colors::Color;
use seekers_core::lobby::Seat;
use seekers_core::protocol::{JoinResponse, StatusResponse};
use seekers_core::{
    ClientError, DecideFn, GameConfig, GameLoop, JoinError, MatchOutcome, MatchReport, ScheduleError, SeekersClient,
    World,
};
use seekers_env::{ArenaContext, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// How long finished remote clients get to wind down.
const CLIENT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Remote client failed: {0}")]
    Client(String),
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,
    
    /// Match configuration (its seed is overridden by `seed`)
    pub game: GameConfig,
    
    /// Link jitter standard deviation in milliseconds
    pub link_jitter_ms: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            game: GameConfig::default(),
            link_jitter_ms: 0.0,
        }
    }
}

/// Everything a finished simulation leaves behind.
#[derive(Debug)]
pub struct SimRun {
    pub report: MatchReport,
    
    /// Every published status, in tick order
    pub frames: Vec<Arc<StatusResponse>>,
    
    /// What each remote client saw at the end, in completion order
    /// (`None` = link closed or failed first)
    pub client_outcomes: Vec<Option<MatchOutcome>>,
    
    pub seats: Vec<Seat>,
    
    /// Final world state
    pub world: Option<World>,
    
    /// Virtual time the match took
    pub elapsed: Duration,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,
    
    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,
    
    /// Link controller for fault injection
    pub links: Arc<SimLinkController>,
    
    game: GameLoop<SimContext>,
    clients: JoinSet<Result<Option<MatchOutcome>, ClientError>>,
    shutdown: watch::Sender<bool>,
    recorder: Option<oneshot::Receiver<Vec<Arc<StatusResponse>>>>,
}

impl SimWorld {
    /// Creates a new simulation world.
    ///
    /// Must be called inside a Tokio runtime; the stream recorder starts
    /// immediately.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::shared(config.seed);
        let links = SimLinkController::shared(context.derive_seed(u64::MAX));
        links.set_jitter(config.link_jitter_ms);
        
        let mut game_config = config.game.clone();
        game_config.seed = config.seed;
        let game = GameLoop::new(Arc::clone(&context), game_config)?;
        
        let (shutdown, _) = watch::channel(false);
        let mut world = Self {
            config,
            context,
            links,
            game,
            clients: JoinSet::new(),
            shutdown,
            recorder: None,
        };
        world.recorder = Some(world.start_recorder());
        Ok(world)
    }
    
    fn start_recorder(&self) -> oneshot::Receiver<Vec<Arc<StatusResponse>>> {
        let mut stream = self.game.subscribe();
        let (done, frames_rx) = oneshot::channel();
        self.context.spawn("recorder", async move {
            let mut frames = Vec::new();
            loop {
                match stream.recv().await {
                    Ok(status) => frames.push(status),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Recorder lagged, {} frames missing", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            let _ = done.send(frames);
        });
        frames_rx
    }
    
    /// Seats an in-process bot.
    pub fn add_local(&mut self, name: &str, color: Option<Color>, decide: DecideFn) -> Result<JoinResponse, SimError> {
        Ok(self.game.join_local(name, color, decide)?)
    }
    
    /// Seats a bot that plays over a simulated link, through the same
    /// client driver a real remote player would use.
    pub async fn add_remote(
        &mut self,
        name: &str,
        color: Option<Color>,
        decide: DecideFn,
    ) -> Result<(JoinResponse, Arc<SimLink>), SimError> {
        let player = PlayerId(self.game.seats().len() as u32);
        let (engine_side, player_side) = SimLink::pair(player, Arc::clone(&self.links));
        
        let client_link = Arc::clone(&player_side);
        let name = name.to_string();
        self.clients.spawn(async move {
            let mut client = SeekersClient::new(client_link, decide);
            client.join(&name, color).await?;
            client.run().await
        });
        
        let response = self.game.accept_remote(engine_side).await?;
        Ok((response, player_side))
    }
    
    /// Adjusts the world before the first tick. Starts the match if needed.
    pub fn arrange<F: FnOnce(&mut World)>(&mut self, f: F) -> Result<bool, SimError> {
        self.game.start()?;
        Ok(self.game.arrange(f))
    }
    
    /// Runs `action` on the link controller once tick `tick` is published.
    pub fn fault_at<F>(&self, tick: u64, action: F)
    where
        F: FnOnce(&SimLinkController) + Send + 'static,
    {
        let mut stream = self.game.subscribe();
        let links = Arc::clone(&self.links);
        self.context.spawn("fault", async move {
            loop {
                match stream.recv().await {
                    Ok(status) if status.tick >= tick => {
                        debug!("Injecting link fault at tick {}", status.tick);
                        action(&links);
                        return;
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }
    
    /// Handle to stop the match from outside.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }
    
    pub fn game(&self) -> &GameLoop<SimContext> {
        &self.game
    }
    
    /// Runs the match and collects everything it produced.
    pub async fn run(mut self) -> Result<SimRun, SimError> {
        let report = self.game.run(self.shutdown.subscribe()).await?;
        let seats = self.game.seats().to_vec();
        let world = self.game.world().cloned();
        let elapsed = self.context.now();
        
        // Dropping the loop closes the stream and every engine-side link
        drop(self.game);
        
        let frames = match self.recorder.take() {
            Some(rx) => rx.await.unwrap_or_default(),
            None => Vec::new(),
        };
        
        let mut client_outcomes = Vec::new();
        loop {
            match tokio::time::timeout(CLIENT_GRACE, self.clients.join_next()).await {
                Ok(Some(Ok(Ok(outcome)))) => client_outcomes.push(outcome),
                Ok(Some(Ok(Err(e)))) => {
                    // Typically a command racing the engine's shutdown
                    debug!("Remote client ended with error: {}", e);
                    client_outcomes.push(None);
                }
                Ok(Some(Err(e))) => return Err(SimError::Client(e.to_string())),
                Ok(None) => break,
                Err(_) => {
                    warn!("Remote clients did not finish, aborting them");
                    self.clients.abort_all();
                    break;
                }
            }
        }
        
        Ok(SimRun {
            report,
            frames,
            client_outcomes,
            seats,
            world,
            elapsed,
        })
    }
}
