//! JSON exporter for external renderers.
//!
//! Flattens the per-tick status stream into plain frames.

use seekers_core::protocol::StatusResponse;
use seekers_core::{MagnetState, MatchOutcome};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFrame {
    pub tick: u64,
    
    pub seekers: Vec<SeekerFrame>,
    
    pub goals: Vec<GoalFrame>,
    
    /// `(player id, score)` in player order
    pub scores: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekerFrame {
    pub id: u32,
    pub owner: u32,
    pub x: f64,
    pub y: f64,
    pub magnet: MagnetState,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalFrame {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camp: Option<u32>,
}

impl From<&StatusResponse> for ExportFrame {
    fn from(status: &StatusResponse) -> Self {
        Self {
            tick: status.tick,
            seekers: status
                .seekers
                .iter()
                .map(|s| SeekerFrame {
                    id: s.id.0,
                    owner: s.owner.0,
                    x: s.position.x,
                    y: s.position.y,
                    magnet: s.magnet,
                    disabled: s.is_disabled,
                })
                .collect(),
            goals: status
                .goals
                .iter()
                .map(|g| GoalFrame {
                    id: g.id.0,
                    x: g.position.x,
                    y: g.position.y,
                    camp: g.captured_by.map(|c| c.0),
                })
                .collect(),
            scores: status.players.iter().map(|p| (p.id.0, p.score)).collect(),
        }
    }
}

/// Static information about a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
    /// `#rrggbb`
    pub color: String,
    pub camp: CampInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampInfo {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Complete match export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExport {
    /// Scenario name
    pub scenario: String,
    
    /// Seed used
    pub seed: u64,
    
    pub width: f64,
    pub height: f64,
    
    pub players: Vec<PlayerInfo>,
    
    /// All frames
    pub frames: Vec<ExportFrame>,
    
    /// Final results
    pub passed: bool,
    
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
}

impl MatchExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            width: 0.0,
            height: 0.0,
            players: Vec::new(),
            frames: Vec::new(),
            passed: false,
            outcome: None,
        }
    }
    
    /// Adds a frame. The first frame also fills in the static arena data.
    pub fn add_frame(&mut self, status: &StatusResponse) {
        if self.frames.is_empty() {
            self.width = status.arena.width;
            self.height = status.arena.height;
            self.players = status
                .players
                .iter()
                .map(|p| {
                    let camp = status.camps.iter().find(|c| c.id == p.camp);
                    PlayerInfo {
                        id: p.id.0,
                        name: p.name.clone(),
                        color: p.color.to_hex(),
                        camp: CampInfo {
                            x: camp.map(|c| c.position.x).unwrap_or_default(),
                            y: camp.map(|c| c.position.y).unwrap_or_default(),
                            width: camp.map(|c| c.width).unwrap_or_default(),
                            height: camp.map(|c| c.height).unwrap_or_default(),
                        },
                    }
                })
                .collect();
        }
        self.frames.push(ExportFrame::from(status));
    }
    
    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, outcome: Option<MatchOutcome>) {
        self.passed = passed;
        self.outcome = outcome;
    }
    
    /// Serialized frames, for comparing runs.
    pub fn frames_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.frames)
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekers_core::colors::Color;
    use seekers_core::world::PlayerSpec;
    use seekers_core::{GameConfig, World};
    use seekers_env::PlayerId;
    
    fn status() -> StatusResponse {
        let specs = vec![PlayerSpec {
            id: PlayerId(0),
            name: "solo".to_string(),
            color: Color::new(1, 2, 3),
        }];
        let config = GameConfig { players: 1, ..GameConfig::default() };
        let world = World::new(&config, &specs, 4).unwrap();
        StatusResponse::snapshot(&world)
    }
    
    #[test]
    fn test_first_frame_fills_arena_data() {
        let mut export = MatchExport::new("unit", 4);
        export.add_frame(&status());
        export.add_frame(&status());
        
        assert_eq!(export.frames.len(), 2);
        assert_eq!(export.width, 768.0);
        assert_eq!(export.players.len(), 1);
        assert_eq!(export.players[0].color, "#010203");
        assert_eq!(export.players[0].camp.x, 384.0);
        assert_eq!(export.frames[0].seekers.len(), 5);
        assert_eq!(export.frames[0].scores, vec![(0, 0)]);
    }
}
