//! Scenarios for deterministic simulation testing.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Head-on collision with one magnet on
    HeadOn,
    
    /// SIM-002: Head-on collision with both magnets on
    MagnetDuel,
    
    /// SIM-003: Remote player goes silent, keeps its commands
    Timeout,
    
    /// SIM-004: Unresponsive player dropped in careful mode
    CarefulDrop,
    
    /// SIM-005: Misbehaving bots cannot stall or corrupt the loop
    Misbehaving,
    
    /// SIM-006: Two remote clients over jittery links
    RemoteMatch,
    
    /// SIM-007: Same seed twice, identical tick-by-tick snapshots
    Determinism,
    
    /// SIM-008: Full match between carriers, invariants every tick
    FullMatch,
    
    /// SIM-009: Colliding colour requests adjusted deterministically
    ColorClash,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::HeadOn,
            ScenarioId::MagnetDuel,
            ScenarioId::Timeout,
            ScenarioId::CarefulDrop,
            ScenarioId::Misbehaving,
            ScenarioId::RemoteMatch,
            ScenarioId::Determinism,
            ScenarioId::FullMatch,
            ScenarioId::ColorClash,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::HeadOn => "head_on",
            ScenarioId::MagnetDuel => "magnet_duel",
            ScenarioId::Timeout => "timeout",
            ScenarioId::CarefulDrop => "careful_drop",
            ScenarioId::Misbehaving => "misbehaving",
            ScenarioId::RemoteMatch => "remote_match",
            ScenarioId::Determinism => "determinism",
            ScenarioId::FullMatch => "full_match",
            ScenarioId::ColorClash => "color_clash",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::HeadOn => "Seekers touching on tick 1 swap velocities; the magnet holder is disabled",
            ScenarioId::MagnetDuel => "Both magnets on: only the lower seeker id is disabled",
            ScenarioId::Timeout => "Remote player partitioned mid-match keeps its last targets and magnets",
            ScenarioId::CarefulDrop => "Careful mode drops a player that misses the command timeout",
            ScenarioId::Misbehaving => "Panicking, failing, cheating and NaN-sending bots; match completes",
            ScenarioId::RemoteMatch => "Two clients over links with latency and jitter play to the end",
            ScenarioId::Determinism => "Two runs with one seed produce byte-identical snapshots",
            ScenarioId::FullMatch => "Carrier vs chaser for the full tick budget, invariants every tick",
            ScenarioId::ColorClash => "Two players ask for the same colour; the second is moved away",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head_on" | "headon" | "sim-001" => Ok(ScenarioId::HeadOn),
            "magnet_duel" | "magnetduel" | "sim-002" => Ok(ScenarioId::MagnetDuel),
            "timeout" | "sim-003" => Ok(ScenarioId::Timeout),
            "careful_drop" | "carefuldrop" | "sim-004" => Ok(ScenarioId::CarefulDrop),
            "misbehaving" | "sim-005" => Ok(ScenarioId::Misbehaving),
            "remote_match" | "remotematch" | "sim-006" => Ok(ScenarioId::RemoteMatch),
            "determinism" | "sim-007" => Ok(ScenarioId::Determinism),
            "full_match" | "fullmatch" | "sim-008" => Ok(ScenarioId::FullMatch),
            "color_clash" | "colorclash" | "sim-009" => Ok(ScenarioId::ColorClash),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_names_parse_back() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
        assert_eq!("SIM-003".parse::<ScenarioId>(), Ok(ScenarioId::Timeout));
        assert!("nope".parse::<ScenarioId>().is_err());
    }
}
