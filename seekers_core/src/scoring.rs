//! Scoring & goal lifecycle.
//!
//! Per goal: `Free -> Contained(camp, since_tick) -> Captured -> Free(new position)`.
//!
//! A goal is captured on the first tick where it has been inside the same
//! camp for `time_to_score` ticks. Leaving the camp (or moving straight
//! into another one) restarts the count. A captured goal is replaced by a
//! fresh goal at a free pseudorandom position drawn from the world RNG.

use crate::world::{CampId, GoalId, GoalState, World};

use seekers_env::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A goal that scored this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEvent {
    pub goal: GoalId,
    pub camp: CampId,
    pub player: PlayerId,
    /// The goal spawned to replace it
    pub replacement: GoalId,
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    ScoreThreshold,
    TickBudget,
    Shutdown,
}

/// One row of the final scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub player: PlayerId,
    pub name: String,
    pub score: u32,
    pub active: bool,
}

/// Result of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub reason: FinishReason,
    /// `None` on a draw
    pub winner: Option<PlayerId>,
    pub final_tick: u64,
    /// Sorted by score descending, then player id
    pub scoreboard: Vec<ScoreLine>,
}

/// Advances every goal's containment state for the current tick.
pub fn resolve(world: &mut World) -> Vec<ScoreEvent> {
    let now = world.tick;
    let goal_ids: Vec<GoalId> = world.goals.keys().copied().collect();
    let mut events = Vec::new();

    for goal_id in goal_ids {
        let Some(goal) = world.goals.get(&goal_id) else {
            continue;
        };

        let holder = world
            .camps
            .values()
            .filter(|camp| world.players.get(&camp.owner).map(|p| p.active).unwrap_or(false))
            .find(|camp| camp.contains(&goal.position))
            .map(|camp| (camp.id, camp.owner));

        let next_state = match (goal.state, holder) {
            (_, None) => GoalState::Free,
            (GoalState::Contained { camp, since_tick }, Some((holder_camp, _))) if camp == holder_camp => {
                GoalState::Contained { camp, since_tick }
            }
            (_, Some((holder_camp, _))) => GoalState::Contained { camp: holder_camp, since_tick: now },
        };

        let captured = match next_state {
            GoalState::Contained { since_tick, .. } => now.saturating_sub(since_tick) >= goal.time_to_score,
            GoalState::Free => false,
        };

        if let Some(goal) = world.goals.get_mut(&goal_id) {
            goal.state = next_state;
        }

        if let (true, Some((camp, owner))) = (captured, holder) {
            events.push(capture(world, goal_id, camp, owner));
        }
    }

    events
}

fn capture(world: &mut World, goal: GoalId, camp: CampId, owner: PlayerId) -> ScoreEvent {
    world.goals.remove(&goal);
    if let Some(player) = world.players.get_mut(&owner) {
        player.score += 1;
        info!("Goal {} scored by {} '{}' (score {})", goal, owner, player.name, player.score);
    }

    let radius = world.config.goal.radius;
    let position = world.free_position(radius);
    let replacement = world.insert_goal(position);

    ScoreEvent { goal, camp, player: owner, replacement }
}

/// Checks the win condition after a tick.
///
/// The score threshold wins first; otherwise the match ends once the tick
/// budget is used up, won by the highest score. Equal top scores are a draw.
pub fn check_outcome(world: &World) -> Option<MatchOutcome> {
    let config = &world.config;
    let threshold_hit = config
        .score_threshold
        .map(|threshold| world.players.values().any(|p| p.score >= threshold))
        .unwrap_or(false);
    if threshold_hit {
        return Some(outcome(world, FinishReason::ScoreThreshold));
    }

    let budget_used = config.tick_budget.map(|budget| world.tick >= budget).unwrap_or(false);
    if budget_used {
        return Some(outcome(world, FinishReason::TickBudget));
    }

    None
}

/// Builds the final outcome from the current scores.
pub fn outcome(world: &World, reason: FinishReason) -> MatchOutcome {
    let scoreboard = scoreboard(world);
    let winner = match scoreboard.as_slice() {
        [first, second, ..] if first.score == second.score => None,
        [first, ..] => Some(first.player),
        [] => None,
    };
    MatchOutcome {
        reason,
        winner,
        final_tick: world.tick,
        scoreboard,
    }
}

pub fn scoreboard(world: &World) -> Vec<ScoreLine> {
    let mut lines: Vec<ScoreLine> = world
        .players
        .values()
        .map(|p| ScoreLine {
            player: p.id,
            name: p.name.clone(),
            score: p.score,
            active: p.active,
        })
        .collect();
    lines.sort_by(|a, b| b.score.cmp(&a.score).then(a.player.cmp(&b.player)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::geometry::Vec2;
    use crate::world::tests::specs;

    fn world_with_one_goal(scoring_time: u64) -> (World, GoalId) {
        let mut config = GameConfig::default();
        config.goals = 1;
        config.goal.scoring_time = scoring_time;
        let world = World::new(&config, &specs(2), 11).unwrap();
        let goal = *world.goals.keys().next().unwrap();
        (world, goal)
    }

    fn camp_center(world: &World, player: u32) -> Vec2 {
        let camp = world.players[&PlayerId(player)].camp;
        world.camps[&camp].position()
    }

    fn outside(world: &World) -> Vec2 {
        Vec2::new(10.0, world.config.map_height / 2.0)
    }

    /// Advances the tick counter and runs scoring, without physics.
    fn score_tick(world: &mut World) -> Vec<ScoreEvent> {
        world.begin_tick();
        resolve(world)
    }

    #[test]
    fn test_capture_on_exact_tick() {
        let (mut world, goal) = world_with_one_goal(5);
        let inside = camp_center(&world, 0);
        world.goal_mut(goal).unwrap().position = inside;

        // Enters on tick 1
        assert!(score_tick(&mut world).is_empty());
        assert_eq!(world.goal(goal).unwrap().captured_by(), Some(world.players[&PlayerId(0)].camp));

        for _ in 2..=5 {
            assert!(score_tick(&mut world).is_empty(), "captured early at tick {}", world.tick);
        }
        // Tick 6: contained for exactly 5 ticks
        let events = score_tick(&mut world);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].goal, goal);
        assert_eq!(events[0].player, PlayerId(0));
        assert_eq!(world.players[&PlayerId(0)].score, 1);

        // Replaced, never duplicated or lost
        assert!(world.goal(goal).is_none());
        assert_eq!(world.goal_count(), 1);
        let replacement = world.goal(events[0].replacement).unwrap();
        assert_eq!(replacement.state, GoalState::Free);
    }

    #[test]
    fn test_leaving_one_tick_early_resets_timer() {
        let (mut world, goal) = world_with_one_goal(5);
        let inside = camp_center(&world, 0);
        let out = outside(&world);
        world.goal_mut(goal).unwrap().position = inside;

        for _ in 1..=5 {
            score_tick(&mut world);
        }
        // One tick before the threshold it leaves
        world.goal_mut(goal).unwrap().position = out;
        assert!(score_tick(&mut world).is_empty());
        assert_eq!(world.goal(goal).unwrap().state, GoalState::Free);

        // Back in: the full count starts over
        world.goal_mut(goal).unwrap().position = inside;
        for _ in 0..5 {
            assert!(score_tick(&mut world).is_empty());
        }
        assert_eq!(score_tick(&mut world).len(), 1);
    }

    #[test]
    fn test_switching_camps_restarts_count() {
        let (mut world, goal) = world_with_one_goal(3);
        let camp0 = camp_center(&world, 0);
        let camp1 = camp_center(&world, 1);
        world.goal_mut(goal).unwrap().position = camp0;
        score_tick(&mut world);
        score_tick(&mut world);

        world.goal_mut(goal).unwrap().position = camp1;
        score_tick(&mut world);
        assert_eq!(world.goal(goal).unwrap().time_in_camp(world.tick), 0);
        score_tick(&mut world);
        score_tick(&mut world);
        let events = score_tick(&mut world);
        assert_eq!(events[0].player, PlayerId(1));
    }

    #[test]
    fn test_dropped_players_camp_never_scores() {
        let (mut world, goal) = world_with_one_goal(1);
        world.drop_player(PlayerId(0));
        world.goal_mut(goal).unwrap().position = camp_center(&world, 0);
        for _ in 0..5 {
            assert!(score_tick(&mut world).is_empty());
        }
        assert_eq!(world.goal(goal).unwrap().state, GoalState::Free);
    }

    #[test]
    fn test_threshold_outcome() {
        let (mut world, _) = world_with_one_goal(1);
        world.config.score_threshold = Some(2);
        world.config.tick_budget = None;
        assert!(check_outcome(&world).is_none());

        world.players.get_mut(&PlayerId(1)).unwrap().score = 2;
        let outcome = check_outcome(&world).unwrap();
        assert_eq!(outcome.reason, FinishReason::ScoreThreshold);
        assert_eq!(outcome.winner, Some(PlayerId(1)));
        assert_eq!(outcome.scoreboard[0].player, PlayerId(1));
    }

    #[test]
    fn test_budget_outcome_draw() {
        let (mut world, _) = world_with_one_goal(1);
        world.config.tick_budget = Some(2);
        world.begin_tick();
        assert!(check_outcome(&world).is_none());
        world.begin_tick();
        let outcome = check_outcome(&world).unwrap();
        assert_eq!(outcome.reason, FinishReason::TickBudget);
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.final_tick, 2);
    }
}
