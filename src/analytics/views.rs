//! Aggregate analytics views.
//!
//! Each view loads the per-goal and per-habit metrics once, then folds the
//! base rows over those maps. Averages over empty groups are 0.

use super::metrics::{self, ActivityCounts, ChallengeTiming};
use super::queries::{self, Participation};
use crate::error::AppError;
use crate::models::{Category, Challenge, Goal, Habit, User, Visibility};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgressRow {
    pub user_id: i64,
    pub username: String,
    pub total_goals: u32,
    pub completed_goals: u32,
    pub avg_goal_progress: f64,
    pub total_habits: u32,
    pub active_habits: u32,
    pub avg_habit_consistency: f64,
    pub subscribers_count: u32,
    pub subscribing_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeSummaryRow {
    pub challenge_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    #[serde(flatten)]
    pub timing: ChallengeTiming,
    pub participants_count: u32,
    pub goals_count: u32,
    pub avg_progress_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummaryRow {
    pub category_id: i64,
    pub name: String,
    pub total_goals: u32,
    pub total_habits: u32,
    pub total_challenges: u32,
    pub unique_users: u32,
    pub activity_score: f64,
    pub popularity_rank: u32,
}

#[derive(Default)]
struct UserTally {
    total_goals: u32,
    completed_goals: u32,
    goal_progress: Vec<f64>,
    total_habits: u32,
    active_habits: u32,
    habit_consistency: Vec<f64>,
}

/// Per-user goal, habit and subscription figures, ordered by user id.
pub fn user_progress(conn: &Connection) -> Result<Vec<UserProgressRow>, AppError> {
    let completion = queries::completion_by_goal(conn)?;
    let consistency = queries::consistency_by_habit(conn)?;
    let subscribers = count_by_key(
        conn,
        "SELECT subscribing_id, COUNT(*) FROM subscriptions GROUP BY subscribing_id",
    )?;
    let subscribing = count_by_key(
        conn,
        "SELECT subscriber_id, COUNT(*) FROM subscriptions GROUP BY subscriber_id",
    )?;

    let mut tallies: HashMap<i64, UserTally> = HashMap::new();
    for goal in Goal::find_all(conn, Visibility::All)? {
        let tally = tallies.entry(goal.user_id).or_default();
        tally.total_goals += 1;
        if goal.is_completed {
            tally.completed_goals += 1;
        }
        tally
            .goal_progress
            .push(completion.get(&goal.id).copied().unwrap_or_default());
    }
    for habit in Habit::find_all(conn, Visibility::All)? {
        let tally = tallies.entry(habit.user_id).or_default();
        tally.total_habits += 1;
        if habit.is_active {
            tally.active_habits += 1;
        }
        tally
            .habit_consistency
            .push(consistency.get(&habit.id).copied().unwrap_or_default());
    }

    let rows = User::find_all(conn)?
        .into_iter()
        .map(|user| {
            let tally = tallies.remove(&user.id).unwrap_or_default();
            UserProgressRow {
                user_id: user.id,
                username: user.username,
                total_goals: tally.total_goals,
                completed_goals: tally.completed_goals,
                avg_goal_progress: metrics::average(tally.goal_progress),
                total_habits: tally.total_habits,
                active_habits: tally.active_habits,
                avg_habit_consistency: metrics::average(tally.habit_consistency),
                subscribers_count: subscribers.get(&user.id).copied().unwrap_or_default(),
                subscribing_count: subscribing.get(&user.id).copied().unwrap_or_default(),
            }
        })
        .collect();
    Ok(rows)
}

/// Timing, participation and average public-goal progress of every challenge.
pub fn challenge_summaries(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<ChallengeSummaryRow>, AppError> {
    let completion = queries::completion_by_goal(conn)?;

    let mut stmt = conn.prepare(
        "SELECT gc.challenge_id, g.id, g.user_id
         FROM goal_challenges gc
         JOIN goals g ON g.id = gc.goal_id
         WHERE g.is_public = 1",
    )?;
    let enrolments = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut users_by_challenge: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut progress_by_challenge: HashMap<i64, Vec<f64>> = HashMap::new();
    for (challenge_id, goal_id, user_id) in enrolments {
        users_by_challenge.entry(challenge_id).or_default().insert(user_id);
        progress_by_challenge
            .entry(challenge_id)
            .or_default()
            .push(completion.get(&goal_id).copied().unwrap_or_default());
    }

    Challenge::find_all(conn)?
        .into_iter()
        .map(|challenge| -> Result<ChallengeSummaryRow, AppError> {
            let progress = progress_by_challenge.remove(&challenge.id).unwrap_or_default();
            let participation = Participation {
                participants: count_u32(users_by_challenge.get(&challenge.id).map_or(0, HashSet::len))?,
                goals: count_u32(progress.len())?,
            };
            Ok(ChallengeSummaryRow {
                challenge_id: challenge.id,
                timing: ChallengeTiming::compute(
                    challenge.start_date,
                    challenge.end_date,
                    challenge.is_active,
                    today,
                ),
                name: challenge.name,
                start_date: challenge.start_date,
                end_date: challenge.end_date,
                is_active: challenge.is_active,
                participants_count: participation.participants,
                goals_count: participation.goals,
                avg_progress_percentage: metrics::average(progress),
            })
        })
        .collect()
}

/// Category counts and activity scores, ordered by popularity rank.
pub fn category_summaries(conn: &Connection) -> Result<Vec<CategorySummaryRow>, AppError> {
    let mut rows = Vec::new();
    for category in Category::find_all(conn)? {
        let counts = queries::category_activity(conn, category.id)?;
        rows.push(summary_row(category, counts));
    }

    rows.sort_by(|a, b| {
        b.activity_score
            .total_cmp(&a.activity_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    for (rank, row) in (1u32..).zip(rows.iter_mut()) {
        row.popularity_rank = rank;
    }
    Ok(rows)
}

fn summary_row(category: Category, counts: ActivityCounts) -> CategorySummaryRow {
    CategorySummaryRow {
        category_id: category.id,
        name: category.name,
        total_goals: counts.goals,
        total_habits: counts.habits,
        total_challenges: counts.challenges,
        unique_users: counts.users,
        activity_score: metrics::category_activity_score(&counts),
        popularity_rank: 0,
    }
}

// ── Rankings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserGoalRanking {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub achievements_count: u32,
    pub avg_progress_percent: f64,
    pub total_goals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserHabitRanking {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub habit_consistency_percent: f64,
    pub active_habits: u32,
    pub total_habits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSubscriberRanking {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub subscribers_count: u32,
    pub subscribing_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengePopularity {
    pub rank: u32,
    pub challenge_id: i64,
    pub name: String,
    pub participants_count: u32,
    pub goals_count: u32,
    pub is_active: bool,
    pub avg_progress_percent: f64,
}

/// Users by completed goals, then average goal progress.
pub fn users_by_completed_goals(conn: &Connection) -> Result<Vec<UserGoalRanking>, AppError> {
    let mut rows = user_progress(conn)?;
    rows.sort_by(|a, b| {
        b.completed_goals
            .cmp(&a.completed_goals)
            .then_with(|| b.avg_goal_progress.total_cmp(&a.avg_goal_progress))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    Ok((1u32..)
        .zip(rows)
        .map(|(rank, row)| UserGoalRanking {
            rank,
            user_id: row.user_id,
            username: row.username,
            achievements_count: row.completed_goals,
            avg_progress_percent: metrics::round1(row.avg_goal_progress),
            total_goals: row.total_goals,
        })
        .collect())
}

/// Users by average habit consistency.
pub fn users_by_habit_consistency(conn: &Connection) -> Result<Vec<UserHabitRanking>, AppError> {
    let mut rows = user_progress(conn)?;
    rows.sort_by(|a, b| {
        b.avg_habit_consistency
            .total_cmp(&a.avg_habit_consistency)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    Ok((1u32..)
        .zip(rows)
        .map(|(rank, row)| UserHabitRanking {
            rank,
            user_id: row.user_id,
            username: row.username,
            habit_consistency_percent: metrics::round1(row.avg_habit_consistency),
            active_habits: row.active_habits,
            total_habits: row.total_habits,
        })
        .collect())
}

/// Users by subscriber count.
pub fn users_by_subscribers(conn: &Connection) -> Result<Vec<UserSubscriberRanking>, AppError> {
    let mut rows = user_progress(conn)?;
    rows.sort_by(|a, b| {
        b.subscribers_count
            .cmp(&a.subscribers_count)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    Ok((1u32..)
        .zip(rows)
        .map(|(rank, row)| UserSubscriberRanking {
            rank,
            user_id: row.user_id,
            username: row.username,
            subscribers_count: row.subscribers_count,
            subscribing_count: row.subscribing_count,
        })
        .collect())
}

/// Challenges by participants, then enrolled goals.
pub fn challenges_by_popularity(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<ChallengePopularity>, AppError> {
    let mut rows = challenge_summaries(conn, today)?;
    rows.sort_by(|a, b| {
        b.participants_count
            .cmp(&a.participants_count)
            .then_with(|| b.goals_count.cmp(&a.goals_count))
            .then_with(|| a.challenge_id.cmp(&b.challenge_id))
    });
    Ok((1u32..)
        .zip(rows)
        .map(|(rank, row)| ChallengePopularity {
            rank,
            challenge_id: row.challenge_id,
            name: row.name,
            participants_count: row.participants_count,
            goals_count: row.goals_count,
            is_active: row.is_active,
            avg_progress_percent: metrics::round1(row.avg_progress_percentage),
        })
        .collect())
}

// ── Challenge leaderboards ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalLeaderboardEntry {
    pub rank: u32,
    pub goal_id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub target_value: f64,
    pub deadline: NaiveDate,
    pub is_completed: bool,
    pub completion_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLeaderboardEntry {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub best_completion_percent: f64,
    pub total_goals: u32,
    pub goals_with_progress: u32,
    pub goals_without_progress: u32,
}

/// Public goals of a challenge by completion percentage.
pub fn goal_leaderboard(
    conn: &Connection,
    challenge_id: i64,
) -> Result<Vec<GoalLeaderboardEntry>, AppError> {
    ensure_challenge(conn, challenge_id)?;
    let completion = queries::completion_by_goal(conn)?;
    let usernames = usernames(conn)?;

    let mut scored: Vec<(Goal, f64)> = queries::public_challenge_goals(conn, challenge_id)?
        .into_iter()
        .map(|goal| {
            let pct = completion.get(&goal.id).copied().unwrap_or_default();
            (goal, pct)
        })
        .collect();
    scored.sort_by(|(a, pa), (b, pb)| pb.total_cmp(pa).then_with(|| a.id.cmp(&b.id)));

    Ok((1u32..)
        .zip(scored)
        .map(|(rank, (goal, pct))| GoalLeaderboardEntry {
            rank,
            goal_id: goal.id,
            user_id: goal.user_id,
            username: usernames.get(&goal.user_id).cloned().unwrap_or_default(),
            title: goal.title,
            target_value: goal.target_value,
            deadline: goal.deadline,
            is_completed: goal.is_completed,
            completion_percent: metrics::round1(pct),
        })
        .collect())
}

#[derive(Default)]
struct LeaderTally {
    best: f64,
    total_goals: u32,
    goals_with_progress: u32,
}

/// Users of a challenge by their best public goal, then username.
pub fn user_leaderboard(
    conn: &Connection,
    challenge_id: i64,
) -> Result<Vec<UserLeaderboardEntry>, AppError> {
    ensure_challenge(conn, challenge_id)?;
    let completion = queries::completion_by_goal(conn)?;
    let with_progress = queries::goals_with_progress(conn)?;
    let usernames = usernames(conn)?;

    let mut tallies: HashMap<i64, LeaderTally> = HashMap::new();
    for goal in queries::public_challenge_goals(conn, challenge_id)? {
        let tally = tallies.entry(goal.user_id).or_default();
        tally.best = tally
            .best
            .max(completion.get(&goal.id).copied().unwrap_or_default());
        tally.total_goals += 1;
        if with_progress.get(&goal.id).copied().unwrap_or_default() {
            tally.goals_with_progress += 1;
        }
    }

    let mut entries: Vec<UserLeaderboardEntry> = tallies
        .into_iter()
        .map(|(user_id, tally)| UserLeaderboardEntry {
            rank: 0,
            user_id,
            username: usernames.get(&user_id).cloned().unwrap_or_default(),
            best_completion_percent: metrics::round1(tally.best),
            total_goals: tally.total_goals,
            goals_with_progress: tally.goals_with_progress,
            goals_without_progress: tally.total_goals.saturating_sub(tally.goals_with_progress),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.best_completion_percent
            .total_cmp(&a.best_completion_percent)
            .then_with(|| a.username.cmp(&b.username))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (rank, entry) in (1u32..).zip(entries.iter_mut()) {
        entry.rank = rank;
    }
    Ok(entries)
}

fn ensure_challenge(conn: &Connection, challenge_id: i64) -> Result<(), AppError> {
    match Challenge::find_by_id(conn, challenge_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Challenge")),
    }
}

fn usernames(conn: &Connection) -> Result<HashMap<i64, String>, AppError> {
    let mut stmt = conn.prepare("SELECT id, username FROM users")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

fn count_by_key(conn: &Connection, sql: &str) -> Result<HashMap<i64, u32>, AppError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

fn count_u32(n: usize) -> Result<u32, AppError> {
    u32::try_from(n).map_err(|_| AppError::Internal(format!("count {n} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::metrics::ChallengeStatus;
    use crate::models::{
        GoalChallenge, GoalProgress, HabitLog, LogStatus, NewGoalProgress, NewHabitLog, Subscription,
    };
    use crate::test_utils::{
        date, new_challenge, new_goal, new_habit, new_user, seed_owner, setup_test_db,
    };

    fn snapshot(conn: &Connection, goal_id: i64, value: f64) {
        GoalProgress::create(
            conn,
            &NewGoalProgress {
                goal_id,
                progress_date: date(2024, 1, 2),
                current_value: value,
                notes: None,
            },
        )
        .unwrap();
    }

    fn log(conn: &Connection, habit_id: i64, day: u32, status: LogStatus) {
        HabitLog::create(
            conn,
            &NewHabitLog {
                habit_id,
                log_date: date(2024, 1, day),
                status,
                notes: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_user_progress_for_user_without_activity() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        User::create(conn, &new_user("idle")).unwrap();

        let rows = user_progress(conn).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_goals, 0);
        assert_eq!(row.avg_goal_progress, 0.0);
        assert_eq!(row.avg_habit_consistency, 0.0);
        assert_eq!(row.subscribers_count, 0);
    }

    #[test]
    fn test_user_progress_aggregates_goals_habits_and_subscriptions() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let (bob, _) = seed_owner(conn, "bob");

        let g1 = Goal::create(conn, &new_goal(alice, category_id, "G1", 100.0)).unwrap();
        let mut done = new_goal(alice, category_id, "G2", 10.0);
        done.is_completed = true;
        let g2 = Goal::create(conn, &done).unwrap();
        snapshot(conn, g1.id, 50.0);
        snapshot(conn, g2.id, 10.0);

        let h1 = Habit::create(conn, &new_habit(alice, category_id, "H1")).unwrap();
        let mut h2 = Habit::create(conn, &new_habit(alice, category_id, "H2")).unwrap();
        h2.is_active = false;
        h2.update(conn).unwrap();
        log(conn, h1.id, 1, LogStatus::Completed);
        log(conn, h1.id, 2, LogStatus::Failed);

        Subscription::create(conn, bob, alice).unwrap();

        let rows = user_progress(conn).unwrap();
        let alice_row = rows.iter().find(|r| r.user_id == alice).unwrap();
        assert_eq!(alice_row.total_goals, 2);
        assert_eq!(alice_row.completed_goals, 1);
        assert!((alice_row.avg_goal_progress - 75.0).abs() < 1e-9);
        assert_eq!(alice_row.total_habits, 2);
        assert_eq!(alice_row.active_habits, 1);
        assert!((alice_row.avg_habit_consistency - 25.0).abs() < 1e-9);
        assert_eq!(alice_row.subscribers_count, 1);
        assert_eq!(alice_row.subscribing_count, 0);

        let bob_row = rows.iter().find(|r| r.user_id == bob).unwrap();
        assert_eq!(bob_row.subscribing_count, 1);
    }

    #[test]
    fn test_challenge_summary_uses_public_goals() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let (bob, _) = seed_owner(conn, "bob");
        let challenge =
            Challenge::create(conn, &new_challenge("Jan", date(2024, 1, 1), date(2024, 1, 10))).unwrap();
        let empty =
            Challenge::create(conn, &new_challenge("Feb", date(2024, 2, 1), date(2024, 2, 10))).unwrap();

        let public = Goal::create(conn, &new_goal(alice, category_id, "Public", 100.0)).unwrap();
        let mut hidden = new_goal(bob, category_id, "Hidden", 100.0);
        hidden.is_public = false;
        let hidden = Goal::create(conn, &hidden).unwrap();
        snapshot(conn, public.id, 40.0);
        snapshot(conn, hidden.id, 100.0);
        GoalChallenge::create(conn, public.id, challenge.id).unwrap();
        GoalChallenge::create(conn, hidden.id, challenge.id).unwrap();

        let rows = challenge_summaries(conn, date(2024, 1, 5)).unwrap();
        let jan = rows.iter().find(|r| r.challenge_id == challenge.id).unwrap();
        assert_eq!(jan.participants_count, 1);
        assert_eq!(jan.goals_count, 1);
        assert!((jan.avg_progress_percentage - 40.0).abs() < 1e-9);
        assert_eq!(jan.timing.days_passed, 5);
        assert_eq!(jan.timing.status, ChallengeStatus::Active);

        let feb = rows.iter().find(|r| r.challenge_id == empty.id).unwrap();
        assert_eq!(feb.goals_count, 0);
        assert_eq!(feb.avg_progress_percentage, 0.0);
        assert_eq!(feb.timing.status, ChallengeStatus::NotStarted);

        let participation = queries::challenge_participation(conn, challenge.id).unwrap();
        assert_eq!(participation.participants, jan.participants_count);
        assert_eq!(participation.goals, jan.goals_count);
    }

    #[test]
    fn test_category_popularity_rank() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, busy) = seed_owner(conn, "alice");
        let quiet_b = Category::create(conn, "B quiet", None).unwrap();
        let quiet_a = Category::create(conn, "A quiet", None).unwrap();
        Goal::create(conn, &new_goal(alice, busy, "G", 10.0)).unwrap();
        Habit::create(conn, &new_habit(alice, busy, "H")).unwrap();

        let rows = category_summaries(conn).unwrap();
        let order: Vec<i64> = rows.iter().map(|r| r.category_id).collect();
        assert_eq!(order, vec![busy, quiet_a.id, quiet_b.id]);
        let ranks: Vec<u32> = rows.iter().map(|r| r.popularity_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!((rows[0].activity_score - (1.0 + 0.8 + 0.5)).abs() < 1e-9);
        assert_eq!(rows[0].unique_users, 1);
    }

    #[test]
    fn test_rankings_are_one_based_with_id_tie_break() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let (bob, _) = seed_owner(conn, "bob");
        let (carol, _) = seed_owner(conn, "carol");
        let mut done = new_goal(carol, category_id, "Done", 10.0);
        done.is_completed = true;
        Goal::create(conn, &done).unwrap();
        Subscription::create(conn, alice, bob).unwrap();
        Subscription::create(conn, carol, bob).unwrap();

        let by_goals = users_by_completed_goals(conn).unwrap();
        let ids: Vec<i64> = by_goals.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![carol, alice, bob]);
        assert_eq!(by_goals[0].rank, 1);

        let by_subs = users_by_subscribers(conn).unwrap();
        assert_eq!(by_subs[0].user_id, bob);
        assert_eq!(by_subs[0].subscribers_count, 2);
        let ranks: Vec<u32> = by_subs.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        let by_habits = users_by_habit_consistency(conn).unwrap();
        let ids: Vec<i64> = by_habits.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![alice, bob, carol]);
    }

    #[test]
    fn test_challenges_by_popularity() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let quiet =
            Challenge::create(conn, &new_challenge("Quiet", date(2024, 1, 1), date(2024, 1, 10))).unwrap();
        let busy =
            Challenge::create(conn, &new_challenge("Busy", date(2024, 1, 1), date(2024, 1, 10))).unwrap();
        let goal = Goal::create(conn, &new_goal(alice, category_id, "G", 10.0)).unwrap();
        GoalChallenge::create(conn, goal.id, busy.id).unwrap();

        let rows = challenges_by_popularity(conn, date(2024, 1, 5)).unwrap();
        assert_eq!(rows[0].challenge_id, busy.id);
        assert_eq!(rows[0].participants_count, 1);
        assert_eq!(rows[1].challenge_id, quiet.id);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn test_leaderboards() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let (bob, _) = seed_owner(conn, "bob");
        let challenge =
            Challenge::create(conn, &new_challenge("Jan", date(2024, 1, 1), date(2024, 1, 31))).unwrap();

        let a1 = Goal::create(conn, &new_goal(alice, category_id, "A1", 100.0)).unwrap();
        let a2 = Goal::create(conn, &new_goal(alice, category_id, "A2", 100.0)).unwrap();
        let b1 = Goal::create(conn, &new_goal(bob, category_id, "B1", 100.0)).unwrap();
        snapshot(conn, a1.id, 30.0);
        snapshot(conn, b1.id, 80.0);
        for goal in [&a1, &a2, &b1] {
            GoalChallenge::create(conn, goal.id, challenge.id).unwrap();
        }

        let goals = goal_leaderboard(conn, challenge.id).unwrap();
        let order: Vec<i64> = goals.iter().map(|g| g.goal_id).collect();
        assert_eq!(order, vec![b1.id, a1.id, a2.id]);
        assert_eq!(goals[0].username, "bob");
        assert_eq!(goals[0].completion_percent, 80.0);

        let users = user_leaderboard(conn, challenge.id).unwrap();
        assert_eq!(users[0].user_id, bob);
        assert_eq!(users[1].user_id, alice);
        assert_eq!(users[1].total_goals, 2);
        assert_eq!(users[1].goals_with_progress, 1);
        assert_eq!(users[1].goals_without_progress, 1);
        assert_eq!(users[1].rank, 2);

        assert!(matches!(
            goal_leaderboard(conn, 999).unwrap_err(),
            AppError::NotFound { .. }
        ));
    }
}
