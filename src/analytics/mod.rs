//! Derived metrics and aggregate views.

pub mod metrics;
pub mod queries;
pub mod views;

pub use metrics::{ActivityCounts, ChallengeStatus, ChallengeTiming};
pub use queries::Participation;
pub use views::{
    CategorySummaryRow, ChallengePopularity, ChallengeSummaryRow, GoalLeaderboardEntry,
    UserGoalRanking, UserHabitRanking, UserLeaderboardEntry, UserProgressRow, UserSubscriberRanking,
};
