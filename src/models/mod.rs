pub mod user;
pub mod category;
pub mod goal;
pub mod habit;
pub mod challenge;
pub mod subscription;

pub use user::{NewUser, User, UserRole};
pub use category::{Category, NewCategory};
pub use goal::{Goal, GoalProgress, NewGoal, NewGoalProgress};
pub use habit::{Habit, HabitLog, LogStatus, NewHabit, NewHabitLog};
pub use challenge::{Challenge, ChallengeCategory, GoalChallenge, NewChallenge};
pub use subscription::Subscription;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSqlError, ValueRef};

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whether listings include private rows or only public ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    PublicOnly,
    All,
}

impl Visibility {
    pub(crate) fn public_only(self) -> bool {
        matches!(self, Visibility::PublicOnly)
    }
}

/// Parse a TEXT column into an enum implementing `FromStr`.
pub(crate) fn parse_text_enum<T>(value: ValueRef<'_>) -> Result<T, FromSqlError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .as_str()?
        .parse()
        .map_err(|e| FromSqlError::Other(Box::new(e)))
}

/// Error for a stored enum value that no variant matches.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
