use super::{Auditable, AuditedTable};
use crate::error::AppError;
use crate::models::{
    Category, Challenge, ChallengeCategory, Goal, GoalChallenge, GoalProgress, Habit, HabitLog,
    Subscription, User,
};
use rusqlite::Connection;
use serde_json::Value;

macro_rules! keyed {
    ($($ty:ty => $table:ident),* $(,)?) => {
        $(
            impl Auditable for $ty {
                const TABLE: AuditedTable = AuditedTable::$table;

                fn record_id(&self) -> Option<i64> {
                    Some(self.id)
                }
            }
        )*
    };
}

macro_rules! composite {
    ($($ty:ty => $table:ident),* $(,)?) => {
        $(
            impl Auditable for $ty {
                const TABLE: AuditedTable = AuditedTable::$table;

                fn record_id(&self) -> Option<i64> {
                    None
                }
            }
        )*
    };
}

keyed! {
    User => Users,
    Category => Categories,
    Goal => Goals,
    GoalProgress => GoalProgresses,
    Habit => Habits,
    HabitLog => HabitLogs,
    Challenge => Challenges,
}

composite! {
    GoalChallenge => GoalChallenges,
    ChallengeCategory => ChallengeCategories,
    Subscription => Subscriptions,
}

/// Current snapshot of an audited row, looked up by table and id.
///
/// Returns `None` when the row is gone or the table has no single-column key.
pub fn snapshot_current(
    conn: &Connection,
    table: AuditedTable,
    record_id: i64,
) -> Result<Option<Value>, AppError> {
    fn snap<T: Auditable>(row: Option<T>) -> Result<Option<Value>, AppError> {
        row.map(|r| r.snapshot()).transpose()
    }

    match table {
        AuditedTable::Users => snap(User::find_by_id(conn, record_id)?),
        AuditedTable::Categories => snap(Category::find_by_id(conn, record_id)?),
        AuditedTable::Goals => snap(Goal::find_by_id(conn, record_id)?),
        AuditedTable::GoalProgresses => snap(GoalProgress::find_by_id(conn, record_id)?),
        AuditedTable::Habits => snap(Habit::find_by_id(conn, record_id)?),
        AuditedTable::HabitLogs => snap(HabitLog::find_by_id(conn, record_id)?),
        AuditedTable::Challenges => snap(Challenge::find_by_id(conn, record_id)?),
        AuditedTable::GoalChallenges
        | AuditedTable::ChallengeCategories
        | AuditedTable::Subscriptions => Ok(None),
    }
}
