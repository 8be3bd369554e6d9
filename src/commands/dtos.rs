// src/commands/dtos.rs

use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::models::{
    Category, Challenge, Goal, GoalProgress, Habit, HabitLog, LogStatus, NewChallenge,
    Subscription, User, UserRole,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Responses ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub description: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            description: user.description,
            role: user.role,
            is_active: user.is_active,
            is_public: user.is_public,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub target_value: f64,
    pub deadline: NaiveDate,
    pub is_completed: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        Self {
            id: goal.id,
            user_id: goal.user_id,
            title: goal.title,
            description: goal.description,
            category_id: goal.category_id,
            target_value: goal.target_value,
            deadline: goal.deadline,
            is_completed: goal.is_completed,
            is_public: goal.is_public,
            created_at: goal.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgressResponse {
    pub id: i64,
    pub goal_id: i64,
    pub progress_date: NaiveDate,
    pub current_value: f64,
    pub notes: Option<String>,
}

impl From<GoalProgress> for GoalProgressResponse {
    fn from(progress: GoalProgress) -> Self {
        Self {
            id: progress.id,
            goal_id: progress.goal_id,
            progress_date: progress.progress_date,
            current_value: progress.current_value,
            notes: progress.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub frequency_type: i32,
    pub frequency_value: i32,
    pub is_active: bool,
    pub is_public: bool,
}

impl From<Habit> for HabitResponse {
    fn from(habit: Habit) -> Self {
        Self {
            id: habit.id,
            user_id: habit.user_id,
            title: habit.title,
            description: habit.description,
            category_id: habit.category_id,
            frequency_type: habit.frequency_type,
            frequency_value: habit.frequency_value,
            is_active: habit.is_active,
            is_public: habit.is_public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitLogResponse {
    pub id: i64,
    pub habit_id: i64,
    pub log_date: NaiveDate,
    pub status: LogStatus,
    pub notes: Option<String>,
}

impl From<HabitLog> for HabitLogResponse {
    fn from(log: HabitLog) -> Self {
        Self {
            id: log.id,
            habit_id: log.habit_id,
            log_date: log.log_date,
            status: log.status,
            notes: log.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub category_ids: Vec<i64>,
}

impl ChallengeResponse {
    pub fn new(challenge: Challenge, category_ids: Vec<i64>) -> Self {
        Self {
            id: challenge.id,
            name: challenge.name,
            description: challenge.description,
            start_date: challenge.start_date,
            end_date: challenge.end_date,
            is_active: challenge.is_active,
            category_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionResponse {
    pub subscriber_id: i64,
    pub subscribing_id: i64,
    pub subscribed_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            subscriber_id: sub.subscriber_id,
            subscribing_id: sub.subscribing_id,
            subscribed_at: sub.subscribed_at,
        }
    }
}

// ── Requests ──────────────────────────────────────────────────────────

/// Partial user update; absent fields keep their value. Nullable text
/// fields take `Some(None)` to clear the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub target_value: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub is_completed: Option<bool>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateHabitRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub frequency_type: Option<i32>,
    pub frequency_value: Option<i32>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateGoalProgressRequest {
    pub progress_date: Option<NaiveDate>,
    pub current_value: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateHabitLogRequest {
    pub log_date: Option<NaiveDate>,
    pub status: Option<LogStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
pub struct UpdateChallengeRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

/// Read an explicit `null` as `Some(None)` so it can be told apart from an
/// absent field.
#[allow(clippy::option_option, reason = "absent keeps the value, null clears it")]
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Items to create in chunks of `batch_size`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest<T> {
    pub items: Vec<T>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl<T> BatchRequest<T> {
    pub fn new(items: Vec<T>, batch_size: usize) -> Self {
        Self { items, batch_size }
    }
}

/// A challenge to create along with the categories it covers.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChallengeWithCategories {
    #[serde(flatten)]
    pub challenge: NewChallenge,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

/// One follow edge to create.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NewSubscription {
    pub subscriber_id: i64,
    pub subscribing_id: i64,
}

fn default_batch_size() -> usize {
    crate::constants::DEFAULT_BATCH_SIZE
}

// ── Pagination ────────────────────────────────────────────────────────

/// Page size bounds applied to report listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

/// Limit/offset window over a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(skip)]
    pub limits: PageLimits,
}

impl Page {
    pub fn new(limit: Option<u32>, offset: u32) -> Self {
        Self {
            limit,
            offset,
            limits: PageLimits::default(),
        }
    }

    pub fn with_limits(self, limits: PageLimits) -> Self {
        Self { limits, ..self }
    }

    /// Requested limit, or the default, clamped to `1..=max_limit`.
    pub fn effective_limit(&self) -> u32 {
        let max = self.limits.max_limit.max(1);
        self.limit.unwrap_or(self.limits.default_limit).clamp(1, max)
    }

    pub fn apply<T>(&self, rows: Vec<T>) -> Paginated<T> {
        let count = rows.len();
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.effective_limit()).unwrap_or(usize::MAX);
        Paginated {
            count,
            results: rows.into_iter().skip(offset).take(limit).collect(),
        }
    }
}

/// One page of a listing and the size of the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub results: Vec<T>,
}
