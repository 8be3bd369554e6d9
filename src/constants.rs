// src/constants.rs

/// Category activity score weight per goal
pub const GOAL_WEIGHT: f64 = 1.0;

/// Category activity score weight per habit
pub const HABIT_WEIGHT: f64 = 0.8;

/// Category activity score weight per challenge
pub const CHALLENGE_WEIGHT: f64 = 1.5;

/// Category activity score weight per distinct user
pub const USER_WEIGHT: f64 = 0.5;

/// Default page size for reports and listings
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Minimum username length
pub const MIN_USERNAME_LEN: usize = 3;

/// Maximum username length
pub const MAX_USERNAME_LEN: usize = 50;

/// Maximum first/last name length
pub const MAX_PERSON_NAME_LEN: usize = 50;

/// Maximum category name length
pub const MAX_CATEGORY_NAME_LEN: usize = 100;

/// Maximum goal, habit and challenge title length
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum items accepted by one batch create call
pub const MAX_BATCH_ITEMS: usize = 10_000;

/// Maximum rows inserted per batch chunk
pub const MAX_BATCH_SIZE: usize = 5_000;

/// Default rows inserted per batch chunk
pub const DEFAULT_BATCH_SIZE: usize = 100;
