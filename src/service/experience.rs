use crate::database::postgres_repository::PostgresRepository;
use crate::database::profile::{ProfileRepository, profile_for_update, store_gamification_counters};
use crate::database::xp_event::{XpEventRepository, append_event, milestone_event_exists};
use crate::dates;
use crate::error::app_error::AppError;
use crate::models::experience::{
    CheckInResponse, ExperienceHistoryResponse, ExperienceStatusResponse, MilestoneReached, StreakMilestone,
    StreakMilestonesResponse, XpDelta, XpEvent, XpEventResponse, XpEventType,
};
use crate::models::profile::Profile;
use chrono::NaiveDate;
use uuid::Uuid;

/// Streak lengths with a one-time XP bonus, ascending.
pub const STREAK_MILESTONES: [(i32, i32); 8] = [
    (7, 50),
    (14, 75),
    (30, 150),
    (60, 250),
    (100, 400),
    (150, 500),
    (200, 600),
    (365, 1000),
];

pub const DAILY_LOGIN_XP: i32 = 15;
pub const TRANSACTION_XP: i32 = 3;
pub const TRANSACTION_DAILY_LIMIT: i32 = 5;
const INACTIVITY_PENALTY_STEP: i32 = 15;

// ==================== Level math ====================

fn cumulative_xp(level: i64) -> i64 {
    if level <= 1 { 0 } else { 5 * (level - 1) * level }
}

/// Total XP needed to reach a level. Going from level L to L+1 costs L*10, so
/// the cumulative cost of level L is 5*(L-1)*L.
pub fn total_xp_for_level(level: i32) -> i32 {
    cumulative_xp(level as i64) as i32
}

pub fn xp_for_next_level(level: i32) -> i32 {
    level * 10
}

/// The largest L with 5*(L-1)*L <= xp. The closed form goes through a square
/// root, so the result is nudged onto the exact integer boundary afterwards.
pub fn level_from_xp(xp: i32) -> i32 {
    if xp <= 0 {
        return 1;
    }
    let xp = xp as i64;
    let mut level = (((-1.0 + (1.0 + 0.8 * xp as f64).sqrt()) / 2.0).floor() as i64).max(0) + 1;
    while cumulative_xp(level + 1) <= xp {
        level += 1;
    }
    while level > 1 && cumulative_xp(level) > xp {
        level -= 1;
    }
    level as i32
}

pub fn evolution_stage(level: i32) -> &'static str {
    match level {
        ..=5 => "Baby",
        6..=15 => "Young",
        16..=30 => "Adult",
        31..=50 => "Prime",
        _ => "Legendary",
    }
}

pub fn milestone_reward(days: i32) -> Option<i32> {
    STREAK_MILESTONES.iter().find(|(d, _)| *d == days).map(|(_, xp)| *xp)
}

// ==================== Check-in state machine (pure) ====================

/// What a check-in will do, decided before anything is written.
#[derive(Debug)]
pub enum CheckInPlan {
    AlreadyCheckedIn,
    Proceed {
        penalties: Vec<XpDelta>,
        streak_broken: bool,
        login_bonus: XpDelta,
        /// Streak milestone hit by this check-in; awarded only if the ledger
        /// has no prior event for it.
        milestone_candidate: Option<(i32, XpDelta)>,
        new_streak: i32,
    },
}

/// One penalty event per missed day, growing by 15 XP per day.
pub fn inactivity_penalties(days_missed: i64) -> Vec<XpDelta> {
    (1..=days_missed)
        .map(|day| XpDelta {
            xp_amount: -(INACTIVITY_PENALTY_STEP * day as i32),
            event_type: XpEventType::InactivityPenalty,
            description: format!("Missed day {day} of inactivity"),
        })
        .collect()
}

pub fn plan_check_in(profile: &Profile, today: NaiveDate) -> CheckInPlan {
    if profile.last_login_date == Some(today) {
        return CheckInPlan::AlreadyCheckedIn;
    }

    let days_missed = profile
        .last_login_date
        .map(|last| (today - last).num_days() - 1)
        .unwrap_or(0);
    let penalties = if days_missed > 0 { inactivity_penalties(days_missed) } else { Vec::new() };
    let streak_broken = !penalties.is_empty();

    let new_streak = if streak_broken { 1 } else { profile.current_streak + 1 };

    let milestone_candidate = milestone_reward(new_streak).map(|reward| {
        (
            new_streak,
            XpDelta {
                xp_amount: reward,
                event_type: XpEventType::StreakMilestone,
                description: format!("{new_streak}-day streak bonus"),
            },
        )
    });

    CheckInPlan::Proceed {
        penalties,
        streak_broken,
        login_bonus: XpDelta {
            xp_amount: DAILY_LOGIN_XP,
            event_type: XpEventType::DailyLogin,
            description: "Daily check-in".to_string(),
        },
        milestone_candidate,
        new_streak,
    }
}

/// Apply an XP delta to the profile counters. Penalties floor at zero and do
/// not reduce `total_xp_earned`.
pub fn apply_xp(profile: &mut Profile, amount: i32) {
    profile.current_xp = (profile.current_xp + amount).max(0);
    if amount > 0 {
        profile.total_xp_earned += amount;
    }
    profile.current_level = level_from_xp(profile.current_xp);
}

// ==================== Check-in (transactional) ====================

fn already_checked_in_response(profile: &Profile) -> CheckInResponse {
    CheckInResponse {
        xp_awarded: 0,
        new_total_xp: profile.current_xp,
        new_level: profile.current_level,
        level_up: false,
        previous_level: None,
        streak_incremented: false,
        new_streak: profile.current_streak,
        streak_broken: false,
        inactivity_penalties: Vec::new(),
        milestone_reached: None,
        message: "Already checked in today".to_string(),
    }
}

/// Daily check-in. Penalty events precede the login bonus, the milestone (if
/// any) follows it, and the profile mutation commits atomically with all of
/// them. `last_login_date` is derived from the server clock in the profile's
/// timezone; the client never supplies it.
pub async fn check_in(repo: &PostgresRepository, user_id: &Uuid) -> Result<CheckInResponse, AppError> {
    let mut tx = repo.pool.begin().await?;

    let mut profile = profile_for_update(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let today = dates::today_in(&profile.timezone);
    let previous_level = profile.current_level;

    let plan = plan_check_in(&profile, today);
    let CheckInPlan::Proceed {
        penalties,
        streak_broken,
        login_bonus,
        milestone_candidate,
        new_streak,
    } = plan
    else {
        tx.rollback().await?;
        return Ok(already_checked_in_response(&profile));
    };

    let mut penalty_events = Vec::with_capacity(penalties.len());
    for penalty in &penalties {
        let event = append_event(&mut tx, user_id, penalty).await?;
        apply_xp(&mut profile, penalty.xp_amount);
        penalty_events.push(XpEventResponse::from(&event));
    }
    if streak_broken {
        profile.current_streak = 0;
    }

    append_event(&mut tx, user_id, &login_bonus).await?;
    apply_xp(&mut profile, login_bonus.xp_amount);

    profile.current_streak = new_streak;
    profile.longest_streak = profile.longest_streak.max(profile.current_streak);

    let mut milestone_reached = None;
    if let Some((days, bonus)) = milestone_candidate
        && !milestone_event_exists(&mut tx, user_id, days).await?
    {
        append_event(&mut tx, user_id, &bonus).await?;
        apply_xp(&mut profile, bonus.xp_amount);
        milestone_reached = Some(MilestoneReached {
            days,
            xp_reward: bonus.xp_amount,
        });
    }

    profile.last_login_date = Some(today);
    let level_up = profile.current_level > previous_level;

    store_gamification_counters(&mut tx, &profile).await?;
    tx.commit().await?;

    Ok(CheckInResponse {
        xp_awarded: DAILY_LOGIN_XP,
        new_total_xp: profile.current_xp,
        new_level: profile.current_level,
        level_up,
        previous_level: level_up.then_some(previous_level),
        streak_incremented: !streak_broken,
        new_streak: profile.current_streak,
        streak_broken,
        inactivity_penalties: penalty_events,
        milestone_reached,
        message: format!("Welcome back! +{DAILY_LOGIN_XP} XP"),
    })
}

// ==================== Transaction XP ====================

/// Roll the per-day counter over on a day change and decide whether another
/// award still fits under the daily cap.
pub fn plan_transaction_xp(profile: &mut Profile, today: NaiveDate) -> bool {
    if profile.last_transaction_date != Some(today) {
        profile.transactions_today_count = 0;
        profile.last_transaction_date = Some(today);
    }
    profile.transactions_today_count < TRANSACTION_DAILY_LIMIT
}

/// +3 XP per logged transaction, capped at 5 per user-local day. Returns None
/// when the cap is hit. Callers treat failures as non-fatal: the transaction
/// write always survives.
pub async fn award_transaction_xp(repo: &PostgresRepository, user_id: &Uuid) -> Result<Option<i32>, AppError> {
    let mut tx = repo.pool.begin().await?;

    let mut profile = profile_for_update(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let today = dates::today_in(&profile.timezone);

    if !plan_transaction_xp(&mut profile, today) {
        // Persist the day rollover even when nothing is awarded.
        store_gamification_counters(&mut tx, &profile).await?;
        tx.commit().await?;
        return Ok(None);
    }

    let delta = XpDelta {
        xp_amount: TRANSACTION_XP,
        event_type: XpEventType::Transaction,
        description: "Logged transaction".to_string(),
    };
    append_event(&mut tx, user_id, &delta).await?;
    apply_xp(&mut profile, delta.xp_amount);
    profile.transactions_today_count += 1;

    store_gamification_counters(&mut tx, &profile).await?;
    tx.commit().await?;

    Ok(Some(TRANSACTION_XP))
}

// ==================== Status / history / milestones ====================

pub async fn status(repo: &PostgresRepository, user_id: &Uuid) -> Result<ExperienceStatusResponse, AppError> {
    let mut tx = repo.pool.begin().await?;

    let mut profile = profile_for_update(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let today = dates::today_in(&profile.timezone);

    // Roll the daily transaction counter over when the local day has changed.
    if profile.last_transaction_date != Some(today) {
        profile.transactions_today_count = 0;
        profile.last_transaction_date = Some(today);
        store_gamification_counters(&mut tx, &profile).await?;
    }
    tx.commit().await?;

    Ok(ExperienceStatusResponse {
        user_id: *user_id,
        current_level: profile.current_level,
        current_xp: profile.current_xp,
        xp_for_next_level: xp_for_next_level(profile.current_level),
        total_xp_for_current_level: total_xp_for_level(profile.current_level),
        evolution_stage: evolution_stage(profile.current_level),
        current_streak: profile.current_streak,
        longest_streak: profile.longest_streak,
        last_login_date: profile.last_login_date,
        transactions_today_count: profile.transactions_today_count,
        transactions_daily_limit: TRANSACTION_DAILY_LIMIT,
    })
}

pub async fn history<R>(repo: &R, user_id: &Uuid, limit: i64, offset: i64) -> Result<ExperienceHistoryResponse, AppError>
where
    R: XpEventRepository + Sync,
{
    let events = repo.list_events(user_id, limit, offset).await?;
    let total_count = repo.count_events(user_id).await?;

    Ok(ExperienceHistoryResponse {
        events: events.iter().map(XpEventResponse::from).collect(),
        total_count,
        has_more: offset + limit < total_count,
    })
}

pub async fn milestones<R>(repo: &R, user_id: &Uuid) -> Result<StreakMilestonesResponse, AppError>
where
    R: ProfileRepository + XpEventRepository + Sync,
{
    let profile = repo
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let mut milestones = Vec::with_capacity(STREAK_MILESTONES.len());
    for (days, xp_reward) in STREAK_MILESTONES {
        let achieved = repo.find_milestone_event(user_id, days).await?;
        milestones.push(match achieved {
            Some(event) => StreakMilestone {
                days,
                xp_reward,
                achieved: true,
                achieved_at: Some(event.created_at),
                days_remaining: None,
            },
            None => StreakMilestone {
                days,
                xp_reward,
                achieved: false,
                achieved_at: None,
                days_remaining: Some((days - profile.current_streak).max(0)),
            },
        });
    }

    Ok(StreakMilestonesResponse {
        current_streak: profile.current_streak,
        milestones,
    })
}

// ==================== Financial goal XP ====================

/// Hook for per-month savings/investment goal bonuses. The idempotence
/// plumbing is in place, but goal evaluation is not wired up yet, so no
/// awards are made.
pub async fn award_financial_goal_xp<R>(repo: &R, user_id: &Uuid, year: i32, month: u32) -> Result<Vec<XpEvent>, AppError>
where
    R: XpEventRepository + Sync,
{
    let existing = repo.find_financial_goal_events(user_id, month, year).await?;
    if !existing.is_empty() {
        return Ok(Vec::new());
    }

    Ok(Vec::new())
}
