use crate::database::profile::ProfileRepository;
use crate::database::recurring::{NewTemplate, RecurringTemplateRepository};
use crate::database::transaction::{NewTransaction, TransactionRepository};
use crate::database::xp_event::XpEventRepository;
use crate::error::app_error::AppError;
use crate::models::experience::{XpEvent, XpEventType};
use crate::models::profile::Profile;
use crate::models::recurring::RecurringTemplate;
use crate::models::transaction::{TodaySummaryResponse, Transaction};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

/// A fresh profile with the sign-up defaults.
pub fn blank_profile(id: Uuid) -> Profile {
    let now = Utc::now();
    Profile {
        id,
        current_level: 1,
        current_xp: 0,
        current_streak: 0,
        longest_streak: 0,
        last_login_date: None,
        total_xp_earned: 0,
        transactions_today_count: 0,
        last_transaction_date: None,
        timezone: "UTC".to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// In-memory stand-in for the Postgres repository, for service tests that
/// exercise orchestration rather than SQL.
#[derive(Default)]
pub struct MockRepository {
    pub templates: Vec<RecurringTemplate>,
    pub profile: Option<Profile>,
    pub events: Vec<XpEvent>,
    pub transactions: Mutex<Vec<Transaction>>,
    pub occurrences: Mutex<HashSet<(Uuid, NaiveDate)>>,
}

impl MockRepository {
    pub fn with_templates(templates: Vec<RecurringTemplate>) -> Self {
        Self {
            templates,
            ..Self::default()
        }
    }

    fn store_transaction(&self, new: &NewTransaction) -> Transaction {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            occurred_at: new.occurred_at,
            created_at: Utc::now(),
            amount: new.amount,
            notes: new.notes.clone(),
            recurring_template_id: new.recurring_template_id,
            details: new.details.clone(),
        };
        self.transactions.lock().unwrap().push(transaction.clone());
        transaction
    }
}

#[async_trait::async_trait]
impl RecurringTemplateRepository for MockRepository {
    async fn create_template(&self, new: &NewTemplate) -> Result<RecurringTemplate, AppError> {
        Ok(RecurringTemplate {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            amount: new.amount,
            notes: new.notes.clone(),
            details: new.details.clone(),
            frequency: new.frequency,
            day_of_week: new.day_of_week,
            day_of_month: new.day_of_month,
            start_date: new.start_date,
            end_date: new.end_date,
            total_occurrences: new.total_occurrences,
            is_paused: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn get_template(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<RecurringTemplate>, AppError> {
        Ok(self.templates.iter().find(|t| t.id == *id && t.user_id == *user_id).cloned())
    }

    async fn list_templates(&self, user_id: &Uuid, include_paused: bool) -> Result<Vec<RecurringTemplate>, AppError> {
        Ok(self
            .templates
            .iter()
            .filter(|t| t.user_id == *user_id && (include_paused || !t.is_paused))
            .cloned()
            .collect())
    }

    async fn update_template(&self, template: &RecurringTemplate) -> Result<RecurringTemplate, AppError> {
        Ok(template.clone())
    }

    async fn delete_template(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError> {
        Ok(self.templates.iter().any(|t| t.id == *id && t.user_id == *user_id))
    }

    async fn active_templates_in_range(
        &self,
        user_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RecurringTemplate>, AppError> {
        Ok(self
            .templates
            .iter()
            .filter(|t| {
                t.user_id == *user_id && !t.is_paused && t.start_date <= end && t.end_date.is_none_or(|template_end| template_end >= start)
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TransactionRepository for MockRepository {
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction, AppError> {
        Ok(self.store_transaction(new))
    }

    async fn get_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<Transaction>, AppError> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == *id && t.user_id == *user_id)
            .cloned())
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<Transaction, AppError> {
        Ok(transaction.clone())
    }

    async fn delete_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        let before = transactions.len();
        transactions.retain(|t| !(t.id == *id && t.user_id == *user_id));
        Ok(transactions.len() < before)
    }

    async fn list_by_date_range(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>, AppError> {
        let mut matching: Vec<Transaction> = self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == *user_id && t.occurred_at >= start && t.occurred_at <= end)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.created_at.cmp(&a.created_at)));
        Ok(matching)
    }

    async fn today_summary(&self, user_id: &Uuid, today: NaiveDate) -> Result<TodaySummaryResponse, AppError> {
        let transactions = self.transactions.lock().unwrap();
        let todays: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.user_id == *user_id && t.occurred_at == today)
            .collect();

        let expenses: Vec<&&Transaction> = todays
            .iter()
            .filter(|t| t.kind() == crate::models::transaction::TransactionKind::Expense)
            .collect();
        let incomes: Vec<&&Transaction> = todays
            .iter()
            .filter(|t| t.kind() == crate::models::transaction::TransactionKind::Income)
            .collect();

        Ok(TodaySummaryResponse {
            expense_total: expenses.iter().map(|t| t.amount).sum::<Decimal>(),
            expense_count: expenses.len() as i64,
            income_total: incomes.iter().map(|t| t.amount).sum::<Decimal>(),
            income_count: incomes.len() as i64,
            has_logged_today: !todays.is_empty(),
        })
    }

    async fn insert_occurrence(&self, new: &NewTransaction) -> Result<bool, AppError> {
        let template_id = new.recurring_template_id.expect("occurrences always carry a template id");
        let inserted = self.occurrences.lock().unwrap().insert((template_id, new.occurred_at));
        if inserted {
            self.store_transaction(new);
        }
        Ok(inserted)
    }
}

#[async_trait::async_trait]
impl ProfileRepository for MockRepository {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.profile.clone().filter(|p| p.id == *user_id))
    }

    async fn create_profile(&self, user_id: &Uuid) -> Result<Profile, AppError> {
        Ok(blank_profile(*user_id))
    }

    async fn update_timezone(&self, user_id: &Uuid, timezone: &str) -> Result<Profile, AppError> {
        let mut profile = self
            .profile
            .clone()
            .filter(|p| p.id == *user_id)
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        profile.timezone = timezone.to_string();
        Ok(profile)
    }
}

#[async_trait::async_trait]
impl XpEventRepository for MockRepository {
    async fn list_events(&self, user_id: &Uuid, limit: i64, offset: i64) -> Result<Vec<XpEvent>, AppError> {
        let mut events: Vec<XpEvent> = self.events.iter().filter(|e| e.user_id == *user_id).cloned().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn count_events(&self, user_id: &Uuid) -> Result<i64, AppError> {
        Ok(self.events.iter().filter(|e| e.user_id == *user_id).count() as i64)
    }

    async fn find_milestone_event(&self, user_id: &Uuid, days: i32) -> Result<Option<XpEvent>, AppError> {
        let needle = format!("{days}-day");
        Ok(self
            .events
            .iter()
            .find(|e| e.user_id == *user_id && e.event_type == XpEventType::StreakMilestone && e.description.contains(&needle))
            .cloned())
    }

    async fn find_financial_goal_events(&self, user_id: &Uuid, month: u32, year: i32) -> Result<Vec<XpEvent>, AppError> {
        let needle = format!("{month}/{year}");
        Ok(self
            .events
            .iter()
            .filter(|e| e.user_id == *user_id && e.event_type == XpEventType::FinancialGoal && e.description.contains(&needle))
            .cloned()
            .collect())
    }
}
