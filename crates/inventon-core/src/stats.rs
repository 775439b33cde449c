//! Day-bucketed counters and the metrics derived from them.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use inventon_types::models::{
    AnswerFilter, Counter, DailyCounterSet, ResponseTimeFilter, Ticket, TicketFilter, TicketStatus,
    format_timestamp, parse_timestamp,
};
use inventon_types::{Error, RecordStore, Result};

pub const PENDING_ALERT_THRESHOLD: u64 = 5;
pub const SOLVE_RATE_ALERT_THRESHOLD: f64 = 70.0;
pub const RESPONSE_TIME_ALERT_MINUTES: f64 = 1440.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Week,
    Month,
    Quarter,
    All,
}

impl Period {
    /// Lookback window, `None` for all time.
    pub fn window_days(&self) -> Option<i64> {
        match self {
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::Quarter => Some(90),
            Self::All => None,
        }
    }

    /// Denominator for the daily average. All-time averages over a year.
    fn average_divisor(&self) -> i64 {
        self.window_days().unwrap_or(365)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "all" => Ok(Self::All),
            other => Err(Error::validation(format!(
                "unknown period '{}' (expected week, month, quarter or all)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub period: Period,
    pub total: u64,
    pub solved: u64,
    pub solve_rate: f64,
    pub avg_daily: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveBand {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityBand {
    Active,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendLabel {
    pub solve: SolveBand,
    pub activity: ActivityBand,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let solve = match self.solve {
            SolveBand::High => "high",
            SolveBand::Moderate => "moderate",
            SolveBand::Low => "low",
        };
        let activity = match self.activity {
            ActivityBand::Active => "active",
            ActivityBand::Moderate => "moderate",
            ActivityBand::Low => "low",
        };
        write!(f, "{} solve rate, {} activity", solve, activity)
    }
}

pub fn trend_label(summary: &Summary) -> TrendLabel {
    let solve = if summary.solve_rate >= 80.0 {
        SolveBand::High
    } else if summary.solve_rate >= 60.0 {
        SolveBand::Moderate
    } else {
        SolveBand::Low
    };
    let activity = if summary.avg_daily >= 5.0 {
        ActivityBand::Active
    } else if summary.avg_daily >= 1.0 {
        ActivityBand::Moderate
    } else {
        ActivityBand::Low
    };
    TrendLabel { solve, activity }
}

/// A summary together with its banding, as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    #[serde(flatten)]
    pub summary: Summary,
    pub trend: TrendLabel,
}

impl From<Summary> for SummaryReport {
    fn from(summary: Summary) -> Self {
        let trend = trend_label(&summary);
        Self { summary, trend }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub total: u64,
    pub solved: u64,
    pub active: u64,
    pub solve_rate: f64,
    pub top_languages: Vec<LanguageCount>,
    pub first_ticket_at: Option<String>,
    pub last_ticket_at: Option<String>,
    pub avg_response_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub open: u64,
    pub in_progress: u64,
    pub solved: u64,
    pub closed: u64,
}

impl StatusCounts {
    fn tally(tickets: &[Ticket]) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            match ticket.status {
                TicketStatus::Open => counts.open += 1,
                TicketStatus::InProgress => counts.in_progress += 1,
                TicketStatus::Solved => counts.solved += 1,
                TicketStatus::Closed => counts.closed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentActivity {
    pub questions: u64,
    pub answers: u64,
    pub solved: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_tickets: u64,
    pub by_status: StatusCounts,
    pub solve_rate: f64,
    pub total_users: u64,
    pub active_users_30d: u64,
    pub new_users_week: i64,
    pub faq_searches_week: i64,
    pub total_answers: u64,
    pub top_languages: Vec<LanguageCount>,
    pub last_7_days: RecentActivity,
    pub total_faq: u64,
    pub avg_response_minutes_30d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    PendingBacklog { pending: u64 },
    LowSolveRate { solve_rate: f64 },
    SlowResponse { avg_minutes: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: DailyCounterSet,
    pub week: SummaryReport,
    pub pending: u64,
    pub in_progress: u64,
    pub total_users: u64,
    pub total_faq: u64,
    pub top_languages_week: Vec<LanguageCount>,
    pub overall_solve_rate: f64,
    pub avg_response_minutes: f64,
    pub alerts: Vec<Alert>,
}

#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn RecordStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Adds `by` to today's bucket and returns the new value.
    pub fn increment(&self, counter: Counter, by: i64) -> Result<i64> {
        let value = self.store.upsert_counter(today(), counter, by)?;
        debug!("{} -> {}", counter.column(), value);
        Ok(value)
    }

    pub fn summary(&self, period: Period) -> Result<Summary> {
        let tickets = self.store.scan_tickets(&TicketFilter {
            created_since: period.window_days().map(|days| format_timestamp(days_ago(days))),
            ..Default::default()
        })?;

        let total = tickets.len() as u64;
        let solved = count_status(&tickets, TicketStatus::Solved);
        Ok(Summary {
            period,
            total,
            solved,
            solve_rate: percent(solved, total),
            avg_daily: ratio(total as f64, period.average_divisor() as f64),
        })
    }

    pub fn per_user(&self, user_id: i64) -> Result<UserStats> {
        let tickets = self.store.scan_tickets(&TicketFilter {
            owner_id: Some(user_id),
            ..Default::default()
        })?;

        let total = tickets.len() as u64;
        let solved = count_status(&tickets, TicketStatus::Solved);
        let active = tickets.iter().filter(|t| t.status.is_active()).count() as u64;

        let solved_ids: Vec<i64> = tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Solved)
            .map(|t| t.id)
            .collect();
        let avg_response_minutes = if solved_ids.is_empty() {
            None
        } else {
            let samples = self.store.scan_response_times(&ResponseTimeFilter {
                ticket_ids: Some(solved_ids),
                ..Default::default()
            })?;
            mean(samples.iter().map(|s| s.minutes))
        };

        Ok(UserStats {
            user_id,
            total,
            solved,
            active,
            solve_rate: percent(solved, total),
            top_languages: top_languages(&tickets, 3),
            // Scan is newest-first.
            first_ticket_at: tickets.last().map(|t| t.created_at.clone()),
            last_ticket_at: tickets.first().map(|t| t.created_at.clone()),
            avg_response_minutes,
        })
    }

    /// Mean response time over samples recorded in the last `days` days, 0 when empty.
    pub fn average_response_minutes(&self, days: i64) -> Result<f64> {
        let samples = self.store.scan_response_times(&ResponseTimeFilter {
            created_since: Some(format_timestamp(days_ago(days))),
            ..Default::default()
        })?;
        Ok(mean(samples.iter().map(|s| s.minutes)).unwrap_or(0.0))
    }

    pub fn overview(&self) -> Result<Overview> {
        let tickets = self.store.scan_tickets(&TicketFilter::default())?;
        let by_status = StatusCounts::tally(&tickets);
        let total_tickets = tickets.len() as u64;

        let month_ago = days_ago(30);
        let week_ago = days_ago(7);

        let active_users_30d = tickets
            .iter()
            .filter(|t| at_or_after(&t.created_at, month_ago))
            .map(|t| t.owner_id)
            .collect::<HashSet<_>>()
            .len() as u64;

        let week_counters = self.store.daily_counters(today() - TimeDelta::days(6))?;
        let week_total =
            |counter: Counter| -> i64 { week_counters.iter().map(|d| d.get(counter)).sum() };

        let total_answers = self.store.scan_answers(&AnswerFilter::default())?.len() as u64;
        let answers_week = self
            .store
            .scan_answers(&AnswerFilter {
                created_since: Some(format_timestamp(week_ago)),
                ..Default::default()
            })?
            .len() as u64;

        let last_7_days = RecentActivity {
            questions: tickets
                .iter()
                .filter(|t| at_or_after(&t.created_at, week_ago))
                .count() as u64,
            answers: answers_week,
            solved: tickets
                .iter()
                .filter(|t| {
                    t.status == TicketStatus::Solved && at_or_after(&t.updated_at, week_ago)
                })
                .count() as u64,
        };

        Ok(Overview {
            total_tickets,
            solve_rate: percent(by_status.solved, total_tickets),
            by_status,
            total_users: self.store.count_users()?,
            active_users_30d,
            new_users_week: week_total(Counter::NewUsers),
            faq_searches_week: week_total(Counter::FaqSearches),
            total_answers,
            top_languages: top_languages(&tickets, 5),
            last_7_days,
            total_faq: self.store.list_faq()?.len() as u64,
            avg_response_minutes_30d: self.average_response_minutes(30)?,
        })
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        let date = today();
        let today_counters = self
            .store
            .daily_counters(date)?
            .into_iter()
            .find(|d| d.date == date)
            .unwrap_or_else(|| DailyCounterSet {
                date,
                ..Default::default()
            });

        let week = self.summary(Period::Week)?;
        let all_tickets = self.store.scan_tickets(&TicketFilter::default())?;
        let by_status = StatusCounts::tally(&all_tickets);

        let week_ago = days_ago(7);
        let week_tickets: Vec<Ticket> = all_tickets
            .iter()
            .filter(|t| at_or_after(&t.created_at, week_ago))
            .cloned()
            .collect();

        let avg_response_minutes = self.average_response_minutes(30)?;
        let alerts = alerts_for(by_status.open, &week, avg_response_minutes);

        Ok(Dashboard {
            today: today_counters,
            week: week.into(),
            pending: by_status.open,
            in_progress: by_status.in_progress,
            total_users: self.store.count_users()?,
            total_faq: self.store.list_faq()?.len() as u64,
            top_languages_week: top_languages(&week_tickets, 3),
            overall_solve_rate: percent(by_status.solved, all_tickets.len() as u64),
            avg_response_minutes,
            alerts,
        })
    }
}

fn alerts_for(pending: u64, week: &Summary, avg_response_minutes: f64) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if pending > PENDING_ALERT_THRESHOLD {
        alerts.push(Alert::PendingBacklog { pending });
    }
    if week.total > 0 && week.solve_rate < SOLVE_RATE_ALERT_THRESHOLD {
        alerts.push(Alert::LowSolveRate {
            solve_rate: week.solve_rate,
        });
    }
    if avg_response_minutes > RESPONSE_TIME_ALERT_MINUTES {
        alerts.push(Alert::SlowResponse {
            avg_minutes: avg_response_minutes,
        });
    }
    alerts
}

/// Most frequent languages, ties kept in first-seen order.
fn top_languages(tickets: &[Ticket], n: usize) -> Vec<LanguageCount> {
    let mut counts: Vec<LanguageCount> = Vec::new();
    for ticket in tickets {
        match counts.iter_mut().find(|c| c.language == ticket.language) {
            Some(entry) => entry.count += 1,
            None => counts.push(LanguageCount {
                language: ticket.language.clone(),
                count: 1,
            }),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

fn count_status(tickets: &[Ticket], status: TicketStatus) -> u64 {
    tickets.iter().filter(|t| t.status == status).count() as u64
}

fn percent(part: u64, whole: u64) -> f64 {
    ratio(part as f64 * 100.0, whole as f64)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn mean(values: impl Iterator<Item = i64>) -> Option<f64> {
    let (sum, n) = values.fold((0i64, 0u64), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum as f64 / n as f64)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(days)
}

/// Unreadable timestamps fall outside every window.
fn at_or_after(raw: &str, cutoff: DateTime<Utc>) -> bool {
    parse_timestamp(raw).is_some_and(|ts| ts >= cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dyn_store, memory_store, seed_ticket};
    use std::thread;

    fn summary(solve_rate: f64, avg_daily: f64) -> Summary {
        Summary {
            period: Period::Week,
            total: 0,
            solved: 0,
            solve_rate,
            avg_daily,
        }
    }

    #[test]
    fn empty_window_summary_is_zero() {
        let stats = StatisticsAggregator::new(dyn_store(&memory_store()));
        for period in [Period::Week, Period::Month, Period::Quarter, Period::All] {
            let s = stats.summary(period).unwrap();
            assert_eq!(s.total, 0);
            assert_eq!(s.solve_rate, 0.0);
            assert_eq!(s.avg_daily, 0.0);
        }
    }

    #[test]
    fn summary_counts_solved_and_averages_over_window() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));
        for channel in 0..7 {
            let ticket = seed_ticket(&store, 1, 100 + channel, "Rust");
            if channel < 6 {
                store
                    .update_ticket_status(ticket.id, TicketStatus::Solved, &ticket.created_at)
                    .unwrap();
            }
        }

        let week = stats.summary(Period::Week).unwrap();
        assert_eq!(week.total, 7);
        assert_eq!(week.solved, 6);
        assert!((week.solve_rate - 600.0 / 7.0).abs() < 1e-9);
        assert_eq!(week.avg_daily, 1.0);

        let all = stats.summary(Period::All).unwrap();
        assert!((all.avg_daily - 7.0 / 365.0).abs() < 1e-9);
    }

    #[test]
    fn trend_label_bands() {
        let label = |rate, avg| trend_label(&summary(rate, avg));
        assert_eq!(label(80.0, 5.0).solve, SolveBand::High);
        assert_eq!(label(80.0, 5.0).activity, ActivityBand::Active);
        assert_eq!(label(79.9, 4.9).solve, SolveBand::Moderate);
        assert_eq!(label(60.0, 1.0).activity, ActivityBand::Moderate);
        assert_eq!(label(59.9, 0.9).solve, SolveBand::Low);
        assert_eq!(label(0.0, 0.0).activity, ActivityBand::Low);
    }

    #[test]
    fn parse_period() {
        assert_eq!("quarter".parse::<Period>().unwrap(), Period::Quarter);
        assert!(matches!("year".parse::<Period>(), Err(Error::Validation(_))));
    }

    #[test]
    fn concurrent_increments_do_not_lose_updates() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || stats.increment(Counter::QuestionsCreated, 1).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counters = store.daily_counters(today()).unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].questions_created, 2);
    }

    #[test]
    fn per_user_breaks_language_ties_by_first_seen() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));

        // Inserted oldest to newest; the scan sees them newest-first.
        seed_ticket(&store, 7, 1, "Go");
        seed_ticket(&store, 7, 2, "Python");
        seed_ticket(&store, 7, 3, "Rust");
        seed_ticket(&store, 7, 4, "Python");
        let solved = seed_ticket(&store, 7, 5, "Rust");
        store
            .update_ticket_status(solved.id, TicketStatus::Solved, &solved.created_at)
            .unwrap();
        store
            .insert_response_time(solved.id, 30, &solved.created_at)
            .unwrap();
        seed_ticket(&store, 8, 6, "Java");

        let user = stats.per_user(7).unwrap();
        assert_eq!(user.total, 5);
        assert_eq!(user.solved, 1);
        assert_eq!(user.active, 4);
        assert_eq!(user.solve_rate, 20.0);
        let languages: Vec<_> = user.top_languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(languages, vec!["Rust", "Python", "Go"]);
        assert_eq!(user.avg_response_minutes, Some(30.0));
        assert!(user.first_ticket_at.is_some());

        let stranger = stats.per_user(99).unwrap();
        assert_eq!(stranger.total, 0);
        assert_eq!(stranger.solve_rate, 0.0);
        assert!(stranger.top_languages.is_empty());
        assert_eq!(stranger.avg_response_minutes, None);
    }

    #[test]
    fn average_response_is_zero_without_samples() {
        let stats = StatisticsAggregator::new(dyn_store(&memory_store()));
        assert_eq!(stats.average_response_minutes(30).unwrap(), 0.0);
    }

    #[test]
    fn dashboard_raises_alerts() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));
        let mut last = None;
        for channel in 0..6 {
            last = Some(seed_ticket(&store, 1, channel, "C"));
        }
        let ticket = last.unwrap();
        store
            .insert_response_time(ticket.id, 2000, &ticket.created_at)
            .unwrap();
        stats.increment(Counter::QuestionsCreated, 6).unwrap();

        let dashboard = stats.dashboard().unwrap();
        assert_eq!(dashboard.pending, 6);
        assert_eq!(dashboard.today.questions_created, 6);
        assert_eq!(dashboard.top_languages_week[0].count, 6);
        assert_eq!(
            dashboard.alerts,
            vec![
                Alert::PendingBacklog { pending: 6 },
                Alert::LowSolveRate { solve_rate: 0.0 },
                Alert::SlowResponse { avg_minutes: 2000.0 },
            ]
        );
    }

    #[test]
    fn quiet_week_has_no_solve_rate_alert() {
        let stats = StatisticsAggregator::new(dyn_store(&memory_store()));
        let dashboard = stats.dashboard().unwrap();
        assert!(dashboard.alerts.is_empty());
        assert_eq!(dashboard.today.date, today());
    }

    #[test]
    fn overview_aggregates_store() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));
        let ticket = seed_ticket(&store, 1, 10, "Python");
        seed_ticket(&store, 2, 11, "Python");
        store
            .update_ticket_status(ticket.id, TicketStatus::Solved, &format_timestamp(Utc::now()))
            .unwrap();
        stats.increment(Counter::NewUsers, 2).unwrap();
        stats.increment(Counter::FaqSearches, 1).unwrap();

        let overview = stats.overview().unwrap();
        assert_eq!(overview.total_tickets, 2);
        assert_eq!(overview.by_status.solved, 1);
        assert_eq!(overview.solve_rate, 50.0);
        assert_eq!(overview.total_users, 2);
        assert_eq!(overview.active_users_30d, 2);
        assert_eq!(overview.new_users_week, 2);
        assert_eq!(overview.faq_searches_week, 1);
        assert_eq!(overview.last_7_days.questions, 2);
        assert_eq!(overview.last_7_days.solved, 1);
        assert_eq!(
            overview.top_languages,
            vec![LanguageCount {
                language: "Python".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn windows_compare_instants_not_strings() {
        let store = memory_store();
        let stats = StatisticsAggregator::new(dyn_store(&store));
        let inside = seed_ticket(&store, 1, 10, "Go");
        let outside = seed_ticket(&store, 2, 11, "Go");

        let set_created = |id: i64, created_at: String| {
            store
                .with_conn(|conn| {
                    conn.execute(
                        "UPDATE questions SET created_at = ?1 WHERE id = ?2",
                        (created_at, id),
                    )?;
                    Ok(())
                })
                .unwrap();
        };
        let hour = TimeDelta::hours(1);
        set_created(
            inside.id,
            (Utc::now() - TimeDelta::days(7) + hour)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        );
        set_created(
            outside.id,
            (Utc::now() - TimeDelta::days(7) - hour)
                .format("%Y-%m-%dT%H:%M:%S%.3f+00:00")
                .to_string(),
        );

        let overview = stats.overview().unwrap();
        assert_eq!(overview.last_7_days.questions, 1);
        assert_eq!(overview.active_users_30d, 2);
        assert_eq!(stats.summary(Period::Week).unwrap().total, 1);
        let cutoff = parse_timestamp("2026-10-18T11:59:59Z").unwrap();
        assert!(at_or_after("2026-10-18 12:00:00", cutoff));
        assert!(!at_or_after("garbage", DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn mean_handles_empty() {
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(mean([1, 2].into_iter()), Some(1.5));
    }
}
