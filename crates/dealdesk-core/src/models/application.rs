use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::APPLICATION_LIFETIME_DAYS;

/// Review pipeline status of an application. Admins may move an application
/// to any status at any time; no transition table is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    InProgress,
    Submitted,
    UnderReview,
    ConditionalApproval,
    Approved,
    Declined,
    Expired,
    Disqualified,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 9] = [
        ApplicationStatus::Draft,
        ApplicationStatus::InProgress,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::ConditionalApproval,
        ApplicationStatus::Approved,
        ApplicationStatus::Declined,
        ApplicationStatus::Expired,
        ApplicationStatus::Disqualified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::ConditionalApproval => "conditional_approval",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Declined => "declined",
            ApplicationStatus::Expired => "expired",
            ApplicationStatus::Disqualified => "disqualified",
        }
    }

    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        ApplicationStatus::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One intake submission. `user_id` stays empty until the anonymous draft is
/// migrated at authenticated submission time. `company_name` is denormalized
/// from the company section for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub status: ApplicationStatus,
    /// Wizard position pointer, 1..=10.
    pub current_section: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Application {
    /// Expiry timestamp for an application created at `created_at`.
    /// Invariant: `expires_at` is always creation + the fixed lifetime.
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(APPLICATION_LIFETIME_DAYS)
    }

    /// An application becomes read-only once submitted, disqualified, or
    /// past its expiry timestamp.
    pub fn is_read_only(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            ApplicationStatus::Submitted
                | ApplicationStatus::Disqualified
                | ApplicationStatus::Expired
        ) || now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: ApplicationStatus, created_at: DateTime<Utc>) -> Application {
        Application {
            id: Uuid::new_v4(),
            user_id: None,
            company_name: None,
            company_website: None,
            status,
            current_section: 1,
            created_at,
            updated_at: created_at,
            submitted_at: None,
            expires_at: Application::expiry_for(created_at),
        }
    }

    #[test]
    fn expiry_is_creation_plus_lifetime() {
        let created = Utc::now();
        assert_eq!(
            Application::expiry_for(created),
            created + Duration::days(45)
        );
    }

    #[test]
    fn submitted_and_disqualified_are_read_only() {
        let now = Utc::now();
        assert!(sample(ApplicationStatus::Submitted, now).is_read_only(now));
        assert!(sample(ApplicationStatus::Disqualified, now).is_read_only(now));
        assert!(!sample(ApplicationStatus::Draft, now).is_read_only(now));
    }

    #[test]
    fn draft_becomes_read_only_after_expiry() {
        let created = Utc::now() - Duration::days(46);
        let app = sample(ApplicationStatus::Draft, created);
        assert!(app.is_read_only(Utc::now()));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in ApplicationStatus::ALL {
            assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApplicationStatus::parse("archived"), None);
    }
}
