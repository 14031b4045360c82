//! Episode lifecycle.
//!
//! An episode groups the bills, consultations, lab orders, prescriptions and claims of
//! one bounded care encounter. It expires at `expires_at`, after which it is eligible
//! for auto-completion. Once locked for audit it must not change: the mutating
//! operations here refuse locked episodes, except [`Episode::lock_for_audit`] itself,
//! which is idempotent.

use crate::billing::Bill;
use crate::error::{HmoError, HmoResult};
use chrono::{DateTime, Duration, Utc};
use hmo_types::{Amount, NonEmptyText};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Active,
    PendingResults,
    FollowUp,
    Completed,
    AutoCompleted,
}

impl EpisodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::AutoCompleted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: EpisodeStatus) -> bool {
        use EpisodeStatus::*;
        match (self, next) {
            (from, to) if from == to => true,
            (Active, PendingResults | FollowUp | Completed | AutoCompleted) => true,
            (PendingResults, FollowUp | Completed | AutoCompleted) => true,
            (FollowUp, PendingResults | Completed | AutoCompleted) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub hmo_provider_id: Option<String>,
    pub status: EpisodeStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_locked_for_audit: bool,
    #[serde(default)]
    pub total_billed: Amount,
    #[serde(default)]
    pub total_paid: Amount,
    #[serde(default)]
    pub total_balance: Amount,
    #[serde(default)]
    pub bill_ids: Vec<String>,
    #[serde(default)]
    pub consultation_ids: Vec<String>,
    #[serde(default)]
    pub lab_order_ids: Vec<String>,
    #[serde(default)]
    pub prescription_ids: Vec<String>,
    #[serde(default)]
    pub claim_ids: Vec<String>,
}

/// Time left before an episode expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingTime {
    pub days: i64,
    /// Hours beyond the whole days.
    pub hours: i64,
    pub is_expired: bool,
}

fn push_unique(ids: &mut Vec<String>, id: impl Into<String>) -> bool {
    let id = id.into();
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    true
}

impl Episode {
    /// Opens a new active episode that expires `duration` after `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`HmoError::InvalidInput`] if `duration` is not positive or the expiry
    /// falls outside the representable date range.
    pub fn open(
        id: NonEmptyText,
        patient_id: NonEmptyText,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> HmoResult<Self> {
        if duration <= Duration::zero() {
            return Err(HmoError::InvalidInput(
                "episode duration must be positive".into(),
            ));
        }
        let expires_at = started_at.checked_add_signed(duration).ok_or_else(|| {
            HmoError::InvalidInput(format!("episode expiry overflows from {started_at}"))
        })?;

        Ok(Self {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            hmo_provider_id: None,
            status: EpisodeStatus::Active,
            started_at,
            expires_at,
            completed_at: None,
            is_locked_for_audit: false,
            total_billed: 0,
            total_paid: 0,
            total_balance: 0,
            bill_ids: Vec::new(),
            consultation_ids: Vec::new(),
            lab_order_ids: Vec::new(),
            prescription_ids: Vec::new(),
            claim_ids: Vec::new(),
        })
    }

    /// True when the episode is not yet completed and `now` is past its expiry.
    pub fn should_auto_complete(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now > self.expires_at
    }

    /// Moves an expired episode to `auto_completed`. Returns whether it changed.
    pub fn auto_complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_locked_for_audit || !self.should_auto_complete(now) {
            return false;
        }
        self.status = EpisodeStatus::AutoCompleted;
        self.completed_at.get_or_insert(now);
        tracing::info!(episode_id = %self.id, "episode auto-completed");
        true
    }

    /// Locks the episode for audit.
    ///
    /// An auto-completed episode stays auto-completed; any other status becomes
    /// completed. `completed_at` is set to `now` if it was unset.
    pub fn lock_for_audit(&mut self, now: DateTime<Utc>) {
        if self.status != EpisodeStatus::AutoCompleted {
            self.status = EpisodeStatus::Completed;
        }
        self.completed_at.get_or_insert(now);
        if !self.is_locked_for_audit {
            tracing::info!(
                episode_id = %self.id,
                status = ?self.status,
                "episode locked for audit"
            );
        }
        self.is_locked_for_audit = true;
    }

    /// Changes the status along an allowed transition.
    ///
    /// # Errors
    ///
    /// Returns [`HmoError::EpisodeLocked`] once locked, and
    /// [`HmoError::InvalidEpisodeTransition`] for moves the state machine forbids.
    pub fn transition_to(&mut self, next: EpisodeStatus, now: DateTime<Utc>) -> HmoResult<()> {
        self.ensure_unlocked()?;
        if !self.status.can_transition_to(next) {
            return Err(HmoError::InvalidEpisodeTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at.get_or_insert(now);
        }
        Ok(())
    }

    pub fn remaining_time(&self, now: DateTime<Utc>) -> RemainingTime {
        let left = self.expires_at - now;
        if left <= Duration::zero() {
            return RemainingTime {
                days: 0,
                hours: 0,
                is_expired: true,
            };
        }
        RemainingTime {
            days: left.num_days(),
            hours: left.num_hours() % 24,
            is_expired: false,
        }
    }

    fn ensure_unlocked(&self) -> HmoResult<()> {
        if self.is_locked_for_audit {
            tracing::warn!(episode_id = %self.id, "rejected change to locked episode");
            return Err(HmoError::EpisodeLocked(self.id.clone()));
        }
        Ok(())
    }

    /// Attaches a bill id unless already present. Returns whether it was added.
    pub fn add_bill(&mut self, bill_id: impl Into<String>) -> HmoResult<bool> {
        self.ensure_unlocked()?;
        Ok(push_unique(&mut self.bill_ids, bill_id))
    }

    pub fn add_consultation(&mut self, consultation_id: impl Into<String>) -> HmoResult<bool> {
        self.ensure_unlocked()?;
        Ok(push_unique(&mut self.consultation_ids, consultation_id))
    }

    pub fn add_lab_order(&mut self, lab_order_id: impl Into<String>) -> HmoResult<bool> {
        self.ensure_unlocked()?;
        Ok(push_unique(&mut self.lab_order_ids, lab_order_id))
    }

    pub fn add_prescription(&mut self, prescription_id: impl Into<String>) -> HmoResult<bool> {
        self.ensure_unlocked()?;
        Ok(push_unique(&mut self.prescription_ids, prescription_id))
    }

    pub fn add_claim(&mut self, claim_id: impl Into<String>) -> HmoResult<bool> {
        self.ensure_unlocked()?;
        Ok(push_unique(&mut self.claim_ids, claim_id))
    }

    /// Recomputes billing totals from the episode's bills, keeping
    /// `total_balance == total_billed - total_paid`. Bills not attached to the episode
    /// are ignored.
    pub fn record_bill_totals(&mut self, bills: &[Bill]) -> HmoResult<()> {
        self.ensure_unlocked()?;
        let attached = bills.iter().filter(|bill| self.bill_ids.contains(&bill.id));
        let (billed, paid) = attached.fold((0, 0), |(billed, paid), bill| {
            (billed + bill.total(), paid + bill.amount_paid)
        });
        self.total_billed = billed;
        self.total_paid = paid;
        self.total_balance = billed - paid;
        Ok(())
    }
}
