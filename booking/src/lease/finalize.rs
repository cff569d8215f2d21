//! Booking finalizer: validate the visitor's details and promote the held
//! row to a confirmed booking.

use bay_booking_core::bay::{Identity, LockHandle, RecordId};
use bay_booking_core::store::{ReservationStore, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Details submitted on the booking form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingForm {
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub surname: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Contact mobile.
    #[serde(default)]
    pub mobile: String,
    /// Vehicle registration.
    #[serde(default)]
    pub registration: String,
}

/// A form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `first_name`
    FirstName,
    /// `surname`
    Surname,
    /// `email`
    Email,
    /// `mobile`
    Mobile,
    /// `registration`
    Registration,
}

impl Field {
    /// Wire name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::Surname => "surname",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Registration => "registration",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIssue {
    /// Empty after trimming.
    #[error("{0} is required")]
    Missing(Field),

    /// A name of one character.
    #[error("{0} must be longer than one character")]
    TooShort(Field),

    /// Email without an approved domain marker.
    #[error("email must use an approved company address")]
    DomainNotApproved,
}

/// Every rule the form failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    /// Failed rules in field order.
    pub issues: Vec<FieldIssue>,
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Approved email domain markers, matched case-insensitively anywhere in the
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPolicy {
    markers: Vec<String>,
}

impl EmailPolicy {
    /// Build a policy; blank markers are dropped.
    #[must_use]
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// The configured markers, lowercased.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether `email` carries an approved marker.
    #[must_use]
    pub fn allows(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.markers.iter().any(|marker| email.contains(marker.as_str()))
    }
}

impl BookingForm {
    /// Check every rule and return the trimmed identity.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every failed rule.
    pub fn validate(&self, policy: &EmailPolicy) -> Result<Identity, ValidationError> {
        let fields = [
            (Field::FirstName, self.first_name.trim()),
            (Field::Surname, self.surname.trim()),
            (Field::Email, self.email.trim()),
            (Field::Mobile, self.mobile.trim()),
            (Field::Registration, self.registration.trim()),
        ];

        let mut issues = Vec::new();
        for (field, value) in fields {
            if value.is_empty() {
                issues.push(FieldIssue::Missing(field));
            } else if matches!(field, Field::FirstName | Field::Surname) && value.chars().count() <= 1 {
                issues.push(FieldIssue::TooShort(field));
            } else if field == Field::Email && !policy.allows(value) {
                issues.push(FieldIssue::DomainNotApproved);
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        let [first_name, surname, email, mobile, registration] = fields.map(|(_, v)| v.to_string());
        Ok(Identity {
            first_name,
            surname,
            email,
            mobile,
            registration,
        })
    }
}

/// Why a booking was not confirmed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    /// The form failed validation; the hold is untouched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The held row is gone (reaped) or no longer temporary.
    #[error("Hold {0} no longer exists")]
    HoldLost(RecordId),

    /// The store failed; the hold is untouched.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The chat message announcing a booking.
#[must_use]
pub fn confirmation_message(identity: &Identity, date: NaiveDate) -> String {
    format!(
        "**New Booking Confirmed**\n\n**Name**: {} {}\n**Date**: {}\n**Email**: {}\n**Registration**: {}",
        identity.first_name, identity.surname, date, identity.email, identity.registration
    )
}

/// Promotes held rows to confirmed bookings.
#[derive(Clone)]
pub struct BookingFinalizer {
    store: Arc<dyn ReservationStore>,
    policy: EmailPolicy,
}

impl BookingFinalizer {
    /// Create a finalizer enforcing `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, policy: EmailPolicy) -> Self {
        Self { store, policy }
    }

    /// The email policy in force.
    #[must_use]
    pub const fn policy(&self) -> &EmailPolicy {
        &self.policy
    }

    /// Validate `form`, then confirm the hold.
    ///
    /// # Errors
    ///
    /// See [`FinalizeError`]. Validation failures never touch the store.
    pub async fn finalize(&self, handle: LockHandle, form: &BookingForm) -> Result<Identity, FinalizeError> {
        let identity = form.validate(&self.policy)?;
        self.confirm(handle, identity).await
    }

    /// Confirm an already validated identity.
    ///
    /// The update only applies while the row is still temporary, so a row
    /// reaped (or confirmed) in the meantime yields [`FinalizeError::HoldLost`].
    ///
    /// # Errors
    ///
    /// [`FinalizeError::HoldLost`] or [`FinalizeError::Store`].
    #[tracing::instrument(skip(self, identity), fields(record_id = %handle.record_id))]
    pub async fn confirm(&self, handle: LockHandle, identity: Identity) -> Result<Identity, FinalizeError> {
        if self.store.confirm(handle.record_id, identity.clone()).await? {
            tracing::info!(date = %handle.date, "Booking confirmed");
            Ok(identity)
        } else {
            tracing::warn!("Hold disappeared before confirmation");
            Err(FinalizeError::HoldLost(handle.record_id))
        }
    }
}
