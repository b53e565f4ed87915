//! Form schemas and validation.
//!
//! Every field deserializes with a default so that a missing field is
//! reported as a validation error with the same `{field, message}` shape as
//! a malformed one, rather than as a JSON error.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result, ShowroomError};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static SSN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3}-?\d{2}-?\d{4}$").expect("valid ssn regex")
});
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{5}(-\d{4})?$").expect("valid zip regex")
});

/// Minimum applicant age for credit.
pub const MIN_APPLICANT_AGE: i32 = 18;

/// A closed form type accepted by one API route.
pub trait FormSchema: DeserializeOwned {
    /// Field errors, empty when the form is valid.
    fn validate(&self) -> Vec<FieldError>;
}

/// Decode and validate a JSON form body.
///
/// # Errors
/// Returns [`ShowroomError::InvalidForm`] with per-field errors for a
/// malformed body or failed validation.
pub fn parse_form<T: FormSchema>(body: &[u8]) -> Result<T> {
    let form: T = serde_json::from_slice(body).map_err(|e| ShowroomError::InvalidForm {
        errors: vec![FieldError::new("body", format!("Malformed JSON: {e}"))],
    })?;

    let errors = form.validate();
    if errors.is_empty() {
        Ok(form)
    } else {
        Err(ShowroomError::InvalidForm { errors })
    }
}

// =============================================================================
// Field checks
// =============================================================================

fn required(errors: &mut Vec<FieldError>, field: &str, label: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{label} is required")));
        false
    } else {
        true
    }
}

fn check_email(errors: &mut Vec<FieldError>, value: &str) {
    if required(errors, "email", "Email", value) && !EMAIL_RE.is_match(value.trim()) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
}

fn check_phone(errors: &mut Vec<FieldError>, value: &str) {
    if required(errors, "phone", "Phone number", value)
        && value.chars().filter(char::is_ascii_digit).count() < 10
    {
        errors.push(FieldError::new("phone", "Phone number must be at least 10 digits"));
    }
}

fn check_contact(errors: &mut Vec<FieldError>, first: &str, last: &str, email: &str, phone: &str) {
    required(errors, "firstName", "First name", first);
    required(errors, "lastName", "Last name", last);
    check_email(errors, email);
    check_phone(errors, phone);
}

/// Whole years between `born` and `today`.
fn age_on(born: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    age
}

// =============================================================================
// Lead
// =============================================================================

/// Inquiry from the contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub vehicle: String,
    pub budget: String,
    pub timeline: String,
}

impl FormSchema for LeadForm {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_contact(&mut errors, &self.first_name, &self.last_name, &self.email, &self.phone);
        errors
    }
}

// =============================================================================
// Booking
// =============================================================================

/// Consultation booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub brand: String,
    pub trim: String,
    pub credit_score: String,
    pub timeline: String,
}

impl FormSchema for BookingForm {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_contact(&mut errors, &self.first_name, &self.last_name, &self.email, &self.phone);
        errors
    }
}

// =============================================================================
// Credit application
// =============================================================================

/// Financing pre-approval application.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreditApplicationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub ssn: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub employment_status: String,
    pub employer: String,
    pub monthly_income: String,
    pub vehicle: String,
    pub down_payment: String,
    pub housing_status: String,
}

// Keeps the SSN out of debug logs.
impl std::fmt::Debug for CreditApplicationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditApplicationForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("ssn", &self.masked_ssn())
            .finish_non_exhaustive()
    }
}

impl CreditApplicationForm {
    /// SSN with all but the last four digits hidden.
    #[must_use]
    pub fn masked_ssn(&self) -> String {
        let digits: String = self.ssn.chars().filter(char::is_ascii_digit).collect();
        let tail = digits.get(digits.len().saturating_sub(4)..).unwrap_or("");
        format!("***-**-{tail}")
    }

    /// Validate against a fixed date (for the age check).
    #[must_use]
    pub fn validate_on(&self, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_contact(&mut errors, &self.first_name, &self.last_name, &self.email, &self.phone);

        if required(&mut errors, "dateOfBirth", "Date of birth", &self.date_of_birth) {
            match NaiveDate::parse_from_str(self.date_of_birth.trim(), "%Y-%m-%d") {
                Ok(born) if born >= today => {
                    errors.push(FieldError::new("dateOfBirth", "Date of birth must be in the past"));
                }
                Ok(born) if age_on(born, today) < MIN_APPLICANT_AGE => {
                    errors.push(FieldError::new(
                        "dateOfBirth",
                        format!("Applicant must be at least {MIN_APPLICANT_AGE} years old"),
                    ));
                }
                Ok(_) => {}
                Err(_) => errors.push(FieldError::new(
                    "dateOfBirth",
                    "Date of birth must be YYYY-MM-DD",
                )),
            }
        }

        if required(&mut errors, "ssn", "SSN", &self.ssn) && !SSN_RE.is_match(self.ssn.trim()) {
            errors.push(FieldError::new("ssn", "SSN must be 9 digits"));
        }

        required(&mut errors, "address", "Address", &self.address);
        required(&mut errors, "city", "City", &self.city);

        if required(&mut errors, "state", "State", &self.state) {
            let state = self.state.trim();
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                errors.push(FieldError::new("state", "State must be a 2-letter code"));
            }
        }

        if required(&mut errors, "zipCode", "ZIP code", &self.zip_code)
            && !ZIP_RE.is_match(self.zip_code.trim())
        {
            errors.push(FieldError::new("zipCode", "Invalid ZIP code"));
        }

        required(&mut errors, "employmentStatus", "Employment status", &self.employment_status);
        required(&mut errors, "employer", "Employer", &self.employer);

        if required(&mut errors, "monthlyIncome", "Monthly income", &self.monthly_income) {
            let cleaned: String = self
                .monthly_income
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            if !cleaned.parse::<f64>().is_ok_and(|n| n.is_finite() && n > 0.0) {
                errors.push(FieldError::new("monthlyIncome", "Monthly income must be a positive number"));
            }
        }

        errors
    }
}

impl FormSchema for CreditApplicationForm {
    fn validate(&self) -> Vec<FieldError> {
        self.validate_on(Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_test_credit_json, make_test_lead_json};

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn valid_lead_parses() {
        let body = serde_json::to_vec(&make_test_lead_json()).unwrap();
        let lead: LeadForm = parse_form(&body).unwrap();
        assert_eq!(lead.first_name, "Ada");
        assert_eq!(lead.timeline, "1-3 months");
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let body = br#"{"firstName":"A","lastName":"B","email":"a@b.co","phone":"5551234567"}"#;
        let lead: LeadForm = parse_form(body).unwrap();
        assert_eq!(lead.vehicle, "");
        assert_eq!(lead.budget, "");
    }

    #[test]
    fn missing_fields_are_field_errors() {
        let err = parse_form::<BookingForm>(br#"{"firstName":"Grace"}"#).unwrap_err();
        let ShowroomError::InvalidForm { errors } = err else {
            panic!("expected InvalidForm");
        };
        assert_eq!(fields(&errors), vec!["lastName", "email", "phone"]);
    }

    #[test]
    fn email_and_phone_shape() {
        let mut lead = LeadForm {
            first_name: "A".into(),
            last_name: "B".into(),
            email: "not an email".into(),
            phone: "555-1234".into(),
            ..LeadForm::default()
        };
        let errors = lead.validate();
        assert_eq!(errors[0].message, "Invalid email address");
        assert_eq!(errors[1].message, "Phone number must be at least 10 digits");

        lead.email = "ada@example.com".into();
        lead.phone = "+1 (555) 123-4567".into();
        assert!(lead.validate().is_empty());
    }

    #[test]
    fn malformed_json_is_invalid_form() {
        let err = parse_form::<LeadForm>(b"{not json").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn credit_application_valid() {
        let body = serde_json::to_vec(&make_test_credit_json()).unwrap();
        let form: CreditApplicationForm = parse_form(&body).unwrap();
        assert_eq!(form.masked_ssn(), "***-**-6789");
        assert!(!format!("{form:?}").contains("123-45"));
    }

    #[test]
    fn credit_application_rejects_bad_fields() {
        let mut form: CreditApplicationForm =
            serde_json::from_value(make_test_credit_json()).unwrap();
        form.ssn = "12-345".into();
        form.state = "Virginia".into();
        form.zip_code = "2366".into();
        form.monthly_income = "-5".into();

        let errors = form.validate_on(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(fields(&errors), vec!["ssn", "state", "zipCode", "monthlyIncome"]);
    }

    #[test]
    fn applicant_must_be_adult() {
        let mut form: CreditApplicationForm =
            serde_json::from_value(make_test_credit_json()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();

        form.date_of_birth = "2008-06-16".into();
        assert_eq!(fields(&form.validate_on(today)), vec!["dateOfBirth"]);

        form.date_of_birth = "2008-06-15".into();
        assert!(form.validate_on(today).is_empty());

        form.date_of_birth = "06/15/1990".into();
        assert_eq!(form.validate_on(today)[0].message, "Date of birth must be YYYY-MM-DD");
    }

    #[test]
    fn zip_plus_four_accepted() {
        let mut form: CreditApplicationForm =
            serde_json::from_value(make_test_credit_json()).unwrap();
        form.zip_code = "23666-1234".into();
        form.monthly_income = "$12,000".into();
        assert!(form.validate_on(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).is_empty());
    }
}
