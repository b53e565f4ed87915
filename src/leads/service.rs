//! Submission handlers behind the three API routes.
//!
//! Each handler validates first and touches no collaborator when the form is
//! invalid. Handlers never fail: every outcome is an [`ApiReply`].

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::forms::{BookingForm, CreditApplicationForm, LeadForm, parse_form};
use super::mailer::Mailer;
use super::sheets::{Sheet, SheetRow, SheetsClient};
use crate::error::{FieldError, ShowroomError};
use crate::storage::config::Config;

pub const LEAD_OK: &str = "Lead submitted successfully!";
pub const LEAD_FAILED: &str = "Failed to submit lead";
pub const BOOKING_OK: &str = "Booking submitted successfully!";
pub const BOOKING_FAILED: &str = "Failed to submit booking";
pub const CREDIT_OK: &str = "Credit application submitted successfully!";
pub const CREDIT_FAILED: &str = "Failed to submit credit application";
pub const INVALID_FORM: &str = "Invalid form data";

/// JSON body of every API answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_configured: Option<bool>,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            errors: None,
            email_configured: None,
        }
    }

    #[must_use]
    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }
}

/// Status plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: ApiResponse,
}

impl ApiReply {
    #[must_use]
    pub const fn new(status: u16, body: ApiResponse) -> Self {
        Self { status, body }
    }

    fn invalid(errors: Vec<FieldError>) -> Self {
        Self::new(
            400,
            ApiResponse {
                errors: Some(errors),
                ..ApiResponse::failed(INVALID_FORM)
            },
        )
    }

    /// Map a parse failure; anything but a form error is a server failure.
    fn from_parse_error(err: ShowroomError, failed: &str) -> Self {
        match err {
            ShowroomError::InvalidForm { errors } => Self::invalid(errors),
            other => {
                tracing::error!(error = %other, "Unexpected form parse failure");
                Self::new(500, ApiResponse::failed(failed))
            }
        }
    }
}

/// Lead, booking and credit-application handling.
#[derive(Debug, Clone)]
pub struct LeadService {
    sheets: SheetsClient,
    mailer: Mailer,
}

impl LeadService {
    #[must_use]
    pub const fn new(sheets: SheetsClient, mailer: Mailer) -> Self {
        Self { sheets, mailer }
    }

    /// Build both collaborators from the `[sheets]` and `[email]` sections.
    #[must_use]
    pub fn from_config(config: &Config, client: &Client) -> Self {
        Self::new(
            SheetsClient::new(client.clone(), config.sheets.webhook_url.clone()),
            Mailer::new(client.clone(), config.email.clone()),
        )
    }

    /// `POST /api/submit-lead`.
    pub async fn submit_lead(&self, body: &[u8]) -> ApiReply {
        let lead: LeadForm = match parse_form(body) {
            Ok(lead) => lead,
            Err(e) => return ApiReply::from_parse_error(e, LEAD_FAILED),
        };

        let row = SheetRow {
            sheet: Sheet::Leads,
            values: vec![
                lead.first_name,
                lead.last_name,
                lead.email,
                lead.phone,
                lead.vehicle,
                lead.budget,
                lead.timeline,
            ],
        };
        self.append_only(&row, "lead", LEAD_OK, LEAD_FAILED).await
    }

    /// `POST /api/submit-booking`.
    pub async fn submit_booking(&self, body: &[u8]) -> ApiReply {
        let booking: BookingForm = match parse_form(body) {
            Ok(booking) => booking,
            Err(e) => return ApiReply::from_parse_error(e, BOOKING_FAILED),
        };

        let row = SheetRow {
            sheet: Sheet::Bookings,
            values: vec![
                booking.first_name,
                booking.last_name,
                booking.email,
                booking.phone,
                booking.brand,
                booking.trim,
                booking.credit_score,
                booking.timeline,
            ],
        };
        self.append_only(&row, "booking", BOOKING_OK, BOOKING_FAILED).await
    }

    async fn append_only(&self, row: &SheetRow, kind: &str, ok: &str, failed: &str) -> ApiReply {
        match self.sheets.append(row).await {
            Ok(()) => {
                tracing::info!(form = kind, "Submission recorded");
                ApiReply::new(200, ApiResponse::ok(ok))
            }
            Err(e) => {
                tracing::error!(
                    form = kind,
                    error = %e,
                    code = e.error_code(),
                    retryable = e.is_retryable(),
                    "Submission not recorded"
                );
                ApiReply::new(500, ApiResponse::failed(failed))
            }
        }
    }

    /// `POST /api/submit-credit-application`.
    ///
    /// The spreadsheet row and the notification email are independent: one
    /// failing does not stop the other, and the request fails only when
    /// both do.
    pub async fn submit_credit_application(&self, body: &[u8]) -> ApiReply {
        let form: CreditApplicationForm = match parse_form(body) {
            Ok(form) => form,
            Err(e) => return ApiReply::from_parse_error(e, CREDIT_FAILED),
        };

        let row = credit_row(&form);
        let subject = format!("New Credit Application: {} {}", form.first_name, form.last_name);
        let text = credit_email_text(&form);

        let (sheet, email) = tokio::join!(self.sheets.append(&row), self.mailer.send(&subject, &text));

        if let Err(e) = &sheet {
            tracing::warn!(error = %e, "Credit application not written to spreadsheet");
        }
        if let Err(e) = &email {
            tracing::warn!(error = %e, "Credit application email not sent");
        }

        if sheet.is_err() && email.is_err() {
            tracing::error!("Credit application lost: spreadsheet and email both failed");
            ApiReply::new(500, ApiResponse::failed(CREDIT_FAILED))
        } else {
            tracing::info!(
                form = "credit-application",
                recorded = sheet.is_ok(),
                emailed = email.is_ok(),
                "Submission recorded"
            );
            ApiReply::new(200, ApiResponse::ok(CREDIT_OK))
        }
    }

    /// `GET /api/submit-credit-application`: health and email status.
    #[must_use]
    pub fn credit_status(&self) -> ApiReply {
        let email_configured = self.mailer.is_configured();
        let message = if email_configured {
            "Credit application endpoint is ready"
        } else {
            "Credit application endpoint is ready; email notifications are not configured"
        };
        ApiReply::new(
            200,
            ApiResponse {
                email_configured: Some(email_configured),
                ..ApiResponse::ok(message)
            },
        )
    }
}

fn credit_row(form: &CreditApplicationForm) -> SheetRow {
    SheetRow {
        sheet: Sheet::CreditApplications,
        values: vec![
            form.first_name.clone(),
            form.last_name.clone(),
            form.email.clone(),
            form.phone.clone(),
            form.date_of_birth.clone(),
            form.masked_ssn(),
            form.address.clone(),
            form.city.clone(),
            form.state.to_ascii_uppercase(),
            form.zip_code.clone(),
            form.employment_status.clone(),
            form.employer.clone(),
            form.monthly_income.clone(),
            form.vehicle.clone(),
            form.down_payment.clone(),
            form.housing_status.clone(),
        ],
    }
}

fn credit_email_text(form: &CreditApplicationForm) -> String {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    format!(
        "New credit application\n\n\
         Name: {} {}\n\
         Email: {}\n\
         Phone: {}\n\
         Date of birth: {}\n\
         SSN: {}\n\
         Address: {}, {}, {} {}\n\
         Housing: {}\n\
         Employment: {} at {}\n\
         Monthly income: {}\n\
         Vehicle: {}\n\
         Down payment: {}\n",
        form.first_name,
        form.last_name,
        form.email,
        form.phone,
        form.date_of_birth,
        form.masked_ssn(),
        form.address,
        form.city,
        form.state.to_ascii_uppercase(),
        form.zip_code,
        or_dash(&form.housing_status),
        form.employment_status,
        form.employer,
        form.monthly_income,
        or_dash(&form.vehicle),
        or_dash(&form.down_payment),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::EmailConfig;
    use crate::test_utils::make_test_credit_json;

    fn offline_service() -> LeadService {
        LeadService::new(
            SheetsClient::new(Client::new(), None),
            Mailer::new(Client::new(), EmailConfig::default()),
        )
    }

    #[tokio::test]
    async fn invalid_lead_is_400_with_errors() {
        let reply = offline_service()
            .submit_lead(br#"{"firstName":"","email":"x"}"#)
            .await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body.message, INVALID_FORM);
        assert!(!reply.body.success);
        let errors = reply.body.errors.unwrap();
        assert!(errors.iter().any(|e| e.field == "firstName"));
    }

    #[tokio::test]
    async fn unreachable_sheet_is_500() {
        let body = serde_json::to_vec(&crate::test_utils::make_test_lead_json()).unwrap();
        let reply = offline_service().submit_lead(&body).await;
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body.message, LEAD_FAILED);
    }

    #[tokio::test]
    async fn credit_fails_only_when_both_collaborators_fail() {
        let body = serde_json::to_vec(&make_test_credit_json()).unwrap();
        let reply = offline_service().submit_credit_application(&body).await;
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body.message, CREDIT_FAILED);
    }

    #[test]
    fn status_reports_email_configuration() {
        let reply = offline_service().credit_status();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body.email_configured, Some(false));
        let json = serde_json::to_value(&reply.body).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["emailConfigured"], false);
    }

    #[test]
    fn outbound_credit_records_mask_ssn() {
        let form: CreditApplicationForm = serde_json::from_value(make_test_credit_json()).unwrap();
        let row = credit_row(&form);
        assert!(row.values.iter().all(|v| !v.contains("123-45")));
        assert!(row.values.contains(&"***-**-6789".to_string()));
        let text = credit_email_text(&form);
        assert!(text.contains("SSN: ***-**-6789"));
        assert!(!text.contains("123-45-6789"));
    }
}
