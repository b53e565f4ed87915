//! Spreadsheet collaborator.
//!
//! Rows are appended through a webhook that owns the spreadsheet. The
//! webhook stamps each row with its own timestamp and the "New Lead" status;
//! callers only send the form values.

use reqwest::Client;
use serde::Serialize;

use crate::core::http::post_json;
use crate::error::{Result, ShowroomError};

/// Target tab in the lead spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sheet {
    Leads,
    Bookings,
    #[serde(rename = "Credit Applications")]
    CreditApplications,
}

/// One row to append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetRow {
    pub sheet: Sheet,
    pub values: Vec<String>,
}

/// Client for the append webhook.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: Client,
    webhook_url: Option<String>,
}

impl SheetsClient {
    #[must_use]
    pub const fn new(client: Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Append a row.
    ///
    /// # Errors
    /// Returns [`ShowroomError::NotConfigured`] without a webhook, or
    /// [`ShowroomError::SheetWrite`] when the webhook fails or rejects the row.
    pub async fn append(&self, row: &SheetRow) -> Result<()> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or(ShowroomError::NotConfigured("spreadsheet webhook"))?;

        post_json(&self.client, url, None, row)
            .await
            .map_err(|e| ShowroomError::SheetWrite(e.to_string()))?;

        tracing::debug!(sheet = ?row.sheet, columns = row.values.len(), "Row appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_serializes_with_sheet_name() {
        let row = SheetRow {
            sheet: Sheet::CreditApplications,
            values: vec!["Ada".into()],
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            serde_json::json!({"sheet": "Credit Applications", "values": ["Ada"]})
        );
    }

    #[tokio::test]
    async fn unconfigured_append_fails() {
        let sheets = SheetsClient::new(Client::new(), None);
        let row = SheetRow {
            sheet: Sheet::Leads,
            values: vec![],
        };
        let err = sheets.append(&row).await.unwrap_err();
        assert_eq!(err.error_code(), "SHOW-D003");
    }
}
