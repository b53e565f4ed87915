//! Lead capture: form schemas, collaborators and route handlers.

pub mod forms;
pub mod mailer;
pub mod service;
pub mod sheets;

pub use forms::{BookingForm, CreditApplicationForm, FormSchema, LeadForm, parse_form};
pub use mailer::{EmailMessage, Mailer};
pub use service::{ApiReply, ApiResponse, LeadService};
pub use sheets::{Sheet, SheetRow, SheetsClient};
