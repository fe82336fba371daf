//! Lead follow-up: drafts or sends follow-up emails for spreadsheet rows.

pub mod audit;
pub mod config;
pub mod error;
pub mod google;
pub mod mailer;
pub mod pipeline;
pub mod store;
pub mod template;
