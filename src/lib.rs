//! Entra agent inventory and Copilot Studio knowledge source mapping
//!
//! `agents` lists agent identities from the Graph directory; `knowledge-map`
//! walks a Dataverse environment and reports which OneDrive, SharePoint and
//! Dataverse locations each bot draws knowledge from.

pub mod api;
pub mod cmd;
pub mod config;
pub mod error;
pub mod mapping;
