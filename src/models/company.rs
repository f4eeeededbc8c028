//! Company records.

use serde::Deserialize;

use super::{de_opt_string, de_u64};

/// One company as returned by `crm.company.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct Company {
    #[serde(rename = "ID", deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(rename = "TITLE", default)]
    pub title: String,
    /// Tax identifier, when the portal stores one on the company card.
    #[serde(rename = "UF_INN", deserialize_with = "de_opt_string", default)]
    pub inn: Option<String>,
}
