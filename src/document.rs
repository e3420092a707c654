//! Document data model accepted by the submission endpoint.
//!
//! Values are plain immutable records: build them with struct literals and
//! `..Default::default()`. Field names go over the wire in camelCase.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

/// Taxpayer identification number. Local INNs are 10 or 12 digits; foreign
/// producers are registered with up to 13.
static INN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,13}$").expect("INN pattern is valid"));

/// Calendar date as `YYYY-MM-DD`.
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[validate(regex(path = *INN_PATTERN, message = "participantInn must be 10 to 13 digits"))]
    pub participant_inn: String,
    #[validate(length(min = 1, message = "docId cannot be empty"))]
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    pub import_request: bool,
    #[validate(regex(path = *INN_PATTERN, message = "ownerInn must be 10 to 13 digits"))]
    pub owner_inn: String,
    #[validate(regex(path = *INN_PATTERN, message = "producerInn must be 10 to 13 digits"))]
    pub producer_inn: Option<String>,
    #[validate(regex(path = *DATE_PATTERN, message = "productionDate must be YYYY-MM-DD"))]
    pub production_date: String,
    pub production_type: String,
    #[validate(nested)]
    pub products: Vec<Product>,
    #[validate(regex(path = *DATE_PATTERN, message = "regDate must be YYYY-MM-DD"))]
    pub reg_date: String,
    pub reg_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: String,
    pub certificate_document_number: String,
    #[validate(regex(path = *INN_PATTERN, message = "ownerInn must be 10 to 13 digits"))]
    pub owner_inn: String,
    #[validate(regex(path = *INN_PATTERN, message = "producerInn must be 10 to 13 digits"))]
    pub producer_inn: String,
    #[validate(regex(path = *DATE_PATTERN, message = "productionDate must be YYYY-MM-DD"))]
    pub production_date: String,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}
