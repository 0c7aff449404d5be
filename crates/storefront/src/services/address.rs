//! Shipping address form handling.

use serde::Deserialize;
use thiserror::Error;

use tradepost_core::{Phone, PhoneError};

use crate::api::types::AddressInput;

/// Longest accepted value for any single address field.
const MAX_FIELD_LENGTH: usize = 200;

/// Errors from address form validation.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is too long")]
    TooLong(&'static str),

    #[error("invalid phone number: {0}")]
    Phone(#[from] PhoneError),
}

/// Raw address fields as posted by the checkout and address book forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    /// Checkbox; present only when ticked.
    #[serde(default)]
    pub is_default: Option<String>,
}

impl AddressForm {
    /// Whether every text field was left blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [
            &self.full_name,
            &self.phone,
            &self.line1,
            &self.line2,
            &self.city,
            &self.state,
            &self.postal_code,
        ]
        .iter()
        .all(|v| v.trim().is_empty())
    }

    /// Validate into the backend shape.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` naming the first invalid field.
    pub fn validate(&self) -> Result<AddressInput, AddressError> {
        let line2 = self.line2.trim();
        if line2.len() > MAX_FIELD_LENGTH {
            return Err(AddressError::TooLong("Address line 2"));
        }

        Ok(AddressInput {
            full_name: required(&self.full_name, "Full name")?,
            phone: Phone::parse(&self.phone)?,
            line1: required(&self.line1, "Address line 1")?,
            line2: (!line2.is_empty()).then(|| line2.to_string()),
            city: required(&self.city, "City")?,
            state: required(&self.state, "State")?,
            postal_code: required(&self.postal_code, "Postal code")?,
            is_default: self.is_default.is_some(),
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, AddressError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AddressError::Missing(field));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(AddressError::TooLong(field));
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub fn sample_form() -> AddressForm {
        AddressForm {
            full_name: " Asha Rao ".to_string(),
            phone: "+91 98765-43210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: String::new(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            is_default: Some("on".to_string()),
        }
    }

    #[test]
    fn test_validate_trims_and_parses() {
        let input = sample_form().validate().unwrap();
        assert_eq!(input.full_name, "Asha Rao");
        assert_eq!(input.line2, None);
        assert!(input.is_default);
        assert_eq!(input.phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_missing_field_named() {
        let form = AddressForm {
            city: "  ".to_string(),
            ..sample_form()
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "City is required");
    }

    #[test]
    fn test_bad_phone() {
        let form = AddressForm {
            phone: "12ab".to_string(),
            ..sample_form()
        };
        assert!(matches!(form.validate(), Err(AddressError::Phone(_))));
    }

    #[test]
    fn test_is_blank() {
        assert!(AddressForm::default().is_blank());
        assert!(!sample_form().is_blank());
    }
}
