use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

static LETTERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-ZÀ-ÿ\s]+$").unwrap());
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{7,10}$").unwrap());

/// Credentials posted to `/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub usuario: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub contrasena: String,
}

/// Client type create/update payload, sent to the billing API as is.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientTypeForm {
    #[validate(
        length(min = 3, message = "The name must be at least 3 characters long."),
        regex(path = *LETTERS_RE, message = "The name may only contain letters and spaces.")
    )]
    pub nombre: String,

    #[validate(custom(function = "validate_non_negative"))]
    pub monto_maximo: Decimal,
}

/// Client create/update payload, sent to the billing API as is.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientForm {
    #[validate(
        length(min = 2, message = "The first name is required."),
        regex(path = *LETTERS_RE, message = "The first name may only contain letters and spaces.")
    )]
    pub nombre: String,

    #[validate(
        length(min = 2, message = "The last name is required."),
        regex(path = *LETTERS_RE, message = "The last name may only contain letters and spaces.")
    )]
    pub apellido: String,

    #[validate(length(min = 1, message = "Select an identification type."))]
    pub tipo_identificacion: String,

    #[validate(
        length(min = 5, message = "The identification number is required."),
        regex(path = *DIGITS_RE, message = "The identification number may only contain digits.")
    )]
    pub numero_identificacion: String,

    /// Serialized as `YYYY-MM-DD`
    pub fecha_nacimiento: NaiveDate,

    #[validate(length(min = 5, message = "The address is required."))]
    pub direccion: String,

    #[validate(regex(path = *PHONE_RE, message = "Enter a valid phone number (7-10 digits)."))]
    pub telefono: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub correo_electronico: String,

    #[validate(range(min = 1, message = "Select a client type."))]
    pub tipo_cliente: i64,

    #[validate(length(min = 1, message = "Select a status."))]
    pub estado: String,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.message = Some(Cow::Borrowed("The maximum amount cannot be less than 0."));
        return Err(error);
    }
    Ok(())
}
