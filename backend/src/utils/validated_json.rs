//! JSON extractor that runs `validator` checks after deserialization and
//! reports every offending field as a 422.

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::error::{ApiError, FieldError};

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let error = rejection_to_field_error(&rejection);
            tracing::warn!("Rejected request body: {}", error.message);
            ApiError::validation(vec![error])
        })?;

        data.validate().map_err(|errors| {
            let fields = flatten_validation_errors(&errors);
            for f in &fields {
                tracing::warn!(location = %f.location, kind = %f.kind, "Validation error: {}", f.message);
            }
            ApiError::validation(fields)
        })?;

        Ok(ValidatedJson(data))
    }
}

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn rejection_to_field_error(rejection: &JsonRejection) -> FieldError {
    let kind = match rejection {
        JsonRejection::MissingJsonContentType(_) => "missing_content_type",
        _ => "json_invalid",
    };
    FieldError::new("body", kind, rejection.body_text())
}

/// Flatten nested `validator` errors into one entry per field, sorted by location.
pub fn flatten_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect("", errors, &mut out);
    out.sort_by(|a, b| a.location.cmp(&b.location).then_with(|| a.kind.cmp(&b.kind)));
    out
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    out.push(FieldError::new(&path, err.code.to_string(), describe(&path, err)));
                }
            },
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect(&format!("{}.{}", path, idx), inner, out);
                }
            },
        }
    }
}

fn describe(path: &str, err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }

    let param = |key: &str| err.params.get(key).map(|v| v.to_string());
    match err.code.as_ref() {
        "required" => format!("{} is required", path),
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => {
                format!("{} must be between {} and {} characters long", path, min, max)
            },
            (Some(min), None) => format!("{} must contain at least {} item(s)", path, min),
            (None, Some(max)) => format!("{} must be at most {} long", path, max),
            (None, None) => format!("{} has an invalid length", path),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("{} must be between {} and {}", path, min, max),
            (Some(min), None) => format!("{} must be at least {}", path, min),
            (None, Some(max)) => format!("{} must be at most {}", path, max),
            (None, None) => format!("{} is out of range", path),
        },
        code => format!("{} is invalid ({})", path, code),
    }
}
