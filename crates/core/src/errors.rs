use thiserror::Error;

pub const FAILED_VERIFICATION_BODY: &str = "Unauthorized - failed verification";
pub const FAILED_AUTHORIZATION_BODY: &str = "Unauthorized - failed auth0 check";
pub const MALFORMED_EVENT_BODY: &str = "Couldn't parse slack event.";
pub const MISSING_TEAM_BODY: &str = "Couldn't find team authorization.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("duplicate records for subject `{subject}` in partition `{partition}`")]
    DataConsistency { partition: String, subject: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request verification failed: {0}")]
    Verification(String),
    #[error("malformed event: {0}")]
    Validation(String),
    #[error("team authorization failed: {0}")]
    Authorization(String),
    #[error("no credentials stored for team `{0}`")]
    TenantNotFound(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    /// Body safe to hand back to the caller. Client errors carry their fixed
    /// response text; server errors never leak internal detail.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Verification(_) => {
                Self::Forbidden { message: FAILED_VERIFICATION_BODY.to_owned(), correlation_id }
            }
            ApplicationError::Authorization(_) => {
                Self::Forbidden { message: FAILED_AUTHORIZATION_BODY.to_owned(), correlation_id }
            }
            ApplicationError::Validation(_) => {
                Self::Unauthorized { message: MALFORMED_EVENT_BODY.to_owned(), correlation_id }
            }
            ApplicationError::TenantNotFound(_) => {
                Self::BadRequest { message: MISSING_TEAM_BODY.to_owned(), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::DataConsistency { .. }) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::StorageUnavailable(message)
            | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn verification_failure_maps_to_forbidden() {
        let interface =
            ApplicationError::Verification("stale timestamp".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Forbidden { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.status_code(), 403);
        assert_eq!(interface.user_message(), "Unauthorized - failed verification");
    }

    #[test]
    fn authorization_failure_has_its_own_body() {
        let interface =
            ApplicationError::Authorization("invalid_code".to_owned()).into_interface("req-2");

        assert_eq!(interface.status_code(), 403);
        assert_eq!(interface.user_message(), "Unauthorized - failed auth0 check");
    }

    #[test]
    fn validation_failure_maps_to_unauthorized_parse_message() {
        let interface =
            ApplicationError::Validation("missing channel".to_owned()).into_interface("req-3");

        assert_eq!(interface.status_code(), 401);
        assert_eq!(interface.user_message(), "Couldn't parse slack event.");
    }

    #[test]
    fn missing_tenant_maps_to_bad_request() {
        let interface = ApplicationError::TenantNotFound("T9".to_owned()).into_interface("req-4");

        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.user_message(), "Couldn't find team authorization.");
    }

    #[test]
    fn storage_failure_does_not_leak_detail() {
        let interface = ApplicationError::StorageUnavailable("pool closed".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.status_code(), 503);
        assert!(!interface.user_message().contains("pool closed"));
    }

    #[test]
    fn every_application_error_has_an_http_status() {
        let cases = [
            (ApplicationError::Verification("bad mac".to_owned()), 403),
            (ApplicationError::Authorization("invalid_code".to_owned()), 403),
            (ApplicationError::Validation("no text".to_owned()), 401),
            (ApplicationError::TenantNotFound("T1".to_owned()), 400),
            (ApplicationError::StorageUnavailable("closed".to_owned()), 503),
            (ApplicationError::Integration("channel_not_found".to_owned()), 503),
            (
                ApplicationError::Domain(DomainError::DataConsistency {
                    partition: "karma".to_owned(),
                    subject: "Foo".to_owned(),
                }),
                500,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_interface("req-7").status_code(), status);
        }
    }

    #[test]
    fn consistency_fault_maps_to_internal_and_keeps_context() {
        let interface = ApplicationError::from(DomainError::DataConsistency {
            partition: "karma_T1".to_owned(),
            subject: "Foo".to_owned(),
        })
        .into_interface("req-6");

        assert_eq!(interface.correlation_id(), "req-6");
        match interface {
            InterfaceError::Internal { message, .. } => {
                assert!(message.contains("Foo"));
                assert!(message.contains("karma_T1"));
            }
            other => panic!("unexpected interface error: {other:?}"),
        }
    }
}
