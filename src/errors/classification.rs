use axum::http::StatusCode;
use super::types::GuardError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub status: StatusCode,
    /// Whether the message is safe to hand back to an API caller verbatim.
    pub public: bool,
}

impl GuardError {
    /// Classify this error for logging and for the HTTP boundary.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Caller mistakes
            GuardError::InvalidRequest(_) => ErrorClassification {
                error_type: "InvalidRequest",
                status: StatusCode::BAD_REQUEST,
                public: true,
            },
            GuardError::NoValidLogs(_) => ErrorClassification {
                error_type: "NoValidLogs",
                status: StatusCode::BAD_REQUEST,
                public: true,
            },
            GuardError::NotFound(_) => ErrorClassification {
                error_type: "NotFound",
                status: StatusCode::NOT_FOUND,
                public: true,
            },
            GuardError::ReportCollision(_) => ErrorClassification {
                error_type: "ReportCollision",
                status: StatusCode::CONFLICT,
                public: true,
            },

            // Upstream failures
            GuardError::GenerationFailed(_) => ErrorClassification {
                error_type: "GenerationFailed",
                status: StatusCode::BAD_GATEWAY,
                public: true,
            },
            GuardError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                status: StatusCode::BAD_GATEWAY,
                public: true,
            },
            GuardError::CommandTimedOut(_) => ErrorClassification {
                error_type: "CommandTimedOut",
                status: StatusCode::GATEWAY_TIMEOUT,
                public: true,
            },
            GuardError::CommandExecutionFailed(_) => ErrorClassification {
                error_type: "CommandExecutionFailed",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: true,
            },
            GuardError::ParseAmbiguous(_) => ErrorClassification {
                error_type: "ParseAmbiguous",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: true,
            },

            // Internal faults: logged in full, reported generically
            GuardError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: false,
            },
            GuardError::Io(_) => ErrorClassification {
                error_type: "IoError",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: false,
            },
            GuardError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: false,
            },
            GuardError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: false,
            },
            GuardError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                public: false,
            },
        }
    }

    /// Message shown to API callers. Internal faults never leak their detail.
    pub fn public_message(&self) -> String {
        if self.classify().public {
            self.to_string()
        } else {
            "An internal error occurred".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_is_bad_request() {
        let err = GuardError::InvalidRequest("question is empty".into());
        let class = err.classify();
        assert_eq!(class.status, StatusCode::BAD_REQUEST);
        assert_eq!(class.error_type, "InvalidRequest");
    }

    #[test]
    fn test_not_found_is_404() {
        let err = GuardError::NotFound("x.json".into());
        assert_eq!(err.classify().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_generation_failure_is_bad_gateway() {
        let err = GuardError::GenerationFailed("backend unreachable".into());
        assert_eq!(err.classify().status, StatusCode::BAD_GATEWAY);
        assert!(err.public_message().contains("backend unreachable"));
    }

    #[test]
    fn test_io_error_is_hidden() {
        let err = GuardError::Io(std::io::Error::new(std::io::ErrorKind::Other, "/secret/path"));
        assert_eq!(err.classify().status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("/secret/path"));
    }

    #[test]
    fn test_collision_is_conflict() {
        let err = GuardError::ReportCollision("SIP_Status_Report_x.json".into());
        assert_eq!(err.classify().status, StatusCode::CONFLICT);
    }
}
