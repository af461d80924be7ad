use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("not able to build an identity from a {kind} value")]
    InvalidIdentityInput { kind: &'static str },
    #[error("invalid identity attributes: {message}")]
    InvalidAttributes { message: String },
}

impl DomainError {
    pub fn invalid_input(kind: &'static str) -> Self {
        Self::InvalidIdentityInput { kind }
    }

    pub fn invalid_attributes(message: impl Into<String>) -> Self {
        Self::InvalidAttributes {
            message: message.into(),
        }
    }
}
