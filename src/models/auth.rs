use serde::{Deserialize, Serialize};

/// Marketplace role of an account. Chat participants and message senders carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Buyer,
    Seller,
    Expert,
    CustomerService,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Buyer => "buyer",
            UserType::Seller => "seller",
            UserType::Expert => "expert",
            UserType::CustomerService => "customer_service",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "seller" => UserType::Seller,
            "expert" => UserType::Expert,
            "customer_service" => UserType::CustomerService,
            _ => UserType::Buyer,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String, // Subject (user id)
    pub name: String,
    #[serde(default)]
    pub user_type: UserType,
    pub exp: usize, // Expiration time
    pub iat: usize, // Issued at
}
