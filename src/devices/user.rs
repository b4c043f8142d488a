// MIT License - Copyright (c) 2026 Peter Wright
// User records populated by USER_DATA

use serde::Serialize;

/// A panel user as reported in an equipment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_number: u16,
    /// Four-digit code, when the panel supplies it.
    pub user_code: Option<String>,
}
