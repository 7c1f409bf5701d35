// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::constants::{BEARER_PREFIX, INTERNAL_SERVER_ERROR_MESSAGE};

/// JSON body returned to the client when a request fails before the
/// upstream response is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

impl ErrorBody {
    pub fn internal(details: impl Into<String>) -> Self {
        Self {
            error: INTERNAL_SERVER_ERROR_MESSAGE.to_string(),
            details: details.into(),
        }
    }
}

/// API key injected as a bearer token when the caller sends none.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Value for the `authorization` header.
    pub fn bearer(&self) -> String {
        format!("{}{}", BEARER_PREFIX, self.0)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}
