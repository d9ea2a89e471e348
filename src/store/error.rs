// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// Typed error for store requests so callers can tell network trouble, bad payloads and
/// missing records apart without string matching.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No {kind} with id {id}")]
    NotFound { kind: &'static str, id: i64 },
}

impl StoreError {
    /// True for failures reaching the store or being refused by it.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            StoreError::Http(_) | StoreError::Status { .. } | StoreError::Unavailable(_)
        )
    }

    /// True if the requested record doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
