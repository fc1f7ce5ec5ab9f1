//! Users endpoints.

use serde::{Deserialize, Serialize};

use crate::client::{check_status, Client};
use crate::error::ApiError;
use crate::types::{as_pairs, ListParams, NewUser, User, UserPage, UserUpdate};

/// Accessor for `/users`, obtained with `Client::user`.
#[derive(Debug, Clone, Copy)]
pub struct UserApi<'a> {
    client: &'a Client,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    user: &'a T,
}

#[derive(Deserialize)]
struct Single {
    user: User,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn list(&self, params: &ListParams) -> Result<UserPage, ApiError> {
        let query = params.to_query();
        self.client.get_json("users.json", &as_pairs(&query))
    }

    pub fn show(&self, id: u64) -> Result<User, ApiError> {
        let single: Single = self.client.get_json(&format!("users/{id}.json"), &[])?;
        Ok(single.user)
    }

    /// Full-text search, e.g. `email:someone@example.com`.
    pub fn search(&self, query: &str) -> Result<UserPage, ApiError> {
        self.client.get_json("users/search.json", &[("query", query)])
    }

    pub fn create(&self, user: &NewUser) -> Result<User, ApiError> {
        let single: Single = self.client.post("users.json", &Envelope { user })?;
        Ok(single.user)
    }

    pub fn update(&self, id: u64, changes: &UserUpdate) -> Result<User, ApiError> {
        let single: Single = self
            .client
            .put(&format!("users/{id}.json"), &Envelope { user: changes })?;
        Ok(single.user)
    }

    pub fn delete(&self, id: u64) -> Result<(), ApiError> {
        check_status(&self.client.delete(&format!("users/{id}.json"))?)
    }
}
