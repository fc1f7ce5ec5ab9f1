//! Tickets endpoints.

use serde::{Deserialize, Serialize};

use crate::client::{check_status, Client};
use crate::error::ApiError;
use crate::types::{as_pairs, ListParams, NewTicket, Ticket, TicketPage, TicketUpdate};

/// Accessor for `/tickets`, obtained with `Client::ticket`.
#[derive(Debug, Clone, Copy)]
pub struct TicketApi<'a> {
    client: &'a Client,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    ticket: &'a T,
}

#[derive(Deserialize)]
struct Single {
    ticket: Ticket,
}

impl<'a> TicketApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn list(&self, params: &ListParams) -> Result<TicketPage, ApiError> {
        let query = params.to_query();
        self.client.get_json("tickets.json", &as_pairs(&query))
    }

    pub fn show(&self, id: u64) -> Result<Ticket, ApiError> {
        let single: Single = self.client.get_json(&format!("tickets/{id}.json"), &[])?;
        Ok(single.ticket)
    }

    pub fn create(&self, ticket: &NewTicket) -> Result<Ticket, ApiError> {
        let single: Single = self.client.post("tickets.json", &Envelope { ticket })?;
        Ok(single.ticket)
    }

    pub fn update(&self, id: u64, changes: &TicketUpdate) -> Result<Ticket, ApiError> {
        let single: Single = self
            .client
            .put(&format!("tickets/{id}.json"), &Envelope { ticket: changes })?;
        Ok(single.ticket)
    }

    pub fn delete(&self, id: u64) -> Result<(), ApiError> {
        check_status(&self.client.delete(&format!("tickets/{id}.json"))?)
    }
}
