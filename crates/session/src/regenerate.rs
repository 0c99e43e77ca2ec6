//! Regeneration state machine.
//!
//! `Idle -> Requesting -> (Success | Failure) -> Idle`. At most one request
//! is in flight; each one is identified by a [`Ticket`] so a response that
//! arrives after its view was retired is recognised and dropped.

use sitekit_client::ApiError;
use sitekit_core::GeneratedSite;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RegenerateError {
    #[error("Please describe what changes you want")]
    EmptyRequest,

    #[error("A regeneration is already in progress")]
    AlreadyRequesting,

    #[error("Failed to regenerate website: {0}")]
    Api(#[from] ApiError),

    #[error("Regeneration response discarded: the view was closed")]
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
}

/// Identity of one regeneration request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Result of completing a request
#[derive(Debug)]
pub enum Completion {
    /// Replace the working site with this one, in full
    Success(GeneratedSite),
    /// Keep the working site unchanged
    Failure(ApiError),
    /// Response for a request this controller no longer tracks
    Stale,
}

#[derive(Debug)]
pub struct RegenerationController {
    in_flight: Option<Ticket>,
    next_ticket: u64,
    last_error: Option<String>,
}

impl Default for RegenerationController {
    fn default() -> Self {
        Self::new()
    }
}

impl RegenerationController {
    pub fn new() -> Self {
        Self {
            in_flight: None,
            next_ticket: 1,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.in_flight {
            Some(_) => Phase::Requesting,
            None => Phase::Idle,
        }
    }

    pub fn is_requesting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Message of the most recent failure, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Move to `Requesting` for a modification request.
    ///
    /// Blank requests and requests made while another is in flight are
    /// refused without changing state.
    pub fn begin(&mut self, modification_request: &str) -> Result<Ticket, RegenerateError> {
        if modification_request.trim().is_empty() {
            return Err(RegenerateError::EmptyRequest);
        }
        if self.in_flight.is_some() {
            debug!("Regeneration refused: one already in flight");
            return Err(RegenerateError::AlreadyRequesting);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        info!(ticket = ticket.0, "Regeneration requested");
        Ok(ticket)
    }

    /// Deliver the backend's answer for a ticket and return to `Idle`
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<GeneratedSite, ApiError>,
    ) -> Completion {
        if self.in_flight != Some(ticket) {
            debug!(ticket = ticket.0, "Discarding stale regeneration response");
            return Completion::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(site) => {
                self.last_error = None;
                info!(ticket = ticket.0, files = site.files.len(), "Regeneration succeeded");
                Completion::Success(site)
            }
            Err(e) => {
                warn!(ticket = ticket.0, error = %e, "Regeneration failed");
                self.last_error = Some(e.to_string());
                Completion::Failure(e)
            }
        }
    }

    /// Give up on one request whose response will never be delivered.
    ///
    /// A no-op once that request has completed or been retired, so it never
    /// cancels a newer request.
    pub fn abandon(&mut self, ticket: Ticket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            debug!(ticket = ticket.0, "Abandoned in-flight regeneration");
        }
    }

    /// Forget the in-flight request; its eventual response will be stale
    pub fn retire(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            debug!(ticket = ticket.0, "Retired in-flight regeneration");
        }
    }
}
