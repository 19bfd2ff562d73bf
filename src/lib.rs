// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! calbook: booking pages backed by the host's own calendar.
//!
//! Hosts publish event types against a weekly availability and connect a
//! Google and/or Microsoft calendar. Visitors book a slot; the meeting is
//! created on the host's calendar and then recorded locally.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SqliteDb;
use services::{
    AccountService, BookingWorkflow, CalendarAggregator, CredentialStore, IdentityVerifier,
    Providers, SchedulingResolver, SessionService,
};
use std::sync::Arc;
use time_utils::{Clock, SystemClock};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub sessions: SessionService,
    pub accounts: AccountService,
    pub credentials: CredentialStore,
    pub scheduling: SchedulingResolver,
    pub bookings: BookingWorkflow,
    pub aggregator: CalendarAggregator,
    pub providers: Providers,
    pub identity: Arc<IdentityVerifier>,
}

impl AppState {
    /// Wire the services together over one database and provider set.
    pub fn new(config: Config, db: SqliteDb, providers: Providers) -> anyhow::Result<Self> {
        Self::with_clock(config, db, providers, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        db: SqliteDb,
        providers: Providers,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let identity = Arc::new(IdentityVerifier::from_config(&config, clock.clone())?);
        Ok(Self::with_identity(config, db, providers, clock, identity))
    }

    pub fn with_identity(
        config: Config,
        db: SqliteDb,
        providers: Providers,
        clock: Arc<dyn Clock>,
        identity: Arc<IdentityVerifier>,
    ) -> Self {
        let sessions =
            SessionService::with_clock(&config.jwt_signing_key, &config.session_issuer, clock);
        let accounts = AccountService::new(db.clone(), sessions.clone(), config.session_ttl);
        let credentials = CredentialStore::new(db.clone());
        let scheduling = SchedulingResolver::new(db.clone());
        let bookings = BookingWorkflow::new(
            db.clone(),
            scheduling.clone(),
            credentials.clone(),
            providers.clone(),
        );
        let aggregator = CalendarAggregator::new(db.clone(), providers.clone());

        Self {
            config,
            db,
            sessions,
            accounts,
            credentials,
            scheduling,
            bookings,
            aggregator,
            providers,
            identity,
        }
    }
}
