// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod aggregator;
pub mod booking;
pub mod credentials;
pub mod identity;
pub mod metadata_cache;
pub mod provider;
pub mod scheduling;
pub mod session;

pub use account::{AccountService, LoginResult};
pub use aggregator::{CalendarAggregator, CalendarOverview};
pub use booking::BookingWorkflow;
pub use credentials::CredentialStore;
pub use identity::{IdentityVerifier, OidcIssuer, VerifiedIdentity};
pub use metadata_cache::TtlCache;
pub use provider::{CalendarProvider, OAuthToken, Providers};
pub use scheduling::SchedulingResolver;
pub use session::{SessionClaim, SessionService};
