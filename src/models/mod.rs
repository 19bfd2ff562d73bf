// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod availability;
pub mod booking;
pub mod credential;
pub mod event_type;
pub mod user;

pub use availability::{sort_enabled_first, Availability, AvailabilityDay};
pub use booking::{Booking, BookingForm, LoginForm, NewBooking};
pub use credential::{ProviderCredentials, ProviderKind};
pub use event_type::EventType;
pub use user::{User, UserProfile};
