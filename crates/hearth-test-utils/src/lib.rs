// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities shared across Hearth crates.

pub mod mock_provider;

pub use mock_provider::MockProvider;
