// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction and audit logging for the Hearth gateway.
//!
//! All tool output that flows into the audit log or back into the model
//! passes through [`SecretFilter`]; every tool execution and scheduled run
//! produces an [`AuditEvent`].

pub mod audit;
pub mod redact;

pub use audit::{AuditEvent, AuditKind, AuditLog};
pub use redact::{CREDENTIAL_ENV_VARS, SecretFilter};
