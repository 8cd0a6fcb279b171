// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod campaigns;
pub mod connections;
pub mod contacts;
pub mod conversations;
pub mod messages;
pub mod settings;
