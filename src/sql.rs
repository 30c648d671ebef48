// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! SQL text building.
//!
//! ```text
//! sql.rs (coordinator)
//! └── buffer.rs - indentation-aware text + parameter accumulation
//! ```

mod buffer;

pub use buffer::{SqlBuffer, SqlStatement};
