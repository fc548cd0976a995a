//! Shared UI icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");

// Task indicators
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R] ");
pub static TEST: Emoji<'_, '_> = Emoji("🧪 ", "[T] ");
pub static COMMIT: Emoji<'_, '_> = Emoji("📝 ", "[C] ");

// File indicators
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "");
pub static HOOK: Emoji<'_, '_> = Emoji("🪝 ", "");
