//! Shared terminal icons.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[i]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "->");

// Step markers
pub static STEP_DONE: Emoji<'_, '_> = Emoji("✔", "x");
pub static STEP_ACTIVE: Emoji<'_, '_> = Emoji("▶", ">");
pub static STEP_PENDING: Emoji<'_, '_> = Emoji("·", ".");
