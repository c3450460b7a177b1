pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

use std::sync::OnceLock;

pub use icons::Icons;
pub use output::{accent, dim, error, header, info, item, section, success, summary_row, warn};
pub use table::{audit_table, companies_table, stats_table, students_table};
pub use theme::{theme, Theme};

/// Set to `1` or `true` to silence informational CLI output
pub const QUIET_ENV: &str = "ROSTER_QUIET";

static QUIET: OnceLock<bool> = OnceLock::new();

/// Fix the quiet setting for this process; `ROSTER_QUIET` still applies.
/// Has no effect once anything has been printed.
pub fn set_quiet(quiet: bool) {
    let _ = QUIET.set(quiet || quiet_from_env());
}

pub fn is_quiet() -> bool {
    *QUIET.get_or_init(quiet_from_env)
}

fn quiet_from_env() -> bool {
    std::env::var(QUIET_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
