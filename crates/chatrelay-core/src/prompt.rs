//! System instruction assembly.

/// Join the two system-instruction sources with a blank line between them.
///
/// The result is injected once, when a channel's session is created.
pub fn build_system_instruction(system: &str, stories: &str) -> String {
    format!("{system}\n\n{stories}")
}
