//! Termination rules for the clarification dialogue.

/// Reply the model is told to send when it has no further questions.
pub const NOTHING_MORE: &str = "Nothing more to clarify.";

/// Whether a clarification reply ends the dialogue.
///
/// The sentinel is matched trimmed, case-insensitively, with the trailing
/// period optional. Without `legacy_no_prefix`, only a bare negative
/// (`no`, `no.`, `nope`) also terminates; with it, any reply starting with
/// `no` does, which also swallows answers such as "no, but also ...".
pub fn is_clarification_done(reply: &str, legacy_no_prefix: bool) -> bool {
    let normalized = reply.trim().to_lowercase();
    let bare = normalized.trim_end_matches(['.', '!']);
    if bare == NOTHING_MORE.trim_end_matches('.').to_lowercase() {
        return true;
    }
    if legacy_no_prefix {
        return normalized.starts_with("no");
    }
    matches!(bare, "no" | "nope")
}
