/// Join title and body into one post, capped at `max_chars` characters.
///
/// When the text is too long the body is cut on a line boundary if one is
/// available, otherwise mid-line, and an ellipsis is appended.
pub fn compose_commentary(title: &str, body: &str, max_chars: usize) -> String {
    let full = format!("{}\n\n{}", title.trim(), body.trim());
    if full.chars().count() <= max_chars {
        return full;
    }

    let budget = max_chars.saturating_sub(1);
    let cut = match full.char_indices().nth(budget) {
        Some((idx, _)) => &full[..idx],
        None => full.as_str(),
    };

    // Prefer ending on a full line, as long as that keeps most of the text
    let trimmed = match cut.rfind('\n') {
        Some(pos) if pos > cut.len() / 2 => &cut[..pos],
        _ => cut,
    };

    format!("{}…", trimmed.trim_end())
}
