//src/names.rs

/// Placeholder for entities whose name column is empty.
pub const UNNAMED: &str = "(unnamed)";

/// Final words that are rendered as a parenthesised qualifier.
const PARENTHETICAL_SUFFIXES: [&str; 2] = ["assisted", "weighted"];

fn title_case(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn title_case_word(word: &str) -> String {
    word.split('-').map(title_case).collect::<Vec<_>>().join("-")
}

/// Formats a built-in snake_case name: `pull_up_weighted` becomes `Pull Up (Weighted)`,
/// `iso-lateral_chest_press` becomes `Iso-Lateral Chest Press`.
pub fn format_exercise_name(name: &str) -> String {
    let words: Vec<&str> = name.split('_').collect();
    let wrap_last = words
        .last()
        .is_some_and(|last| PARENTHETICAL_SUFFIXES.contains(&last.to_lowercase().as_str()));

    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let formatted = title_case_word(word);
            if wrap_last && index == words.len() - 1 {
                format!("({formatted})")
            } else {
                formatted
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// User-created exercises keep their name verbatim.
pub fn format_exercise_display_name(name: Option<&str>, is_user_created: bool) -> String {
    match name {
        None | Some("") => UNNAMED.to_string(),
        Some(raw) if is_user_created => raw.to_string(),
        Some(raw) => format_exercise_name(raw),
    }
}

/// `hamstrings,glutes` becomes `Hamstrings, Glutes`.
pub fn format_muscle_label(muscles: Option<&str>) -> Option<String> {
    let parts: Vec<String> = muscles?
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(format_exercise_name)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Equipment is named like a built-in exercise; the opaque identifier stands in for a missing name.
pub fn format_equipment_display_name(
    name: Option<&str>,
    identifier: Option<&str>,
) -> Option<String> {
    name.filter(|n| !n.trim().is_empty())
        .or(identifier)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(format_exercise_name)
}
