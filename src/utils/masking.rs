/// Mask an email address for display: the local part keeps its first and
/// last character, everything in between becomes `*`.
///
/// `jane.doe@example.com` -> `j******e@example.com`. Local parts of one or
/// two characters are fully starred. Input without `@` is starred whole.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}@{}", mask_local_part(local), domain),
        None => "*".repeat(email.chars().count()),
    }
}

fn mask_local_part(local: &str) -> String {
    let chars: Vec<char> = local.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let mut masked = String::with_capacity(local.len());
    masked.push(chars[0]);
    masked.push_str(&"*".repeat(chars.len() - 2));
    masked.push(chars[chars.len() - 1]);
    masked
}

/// Mask an opaque user key when no contact address is known.
pub fn mask_user_key(user_id: &str) -> String {
    let visible: String = user_id.chars().rev().take(2).collect::<Vec<_>>().into_iter().rev().collect();
    format!("***{}", visible)
}
