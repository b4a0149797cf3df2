//! Input validation shared by handlers and store backends.

/// Validate email format
///
/// Basic shape check for logins and notification addresses: one `@`, a
/// non-empty local part and a dotted domain with a two-letter-or-longer TLD.
pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    if email.len() > 150 {
        return Err("Email must be at most 150 characters".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }

    let (local, domain) = (parts[0], parts[1]);
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let domain_ok = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !local_ok || !domain_ok {
        return Err("Invalid email format".to_string());
    }

    match domain.rsplit_once('.') {
        Some((host, tld))
            if !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            Ok(())
        }
        _ => Err("Invalid email format".to_string()),
    }
}

/// Validate a catalog code (faculty or career): 1-3 ASCII letters or digits.
pub fn validate_catalog_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("Code cannot be empty".to_string());
    }

    if code.len() > 3 {
        return Err("Code must be at most 3 characters".to_string());
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Code can only contain letters and numbers".to_string());
    }

    Ok(())
}

/// Validate a catalog display name.
pub fn validate_catalog_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.chars().count() > 255 {
        return Err("Name must be at most 255 characters".to_string());
    }

    Ok(())
}
