use crate::error::ServiceError;

pub const MAX_PROMPT_CHARS: usize = 10_000;
pub const MAX_TOKENS_LIMIT: u32 = 1_000;

/// Trim and bounds-check an incoming prompt. Runs before any generation
/// attempt; a rejected prompt never reaches a generator or the log.
pub fn validate_prompt(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation("Prompt cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(ServiceError::Validation(
            "Prompt too long (max 10000 characters)".into(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_params(
    max_tokens: Option<u32>,
    temperature: Option<f64>,
) -> Result<(), ServiceError> {
    if let Some(n) = max_tokens
        && !(1..=MAX_TOKENS_LIMIT).contains(&n)
    {
        return Err(ServiceError::Validation(
            "max_tokens must be between 1 and 1000".into(),
        ));
    }
    if let Some(t) = temperature
        && !(0.0..=2.0).contains(&t)
    {
        return Err(ServiceError::Validation(
            "temperature must be between 0.0 and 2.0".into(),
        ));
    }
    Ok(())
}
