use crate::output::{print_fields, print_json};
use serde::Serialize;
use signaler_core::token::CounterToken;

#[derive(Serialize)]
struct TokenOutput {
    token: CounterToken,
    flag: &'static str,
    attempts: u32,
    success: bool,
    after_unhealthy: CounterToken,
    after_healthy: CounterToken,
}

pub fn run(raw: &str, json: bool) -> anyhow::Result<()> {
    let token: CounterToken = raw.parse()?;
    let out = TokenOutput {
        token,
        flag: token.flag.as_str(),
        attempts: token.attempts,
        success: token.success,
        after_unhealthy: token.incremented(),
        after_healthy: token.with_success(),
    };

    if json {
        return print_json(&out);
    }
    print_fields(&[
        ("token", out.token.to_string()),
        ("flag", out.flag.to_string()),
        ("attempts", out.attempts.to_string()),
        ("success", out.success.to_string()),
        ("after_unhealthy", out.after_unhealthy.to_string()),
        ("after_healthy", out.after_healthy.to_string()),
    ]);
    Ok(())
}
