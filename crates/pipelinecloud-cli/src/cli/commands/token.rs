use pipelinecloud_core::auth::loggable_claims;
use pipelinecloud_core::AccessTokenResult;

use super::{load_pipeline, report_error};
use crate::cli::args::TokenArgs;
use crate::cli::commands::precheck::gate;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};

pub async fn run(args: TokenArgs) -> anyhow::Result<i32> {
    if !gate() {
        return Ok(EXIT_CONFIG_ERROR);
    }

    let pipeline = match load_pipeline() {
        Ok(p) => p,
        Err(e) => return Ok(report_error(&e)),
    };

    let token = match pipeline.acquire_token().await {
        Ok(t) => t,
        Err(e) => return Ok(report_error(&e)),
    };

    print!("{}", format_metadata(&token, args.claims)?);
    Ok(EXIT_SUCCESS)
}

fn format_metadata(token: &AccessTokenResult, with_claims: bool) -> anyhow::Result<String> {
    let mut out = format!(
        "token_type: {}\nexpires_in: {}s\nexpires_at: {}\n",
        token.token_type,
        token.expires_in.as_secs(),
        token.expires_at.to_rfc3339()
    );
    if let Some(ext) = token.ext_expires_in {
        out.push_str(&format!("ext_expires_in: {}s\n", ext.as_secs()));
    }

    if with_claims {
        match &token.claims {
            Some(claims) => {
                let shown = serde_json::Value::Object(loggable_claims(claims));
                out.push_str(&format!("claims: {}\n", serde_json::to_string_pretty(&shown)?));
            }
            None => out.push_str("claims: <token is not a JWT>\n"),
        }
    }
    Ok(out)
}
