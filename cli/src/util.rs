use serde_json::json;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
    std::process::exit(4);
}

pub fn config_dir() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("merak")
}

/// Map an HTTP status to the CLI exit code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub fn exit_code_for(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

pub fn print_connection_error(err: &dyn std::fmt::Display) {
    let err = json!({
        "error": "connection_error",
        "message": format!("{err}"),
        "docs_hint": "Is the API server running? Check MERAK_API_URL."
    });
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
}

/// Execute an API request, print the JSON response, return the exit code.
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> i32 {
    let url = match reqwest::Url::parse(&format!("{api_url}{path}")) {
        Ok(u) => u,
        Err(e) => {
            let err = json!({
                "error": "cli_error",
                "message": format!("Invalid URL: {api_url}{path}: {e}")
            });
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
            return 4;
        }
    };

    let mut req = client().request(method, url);
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            print_connection_error(&e);
            return 3;
        }
    };

    let exit_code = exit_code_for(resp.status().as_u16());
    let resp_body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };
    let formatted = serde_json::to_string_pretty(&resp_body).unwrap_or_default();

    if exit_code == 0 {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }

    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_status_class() {
        assert_eq!(exit_code_for(200), 0);
        assert_eq!(exit_code_for(204), 0);
        assert_eq!(exit_code_for(400), 1);
        assert_eq!(exit_code_for(401), 1);
        assert_eq!(exit_code_for(500), 2);
        assert_eq!(exit_code_for(502), 2);
    }

    #[test]
    fn config_dir_is_namespaced() {
        assert!(config_dir().ends_with("merak"));
    }
}
