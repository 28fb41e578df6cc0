use clap::{Parser, Subcommand};
use reqwest::{redirect::Policy, StatusCode};

#[derive(Parser)]
#[command(name = "quota-cli")]
#[command(about = "Management CLI for the quota gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Control page path on the gate.
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Form field carrying the new value.
    #[arg(short, long, default_value = "c")]
    field: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current quota
    Get,
    /// Set the quota (negative values mean unlimited)
    Set {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Remove the limit
    Unlimited,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
    let control_url = format!("{}{}", cli.url.trim_end_matches('/'), cli.path);

    let value = match cli.command {
        Commands::Get => None,
        Commands::Set { value } => Some(value),
        Commands::Unlimited => Some(-1),
    };

    if let Some(value) = value {
        let res = client
            .post(&control_url)
            .form(&[(cli.field.as_str(), value.to_string())])
            .send()
            .await?;

        if res.status() != StatusCode::SEE_OTHER {
            let status = res.status();
            let page = res.text().await.unwrap_or_default();
            eprintln!("Error: gate answered {status}");
            if let Some(problem) = extract_between(&page, "<h2>Problem: ", "</h2>") {
                eprintln!("Problem: {problem}");
            }
            std::process::exit(1);
        }
    }

    let res = client.get(&control_url).send().await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gate answered {status}");
        std::process::exit(1);
    }

    let page = res.text().await?;
    match parse_quota_page(&page) {
        Some(quota) if quota < 0 => println!("{quota} (unlimited)"),
        Some(quota) => println!("{quota}"),
        None => {
            eprintln!("Error: no quota found on control page");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Current quota from the `<h1>Quota: N…</h1>` heading of the control page.
fn parse_quota_page(page: &str) -> Option<i64> {
    let heading = extract_between(page, "<h1>Quota: ", "</h1>")?;
    heading.split_whitespace().next()?.parse().ok()
}

fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    text.get(from..from + len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limited_page() {
        let page = r#"<h1>Quota: 12</h1><form method="post" action="/"></form>"#;
        assert_eq!(parse_quota_page(page), Some(12));
    }

    #[test]
    fn test_parse_unlimited_page() {
        assert_eq!(parse_quota_page("<h1>Quota: -1 (unlimited)</h1>"), Some(-1));
    }

    #[test]
    fn test_parse_page_without_heading() {
        assert_eq!(parse_quota_page("<html>registry</html>"), None);
    }

    #[test]
    fn test_extract_problem() {
        let page = "<h1>Quota: 3</h1><h2>Problem: invalid quota value</h2>";
        assert_eq!(
            extract_between(page, "<h2>Problem: ", "</h2>"),
            Some("invalid quota value")
        );
    }
}
