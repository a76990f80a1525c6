use log::{debug, error, info, warn};

/// Initialize the logger
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Log an informational message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log ledger endpoint details, hiding any credentials embedded in the URL
pub fn log_ledger_connection_details(provider: &str, url: &str) {
    info!("Ledger endpoint ({}): {}", provider, redact_url(url));
}

/// Log database connection details
pub fn log_database_connection_details(url: &str) {
    info!("Database connection details: {}", redact_url(url));
}

/// Strips `user:password@` and trailing API keys from a URL before it is logged
fn redact_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => return url.to_string(),
    };
    let host_part = match rest.rsplit_once('@') {
        Some((_, host)) => host,
        None => rest,
    };
    let host = host_part.split('/').next().unwrap_or(host_part);
    if host_part.len() > host.len() {
        format!("{}://{}/***", scheme, host)
    } else {
        format!("{}://{}", scheme, host)
    }
}

/// Formats a duration in whole seconds as `1h 2m 3s`
pub fn fmt_duration(seconds: u64) -> String {
    let (h, rem) = (seconds / 3600, seconds % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
