use colored::Colorize;
use declarative::OperationResult;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Operation results
// ============================================================================

/// Status label colored by outcome, padded for alignment
pub fn status_label(label: &str) -> String {
    let padded = format!("{label:<14}");
    match label {
        "failed" => padded.red().bold().to_string(),
        "skipped" => padded.dimmed().to_string(),
        l if l.starts_with("would-") => padded.yellow().to_string(),
        _ => padded.green().to_string(),
    }
}

/// One line per operation: status, name, and the reason or error if any
pub fn operation(result: &OperationResult) {
    let detail = match &result.outcome {
        declarative::Outcome::Skipped { reason } => reason.as_str(),
        declarative::Outcome::Failed { error } => error.as_str(),
        _ => "",
    };
    if detail.is_empty() {
        println!("  {} {}", status_label(result.outcome.label()), result.display_name());
    } else {
        println!(
            "  {} {} {}",
            status_label(result.outcome.label()),
            result.display_name(),
            format!("({detail})").dimmed()
        );
    }
}
