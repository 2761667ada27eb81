use owo_colors::OwoColorize;

use mica_syntax::error::Error;

/// Prints `err` with its cause chain; assembly errors also show the
/// offending source line when `source` is known.
pub fn render_error(kind: &str, source: Option<&str>, err: &anyhow::Error) {
    eprintln!("{}: {}", kind.red().bold(), err.to_string().red());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".bright_black(), cause);
    }

    let assembly_line = err.chain().find_map(|c| match c.downcast_ref::<Error>() {
        Some(Error::Assembly { line, .. }) => Some(*line),
        _ => None,
    });
    if let (Some(line), Some(source)) = (assembly_line, source) {
        if let Some(src_line) = source.lines().nth(line.saturating_sub(1)) {
            let line_num_str = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", line_num_str.bright_black(), src_line);
            eprintln!("     |");
        }
    }

    provide_error_suggestions(&err.to_string());
}

pub fn provide_error_suggestions(err_msg: &str) {
    if err_msg.contains("step limit") {
        eprintln!("{}", "Help: The program may loop forever; raise --step-limit if it is just long.".yellow());
    } else if err_msg.contains("division by zero") {
        eprintln!("{}", "Help: You cannot divide by zero.".yellow());
        eprintln!("    {}", "Check if the divisor is zero before the operation.".bright_black());
    } else if err_msg.contains("unknown label") {
        eprintln!("{}", "Help: Every jump target needs a matching 'Ln:' line in the same method.".yellow());
    } else if err_msg.contains("has no main method") {
        eprintln!("{}", "Help: The entry point is 'method public static void main(java.lang.String[])'.".yellow());
    } else if err_msg.contains("invalid program tree") {
        eprintln!("{}", "Help: The tree must be a JSON object with 'name' and 'items'.".yellow());
        eprintln!("    {}", "Example: {\"name\": \"Hello\", \"items\": []}".bright_black());
    }
}
