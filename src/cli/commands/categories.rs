//! Category listing command.

use console::style;

use crate::analysis::Category;
use crate::config::Settings;

/// Print every recognized category, marking the ones the analyzer is asked for.
pub fn cmd_categories(settings: &Settings) -> anyhow::Result<()> {
    let requested = settings.analyzer.resolved_categories()?;

    println!("{}", style("Categories").bold());
    for category in Category::ALL {
        let marker = if requested.contains(&category) {
            style("✓").green()
        } else {
            style("-").dim()
        };
        let kind = if category.is_statistic() {
            style("statistic").yellow()
        } else {
            style("data").dim()
        };
        println!("  {} {:<10} {}", marker, category.as_str(), kind);
    }

    Ok(())
}
