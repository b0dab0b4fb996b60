use async_trait::async_trait;
use console::style;
use scanmap_diagnostics::SharedMemorySink;
use scanmap_protocol::{LocalUri, Severity};
use scanmap_rebase::{local_uri_from_path, FilePicker};
use std::path::Path;

/// Terminal pick dialog: asks for a path on stderr, pre-filled with the
/// artifact's base file name as a hint. An empty answer cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPicker;

#[async_trait]
impl FilePicker for PromptPicker {
    async fn pick_file(&self, seed_name: &str) -> Option<LocalUri> {
        let seed = seed_name.to_string();
        // dialoguer blocks on the terminal; keep it off the async runtime.
        tokio::task::spawn_blocking(move || {
            let answer: String = dialoguer::Input::new()
                .with_prompt(format!("Locate '{seed}' (empty to skip)"))
                .allow_empty(true)
                .interact_text()
                .ok()?;
            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }
            Some(uri_from_input(answer))
        })
        .await
        .ok()
        .flatten()
    }
}

/// Accept either a URI or a plain filesystem path at the prompt.
pub fn uri_from_input(input: &str) -> LocalUri {
    if input.contains("://") {
        LocalUri::new(input)
    } else {
        local_uri_from_path(Path::new(input))
    }
}

/// Print every synced problem list, grouped per file, severity-colored.
pub fn print_problem_lists(sink: &SharedMemorySink) {
    for (uri, items) in sink.snapshot() {
        println!("{}", style(&uri).bold());
        for item in items {
            let severity = match item.severity {
                Severity::Error => style("error").red(),
                Severity::Warning => style("warning").yellow(),
                Severity::Note => style("note").dim(),
            };
            let code = item
                .code
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            println!(
                "  {}:{} {} {}{}",
                item.region.start_line, item.region.start_col, severity, item.message, code
            );
        }
    }
}

pub fn print_summary(mapped: usize, unmapped: usize) {
    if unmapped == 0 {
        println!("{} {mapped} results mapped", style("done:").green().bold());
    } else {
        println!(
            "{} {mapped} mapped, {unmapped} still unmapped",
            style("partial:").yellow().bold()
        );
    }
}
