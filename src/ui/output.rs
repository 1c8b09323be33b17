use crate::error::{format_bytes, MediaError, UserFriendlyError};
use crate::extractor::{ListingIndex, RunMode};
use crate::ui::progress::format_duration;
use crate::RunSummary;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");

pub struct OutputFormatter {
    #[allow(dead_code)]
    term: Term,
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
    status_on_stderr: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            term,
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
            status_on_stderr: false,
        }
    }

    /// Keep stdout for the result document, e.g. a listing.
    pub fn with_status_on_stderr(mut self, status_on_stderr: bool) -> Self {
        self.status_on_stderr = status_on_stderr;
        self
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Success, message),
                OutputMode::Json => self.print_json_message("success", message),
                OutputMode::Plain => self.status_line(&format!("SUCCESS: {}", message)),
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => self.status_line(&format!("WARNING: {}", message)),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => self.status_line(&format!("INFO: {}", message)),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        self.status_line(&format!("{}{}", ROCKET, style(operation).bold()));
                    } else {
                        self.status_line(&format!("> {}", operation));
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => self.status_line(&format!("STARTING: {}", operation)),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &MediaError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => self.print_json_message("suggestion", &suggestion),
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    /// The listing is the result of a listing run, so quiet mode keeps it.
    pub fn print_listing(&self, listing: &ListingIndex) {
        match self.mode {
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(listing).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Human | OutputMode::Plain => {
                for line in listing.lines() {
                    println!("{}", line);
                }
            }
        }
    }

    pub fn print_run_summary(&self, summary: &RunSummary) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_summary(summary),
            OutputMode::Json => self.print_json_summary(summary),
            OutputMode::Plain => self.print_plain_summary(summary),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn status_line(&self, line: &str) {
        if self.status_on_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => self.status_line(&format!("{}{}", emoji, color_fn(message))),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => self.status_line(&format!("{} {}", prefix, message)),
            }
        }
    }

    /// Status messages go to stderr so stdout holds only the result document.
    fn print_json_message(&self, level: &str, message: &str) {
        let obj = serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        eprintln!(
            "{}",
            serde_json::to_string(&obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_summary(&self, summary: &RunSummary) {
        let progress = &summary.progress;

        println!();
        self.print_separator();

        let headline = match (summary.mode, progress.cancelled) {
            (_, true) => "Extraction cancelled",
            (RunMode::Convert, false) => "Media conversion completed!",
            (RunMode::Listing, false) => "Listing completed!",
            (RunMode::Inspect, false) => "Rule check completed (no output directory given)",
        };
        if self.use_colors {
            println!("{} {}", style(headline).green().bold(), CHECKMARK);
        } else {
            println!("✓ {}", headline);
        }

        println!();
        println!(
            "  Entries seen:     {}",
            self.highlight(progress.entries_seen.to_string())
        );
        println!(
            "  Entries selected: {}",
            self.highlight(progress.entries_selected.to_string())
        );
        if progress.duplicates_skipped > 0 {
            println!("  Duplicates:       {}", progress.duplicates_skipped);
        }

        if summary.mode == RunMode::Convert {
            println!(
                "  media files extracted: {}",
                self.highlight(summary.files_extracted().to_string())
            );
            println!(
                "  Bytes read:       {}",
                self.highlight(format_bytes(progress.bytes_processed))
            );
            for (ext, count) in &progress.processed_by_extension {
                println!("    {}: {} files", ext, count);
            }
        }

        if let Some(ref metadata) = summary.metadata {
            println!("  Metadata files:   {}", metadata.exported.len());
            for failure in &metadata.failures {
                println!("    {} failed: {}", failure.producer, failure.message);
            }
        }
        if !summary.extra_files.is_empty() {
            println!("  Extra files:      {}", summary.extra_files.len());
        }

        println!(
            "  Time taken:       {}",
            self.highlight(format_duration(progress.elapsed()))
        );

        if !progress.warnings.is_empty() {
            println!("  Warnings:         {}", progress.warnings.len());
            if self.verbose_level > 0 {
                for warning in &progress.warnings {
                    println!("    - {}", warning);
                }
            }
        }
        if !progress.errors.is_empty() {
            println!("  Errors:           {}", progress.errors.len());
            for error in &progress.errors {
                println!("    - {}", error);
            }
        }
        if let Some(ref path) = summary.report_path {
            println!("  Report:           {}", path.display());
        }

        self.print_separator();
    }

    fn print_json_summary(&self, summary: &RunSummary) {
        let progress = &summary.progress;
        let json_summary = serde_json::json!({
            "type": "summary",
            "mode": summary.mode,
            "entries_seen": progress.entries_seen,
            "entries_selected": progress.entries_selected,
            "duplicates_skipped": progress.duplicates_skipped,
            "files_extracted": summary.files_extracted(),
            "bytes_processed": progress.bytes_processed,
            "files_by_extension": progress.processed_by_extension,
            "metadata": summary.metadata,
            "extra_files": summary.extra_files,
            "duration_ms": progress.elapsed().as_millis(),
            "errors": progress.errors,
            "warnings": progress.warnings,
            "cancelled": progress.cancelled,
            "report": summary.report_path,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        println!(
            "{}",
            serde_json::to_string_pretty(&json_summary).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_plain_summary(&self, summary: &RunSummary) {
        let progress = &summary.progress;

        if progress.cancelled {
            println!("CANCELLED: Extraction");
        } else {
            println!("COMPLETED: Extraction");
        }
        println!("Entries seen: {}", progress.entries_seen);
        println!("Entries selected: {}", progress.entries_selected);
        if summary.mode == RunMode::Convert {
            println!("media files extracted: {}", summary.files_extracted());
            println!("Bytes read: {}", progress.bytes_processed);
        }
        if let Some(ref metadata) = summary.metadata {
            println!("Metadata files: {}", metadata.exported.len());
            println!("Metadata failures: {}", metadata.failures.len());
        }
        println!("Duration: {:?}", progress.elapsed());
        if !progress.warnings.is_empty() {
            println!("Warnings: {}", progress.warnings.len());
        }
        if !progress.errors.is_empty() {
            println!("Errors: {}", progress.errors.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
