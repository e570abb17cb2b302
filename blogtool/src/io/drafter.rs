//! Optional commit message drafting through an external summarizer.
//!
//! Drafting is a convenience: every failure yields `None` so the user can still
//! type a message by hand.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use minijinja::{Environment, context};
use tracing::{debug, instrument, warn};

use crate::io::process::run_tool;
use crate::io::tools::Tools;

const COMMIT_DRAFT_TEMPLATE: &str = include_str!("prompts/commit_draft.md");

/// Large diffs are cut before they reach the summarizer.
const MAX_DIFF_CHARS: usize = 20_000;

pub trait MessageDrafter {
    /// Suggest a commit message for `diff`, or `None` when no suggestion is available.
    fn draft(&self, diff: &str) -> Option<String>;
}

/// Pipes a prompt plus the diff to a command such as `llm` on stdin.
pub struct LlmDrafter {
    command: Vec<String>,
    workdir: PathBuf,
    tools: Tools,
    timeout: Duration,
    languages: BTreeMap<String, String>,
    env: Environment<'static>,
}

impl LlmDrafter {
    /// `None` when `command` is empty, which disables drafting.
    pub fn new(
        command: &[String],
        workdir: &Path,
        tools: &Tools,
        timeout: Duration,
        languages: &BTreeMap<String, String>,
    ) -> Option<Self> {
        if command.is_empty() {
            return None;
        }
        let mut env = Environment::new();
        env.add_template("commit_draft", COMMIT_DRAFT_TEMPLATE)
            .expect("commit draft template should be valid");
        Some(Self {
            command: command.to_vec(),
            workdir: workdir.to_path_buf(),
            tools: tools.clone(),
            timeout,
            languages: languages.clone(),
            env,
        })
    }

    fn render_prompt(&self, diff: &str) -> Option<String> {
        let template = self.env.get_template("commit_draft").ok()?;
        match template.render(context! {
            languages => &self.languages,
            diff => truncate_chars(diff.trim(), MAX_DIFF_CHARS),
        }) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                warn!(err = %e, "render commit draft prompt");
                None
            }
        }
    }
}

impl MessageDrafter for LlmDrafter {
    #[instrument(skip_all, fields(program = %self.command[0]))]
    fn draft(&self, diff: &str) -> Option<String> {
        if diff.trim().is_empty() {
            debug!("empty diff, nothing to draft");
            return None;
        }
        let prompt = self.render_prompt(diff)?;
        let mut cmd = self.tools.command(Path::new(&self.command[0]));
        cmd.args(&self.command[1..]).current_dir(&self.workdir);
        let out = match run_tool(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.tools.output_limit_bytes,
        ) {
            Ok(out) => out,
            Err(e) => {
                debug!(err = %e, "drafter unavailable");
                return None;
            }
        };
        if !out.success() {
            warn!(
                exit_code = out.exit_code,
                timed_out = out.timed_out,
                "drafter failed"
            );
            return None;
        }
        let message = out.stdout.trim().trim_matches(['"', '`']).trim();
        (!message.is_empty()).then(|| message.to_string())
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n[diff truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::ToolsConfig;

    fn languages() -> BTreeMap<String, String> {
        BTreeMap::from([("en".to_string(), "english".to_string())])
    }

    fn drafter(command: &[&str]) -> Option<LlmDrafter> {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        LlmDrafter::new(
            &command,
            &std::env::temp_dir(),
            &Tools::resolve(&ToolsConfig::default()),
            Duration::from_secs(10),
            &languages(),
        )
    }

    #[test]
    fn empty_command_disables_drafting() {
        assert!(drafter(&[]).is_none());
    }

    #[test]
    fn prompt_lists_languages_and_diff() {
        let d = drafter(&["llm"]).expect("drafter");
        let prompt = d.render_prompt("+hello").expect("prompt");
        assert!(prompt.contains("`content/english/` is `en`"));
        assert!(prompt.trim_end().ends_with("+hello"));
    }

    #[test]
    fn missing_tool_yields_none() {
        let d = drafter(&["blogtool-no-such-llm"]).expect("drafter");
        assert_eq!(d.draft("+hello"), None);
    }

    #[test]
    fn empty_diff_yields_none() {
        let d = drafter(&["llm"]).expect("drafter");
        assert_eq!(d.draft("  \n"), None);
    }

    #[cfg(unix)]
    #[test]
    fn returns_trimmed_output() {
        let d = drafter(&["sh", "-c", "cat >/dev/null; echo '\"post en: Fix typo\"'"]).expect("drafter");
        assert_eq!(d.draft("+hello").as_deref(), Some("post en: Fix typo"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_yields_none() {
        let d = drafter(&["sh", "-c", "cat >/dev/null; echo partial; exit 1"]).expect("drafter");
        assert_eq!(d.draft("+hello"), None);
    }

    #[cfg(unix)]
    #[test]
    fn stalled_tool_times_out_on_large_diff() {
        let command = ["sh", "-c", "exec sleep 10"].map(String::from);
        let d = LlmDrafter::new(
            &command,
            &std::env::temp_dir(),
            &Tools::resolve(&ToolsConfig::default()),
            Duration::from_millis(300),
            &languages(),
        )
        .expect("drafter");
        let diff = "+内容の変更があります\n".repeat(2000);
        let started = std::time::Instant::now();

        assert_eq!(d.draft(&diff), None);
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn truncates_long_diffs_by_chars() {
        assert_eq!(truncate_chars("абв", 5), "абв");
        assert_eq!(truncate_chars("абвгд", 2), "аб\n[diff truncated]");
    }
}
