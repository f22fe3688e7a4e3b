use crate::config::CopyQConfig;
use crate::source::{HistorySource, SourceError, SourceItem, SourceSnapshot, TabHistory};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;

/// Reads history from a running CopyQ instance through its command-line client.
///
/// Only `copyq tab` and `copyq eval -` are used, and the evaluated script only
/// selects and reads, so observing the history never changes it.
#[derive(Debug, Clone)]
pub struct CopyQSource {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
    /// Tabs to read. Empty = all tabs.
    scope: Vec<String>,
}

impl CopyQSource {
    /// `config.command` may carry leading arguments, e.g. `flatpak run com.github.hluk.copyq`.
    pub fn new(config: &CopyQConfig) -> Self {
        let mut parts = config.command.split_whitespace().map(String::from);
        let program = parts.next().unwrap_or_else(|| "copyq".to_string());
        Self {
            program,
            base_args: parts.collect(),
            timeout: config.timeout,
            scope: Vec::new(),
        }
    }

    /// Restrict reads to these tabs.
    pub fn with_scope<I, S>(mut self, tabs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = tabs.into_iter().map(Into::into).collect();
        self
    }

    async fn read_tab(self, tab: String) -> Result<TabHistory, SourceError> {
        let script = tab_script(&tab)?;
        let stdout = self.run(&["eval", "-"], Some(&script)).await?;
        let items = parse_items(&stdout).map_err(|e| {
            SourceError::Unavailable(format!("unreadable items for tab '{tab}': {e}"))
        })?;
        tracing::debug!(tab = %tab, items = items.len(), "read tab");
        Ok(TabHistory { tab, items })
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String, SourceError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SourceError::Unavailable(format!("failed to spawn {}: {e}", self.program))
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                return Err(SourceError::Unavailable(format!(
                    "failed to write to {} stdin: {e}",
                    self.program
                )));
            }
            // pipe drops here, closing stdin
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                SourceError::Unavailable(format!("{} process error: {e}", self.program))
            })?,
            Err(_) => {
                return Err(SourceError::Unavailable(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs_f32()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl HistorySource for CopyQSource {
    async fn list_tabs(&self) -> Result<Vec<String>, SourceError> {
        let stdout = self.run(&["tab"], None).await?;
        Ok(parse_tab_list(&stdout))
    }

    async fn list_current_items(&self) -> Result<SourceSnapshot, SourceError> {
        let listed = self.list_tabs().await?;
        let tabs: Vec<String> = if self.scope.is_empty() {
            listed
        } else {
            for wanted in &self.scope {
                if !listed.contains(wanted) {
                    tracing::warn!(tab = %wanted, "tab not found in CopyQ, skipping");
                }
            }
            listed.into_iter().filter(|t| self.scope.contains(t)).collect()
        };

        let mut set = JoinSet::new();
        for (index, tab) in tabs.into_iter().enumerate() {
            let source = self.clone();
            set.spawn(async move { (index, source.read_tab(tab).await) });
        }

        let mut read = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            let (index, result) =
                joined.map_err(|e| SourceError::Unavailable(format!("tab reader failed: {e}")))?;
            // Returning early drops the set, which aborts the remaining readers
            read.push((index, result?));
        }
        read.sort_by_key(|(index, _)| *index);

        Ok(SourceSnapshot { tabs: read.into_iter().map(|(_, t)| t).collect() })
    }
}

/// Script for `copyq eval -` printing `[[row, text], ...]` for the tab's text rows.
fn tab_script(tab: &str) -> Result<String, SourceError> {
    let name = serde_json::to_string(tab)
        .map_err(|e| SourceError::Unavailable(format!("cannot encode tab name '{tab}': {e}")))?;
    Ok(format!(
        "tab({name});
var rows = [];
var count = size();
for (var row = 0; row < count; ++row) {{
  var text = str(read('text/plain', row));
  if (text) rows.push([row, text]);
}}
print(JSON.stringify(rows));
"
    ))
}

fn parse_tab_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}

fn parse_items(stdout: &str) -> Result<Vec<SourceItem>, serde_json::Error> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<(usize, String)> = serde_json::from_str(trimmed)?;
    Ok(rows
        .into_iter()
        .map(|(source_rank, content)| SourceItem { content, source_rank })
        .collect())
}
