use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions};

pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub submitter: String,
    pub text: String,
}

/// Resolved physical positions of the logical name/question columns.
/// `None` means the column could not be located in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub name_col: Option<usize>,
    pub question_col: Option<usize>,
}

/// Operator-supplied header names that take precedence over the heuristic.
#[derive(Debug, Clone, Default)]
pub struct ColumnPrefs {
    pub name: Option<String>,
    pub question: Option<String>,
}

/// The one persisted configuration record: poll settings plus the
/// presentation extras (title, QR target, column overrides).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub sheet_url: String,
    pub poll_interval_secs: u64,
    pub display_title: String,
    pub qr_target_url: String,
    pub name_column: Option<String>,
    pub question_column: Option<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            sheet_url: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            display_title: "Town Hall".to_string(),
            qr_target_url: String::new(),
            name_column: None,
            question_column: None,
        }
    }
}

impl BoardConfig {
    /// Save-time fixups: share links become CSV export links and the poll
    /// interval is clamped to the minimum. Timer-fire paths never re-clamp.
    pub fn sanitized(mut self) -> Self {
        self.sheet_url = normalize_sheet_url(&self.sheet_url);
        self.poll_interval_secs = self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        self
    }

    pub fn column_prefs(&self) -> ColumnPrefs {
        ColumnPrefs {
            name: self.name_column.clone(),
            question: self.question_column.clone(),
        }
    }
}

/// Rewrites a spreadsheet share link to its CSV export form.
pub fn normalize_sheet_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.contains("/edit?usp=sharing") {
        return trimmed.replace("/edit?usp=sharing", "/export?format=csv");
    }
    trimmed.to_string()
}

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();

pub fn log_debug(msg: &str) {
    if std::env::var("PODIUM_LOG").is_err() {
        return;
    }
    let base = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    let path = base.join("podium").join("podium.log");
    let lock = LOG_FILE.get_or_init(|| {
        let _ = std::fs::create_dir_all(
            path.parent()
                .unwrap_or_else(|| std::path::Path::new("/tmp")),
        );
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok();
        Mutex::new(file)
    });
    if let Ok(mut guard) = lock.lock() {
        if let Some(file) = guard.as_mut() {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let _ = writeln!(file, "[{}] {}", ts, msg);
        }
    }
}

/// Parses delimited sheet text into rows of cells.
///
/// Commas split fields and newlines split rows only outside quoted spans; a
/// doubled quote inside a quoted span is a single literal quote and does not
/// toggle quote state. An unterminated quoted span closes at end of input.
/// No row is treated as a header here, and no cell is trimmed.
pub fn parse_sheet(text: &str) -> Vec<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                field.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
        } else if ch == ',' && !in_quotes {
            row.push(std::mem::take(&mut field));
        } else if ch == '\n' && !in_quotes {
            row.push(std::mem::take(&mut field));
            rows.push(std::mem::take(&mut row));
        } else {
            field.push(ch);
        }
        i += 1;
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Locates the name and question columns in a header row.
///
/// Each column resolves independently: an exact match on the operator's
/// preferred header name wins, then a lowercased exact/substring scan, then
/// the positional fallback (name at 1, question at 2) when the header is
/// wide enough. Ties go to the leftmost cell.
pub fn resolve_columns(header: &[String], prefs: &ColumnPrefs) -> ColumnMapping {
    ColumnMapping {
        name_col: resolve_column(header, prefs.name.as_deref(), "name", &["name", "submitter"], 1),
        question_col: resolve_column(
            header,
            prefs.question.as_deref(),
            "question",
            &["question", "ask"],
            2,
        ),
    }
}

fn resolve_column(
    header: &[String],
    preferred: Option<&str>,
    exact: &str,
    substrings: &[&str],
    fallback: usize,
) -> Option<usize> {
    if let Some(wanted) = preferred {
        if let Some(idx) = header
            .iter()
            .position(|cell| strip_wrapping_quotes(cell) == wanted)
        {
            return Some(idx);
        }
    }
    let lowered: Vec<String> = header.iter().map(|cell| cell.to_lowercase()).collect();
    if let Some(idx) = lowered.iter().position(|cell| cell == exact) {
        return Some(idx);
    }
    for needle in substrings {
        if let Some(idx) = lowered.iter().position(|cell| cell.contains(needle)) {
            return Some(idx);
        }
    }
    if header.len() > fallback {
        Some(fallback)
    } else {
        None
    }
}

fn strip_wrapping_quotes(cell: &str) -> &str {
    cell.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(cell)
}

/// Builds question records from a parsed table, skipping the header row.
///
/// An unresolved mapping or an out-of-range index reads as an empty cell; a
/// row survives only if both the name and the question are non-empty once
/// wrapping quotes and surrounding whitespace are stripped.
pub fn ingest_questions(table: &[Vec<String>], mapping: ColumnMapping) -> Vec<Question> {
    let mut questions = Vec::new();
    for row in table.iter().skip(1) {
        let submitter = clean_cell(cell_at(row, mapping.name_col));
        let text = clean_cell(cell_at(row, mapping.question_col));
        if submitter.is_empty() || text.is_empty() {
            continue;
        }
        questions.push(Question { submitter, text });
    }
    questions
}

fn cell_at(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn clean_cell(cell: &str) -> String {
    strip_wrapping_quotes(cell).trim().to_string()
}

/// The visible queue: every question not marked done, in original order,
/// paired with its position in the full question list.
pub fn active_view(all: &[Question], done: &HashSet<String>) -> Vec<(usize, Question)> {
    all.iter()
        .enumerate()
        .filter(|(_, question)| !done.contains(&question.text))
        .map(|(idx, question)| (idx, question.clone()))
        .collect()
}

/// Adds a question text to the done set. Idempotent; returns whether the set
/// changed.
pub fn mark_done(done: &mut HashSet<String>, question_text: &str) -> bool {
    done.insert(question_text.to_string())
}

pub fn clear_done(done: &mut HashSet<String>) {
    done.clear();
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn load_config(&self) -> Result<Option<BoardConfig>>;
    async fn save_config(&self, config: &BoardConfig) -> Result<()>;
    async fn load_done(&self) -> Result<Vec<String>>;
    async fn add_done(&self, question_text: &str) -> Result<()>;
    async fn clear_done(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteBoardStore {
    pool: SqlitePool,
}

impl SqliteBoardStore {
    pub async fn connect(path: &str) -> Result<Self> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{}", path)
        };
        let options = SqliteConnectOptions::new()
            .filename(url.trim_start_matches("sqlite:"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS board_config (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 payload TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS done_questions (
                 question_text TEXT PRIMARY KEY
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for SqliteBoardStore {
    async fn load_config(&self) -> Result<Option<BoardConfig>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT payload FROM board_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((payload,)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn save_config(&self, config: &BoardConfig) -> Result<()> {
        let payload = serde_json::to_string(config)?;
        sqlx::query(
            "INSERT INTO board_config (id, payload) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
        )
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_done(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT question_text FROM done_questions ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn add_done(&self, question_text: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO done_questions (question_text) VALUES (?)")
            .bind(question_text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_done(&self) -> Result<()> {
        sqlx::query("DELETE FROM done_questions")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{
        BoardConfig, BoardStore, ColumnMapping, ColumnPrefs, DEFAULT_POLL_INTERVAL_SECS,
        MIN_POLL_INTERVAL_SECS, Question, SqliteBoardStore, active_view, ingest_questions,
        mark_done, normalize_sheet_url, parse_sheet, resolve_columns,
    };

    fn cells(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_empty_input_yields_empty_table() {
        assert!(parse_sheet("").is_empty());
    }

    #[test]
    fn parse_splits_fields_and_rows() {
        let table = parse_sheet("a,b,c\nd,e,f\n");
        assert_eq!(table, vec![cells(&["a", "b", "c"]), cells(&["d", "e", "f"])]);
    }

    #[test]
    fn parse_flushes_final_row_without_trailing_newline() {
        let table = parse_sheet("a,b\nc,d");
        assert_eq!(table, vec![cells(&["a", "b"]), cells(&["c", "d"])]);
    }

    #[test]
    fn parse_keeps_commas_and_newlines_inside_quotes() {
        let table = parse_sheet("\"a,b\",\"line1\nline2\"\n");
        assert_eq!(table, vec![cells(&["a,b", "line1\nline2"])]);
    }

    #[test]
    fn parse_doubled_quote_is_literal_and_does_not_toggle() {
        let table = parse_sheet("\"he said \"\"hi\"\", twice\",x\n");
        assert_eq!(table, vec![cells(&["he said \"hi\", twice", "x"])]);
    }

    #[test]
    fn parse_round_trips_comma_newline_and_quote() {
        // A field holding `a,b\nc"d` encoded per the escaping rule.
        let encoded = "\"a,b\nc\"\"d\"";
        let table = parse_sheet(encoded);
        assert_eq!(table, vec![cells(&["a,b\nc\"d"])]);
    }

    #[test]
    fn parse_unterminated_quote_closes_at_end_of_input() {
        let table = parse_sheet("a,\"unterminated");
        assert_eq!(table, vec![cells(&["a", "unterminated"])]);
    }

    #[test]
    fn parse_does_not_trim_whitespace() {
        let table = parse_sheet(" a , b \n");
        assert_eq!(table, vec![cells(&[" a ", " b "])]);
    }

    #[test]
    fn parse_trailing_comma_yields_trailing_empty_cell() {
        let table = parse_sheet("a,b,\n");
        assert_eq!(table, vec![cells(&["a", "b", ""])]);
    }

    #[test]
    fn parse_does_not_special_case_the_header() {
        let table = parse_sheet("Name,Question\n");
        assert_eq!(table, vec![cells(&["Name", "Question"])]);
    }

    #[test]
    fn resolve_finds_name_and_question_by_substring() {
        let header = cells(&["id", "Full Name", "Your Question", "ts"]);
        let mapping = resolve_columns(&header, &ColumnPrefs::default());
        assert_eq!(mapping.name_col, Some(1));
        assert_eq!(mapping.question_col, Some(2));
    }

    #[test]
    fn resolve_prefers_exact_lowercase_match_over_substring() {
        let header = cells(&["Nickname", "name"]);
        let mapping = resolve_columns(&header, &ColumnPrefs::default());
        assert_eq!(mapping.name_col, Some(1));
    }

    #[test]
    fn resolve_falls_back_to_submitter_and_ask() {
        let header = cells(&["ts", "Submitter", "What do you want to ask?"]);
        let mapping = resolve_columns(&header, &ColumnPrefs::default());
        assert_eq!(mapping.name_col, Some(1));
        assert_eq!(mapping.question_col, Some(2));
    }

    #[test]
    fn resolve_preferred_name_is_case_sensitive_and_quote_stripped() {
        let header = cells(&["\"Who\"", "What"]);
        let prefs = ColumnPrefs {
            name: Some("Who".to_string()),
            question: Some("what".to_string()),
        };
        let mapping = resolve_columns(&header, &prefs);
        assert_eq!(mapping.name_col, Some(0));
        // "what" does not match "What" case-sensitively, and no heuristic
        // cell matches either, so the positional fallback does not apply
        // (only two columns).
        assert_eq!(mapping.question_col, None);
    }

    #[test]
    fn resolve_positional_fallback_requires_enough_columns() {
        let wide = cells(&["a", "b", "c"]);
        let mapping = resolve_columns(&wide, &ColumnPrefs::default());
        assert_eq!(mapping.name_col, Some(1));
        assert_eq!(mapping.question_col, Some(2));

        let narrow = cells(&["a", "b"]);
        let mapping = resolve_columns(&narrow, &ColumnPrefs::default());
        assert_eq!(mapping.name_col, Some(1));
        assert_eq!(mapping.question_col, None);
    }

    #[test]
    fn ingest_skips_header_strips_quotes_and_trims() {
        // Row 2 doubly-encodes its cells: the parser unwraps one layer and
        // leaves `"Alice"` / `"Hi there"`, which ingest strips; row 3 only
        // needs its whitespace trimmed.
        let table = parse_sheet("Name,Question\n\"\"\"Alice\"\"\",\"\"\"Hi there\"\"\"\nBob, What time? \n");
        let mapping = ColumnMapping {
            name_col: Some(0),
            question_col: Some(1),
        };
        assert_eq!(table[1], vec!["\"Alice\"".to_string(), "\"Hi there\"".to_string()]);
        let questions = ingest_questions(&table, mapping);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].submitter, "Alice");
        assert_eq!(questions[0].text, "Hi there");
        assert_eq!(questions[1].submitter, "Bob");
        assert_eq!(questions[1].text, "What time?");
    }

    #[test]
    fn ingest_drops_rows_missing_either_field() {
        let table = vec![
            cells(&["Name", "Question"]),
            cells(&["Alice", ""]),
            cells(&["", "orphaned question"]),
            cells(&["Bob", "What time?"]),
            cells(&["Carol"]),
        ];
        let mapping = ColumnMapping {
            name_col: Some(0),
            question_col: Some(1),
        };
        let questions = ingest_questions(&table, mapping);
        assert_eq!(
            questions,
            vec![Question {
                submitter: "Bob".to_string(),
                text: "What time?".to_string(),
            }]
        );
    }

    #[test]
    fn ingest_with_unresolved_mapping_yields_no_questions() {
        let table = vec![cells(&["a"]), cells(&["b"])];
        let questions = ingest_questions(&table, ColumnMapping::default());
        assert!(questions.is_empty());
    }

    #[test]
    fn active_view_preserves_order_and_original_indices() {
        let all = vec![
            Question {
                submitter: "Alice".to_string(),
                text: "first".to_string(),
            },
            Question {
                submitter: "Bob".to_string(),
                text: "second".to_string(),
            },
            Question {
                submitter: "Carol".to_string(),
                text: "third".to_string(),
            },
        ];
        let view = active_view(&all, &HashSet::new());
        let indices: Vec<usize> = view.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let mut done = HashSet::new();
        done.insert("second".to_string());
        let view = active_view(&all, &done);
        let indices: Vec<usize> = view.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn mark_done_is_idempotent_and_conflates_duplicate_text() {
        let mut done = HashSet::new();
        assert!(mark_done(&mut done, "What time?"));
        assert!(!mark_done(&mut done, "What time?"));
        assert_eq!(done.len(), 1);

        let all = vec![
            Question {
                submitter: "Alice".to_string(),
                text: "What time?".to_string(),
            },
            Question {
                submitter: "Bob".to_string(),
                text: "What time?".to_string(),
            },
        ];
        assert!(active_view(&all, &done).is_empty());
    }

    #[test]
    fn end_to_end_parse_resolve_ingest_and_mark_done() {
        let source = "Name,Question\nAlice,\"Hi there\"\nBob,What time?\n";
        let table = parse_sheet(source);
        let mapping = resolve_columns(&table[0], &ColumnPrefs::default());
        let questions = ingest_questions(&table, mapping);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].submitter, "Alice");
        assert_eq!(questions[0].text, "Hi there");
        assert_eq!(questions[1].text, "What time?");

        let mut done = HashSet::new();
        mark_done(&mut done, "What time?");
        let view = active_view(&questions, &done);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].1.submitter, "Alice");
    }

    #[test]
    fn normalize_rewrites_share_links() {
        assert_eq!(
            normalize_sheet_url("https://sheets.example/d/abc/edit?usp=sharing"),
            "https://sheets.example/d/abc/export?format=csv"
        );
        assert_eq!(
            normalize_sheet_url("  https://sheets.example/d/abc/export?format=csv "),
            "https://sheets.example/d/abc/export?format=csv"
        );
    }

    #[test]
    fn sanitized_clamps_interval_to_minimum() {
        let config = BoardConfig {
            poll_interval_secs: 1,
            ..BoardConfig::default()
        };
        assert_eq!(config.sanitized().poll_interval_secs, MIN_POLL_INTERVAL_SECS);

        let config = BoardConfig::default();
        assert_eq!(
            config.sanitized().poll_interval_secs,
            DEFAULT_POLL_INTERVAL_SECS
        );
    }

    fn temp_db_path() -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("podium-core-{}-{}.db", std::process::id(), ts))
    }

    #[tokio::test]
    async fn store_round_trips_config() -> anyhow::Result<()> {
        let db_path = temp_db_path();
        let _ = std::fs::remove_file(&db_path);

        let store = SqliteBoardStore::connect(
            db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("invalid temp db path"))?,
        )
        .await?;
        store.init().await?;

        assert!(store.load_config().await?.is_none());

        let config = BoardConfig {
            sheet_url: "https://sheets.example/d/abc/export?format=csv".to_string(),
            poll_interval_secs: 45,
            display_title: "All Hands".to_string(),
            qr_target_url: "https://forms.example/ask".to_string(),
            name_column: Some("Full Name".to_string()),
            question_column: None,
        };
        store.save_config(&config).await?;
        assert_eq!(store.load_config().await?, Some(config.clone()));

        let updated = BoardConfig {
            poll_interval_secs: 10,
            ..config
        };
        store.save_config(&updated).await?;
        assert_eq!(store.load_config().await?, Some(updated));

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }

    #[tokio::test]
    async fn store_done_set_grows_once_and_clears() -> anyhow::Result<()> {
        let db_path = temp_db_path();
        let _ = std::fs::remove_file(&db_path);

        let store = SqliteBoardStore::connect(
            db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("invalid temp db path"))?,
        )
        .await?;
        store.init().await?;

        assert!(store.load_done().await?.is_empty());
        store.add_done("What time?").await?;
        store.add_done("What time?").await?;
        store.add_done("Why?").await?;
        assert_eq!(
            store.load_done().await?,
            vec!["What time?".to_string(), "Why?".to_string()]
        );

        store.clear_done().await?;
        assert!(store.load_done().await?.is_empty());

        let _ = std::fs::remove_file(&db_path);
        Ok(())
    }
}
