//! Parser for `git status --porcelain=v2 --branch`.

/// Parsed `git status` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code (`.` for unchanged), or "??" for untracked.
    pub code: String,
    /// Path for the changed file (the new path for renames).
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    pub fn is_staged(&self) -> bool {
        !self.is_untracked() && !matches!(self.code.chars().next(), Some('.') | None)
    }

    pub fn is_modified(&self) -> bool {
        !self.is_untracked() && !matches!(self.code.chars().nth(1), Some('.') | None)
    }
}

/// Branch headers and entries from one status invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PorcelainStatus {
    /// `None` before the first commit.
    pub oid: Option<String>,
    /// `None` on a detached HEAD.
    pub head: Option<String>,
    pub upstream: Option<String>,
    pub ahead: Option<usize>,
    pub behind: Option<usize>,
    pub entries: Vec<StatusEntry>,
}

impl PorcelainStatus {
    pub fn staged(&self) -> usize {
        self.entries.iter().filter(|e| e.is_staged()).count()
    }

    pub fn modified(&self) -> usize {
        self.entries.iter().filter(|e| e.is_modified()).count()
    }

    pub fn untracked(&self) -> usize {
        self.entries.iter().filter(|e| e.is_untracked()).count()
    }
}

pub fn parse_status(output: &str) -> Result<PorcelainStatus, String> {
    let mut status = PorcelainStatus::default();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix("# ") {
            parse_header(header, &mut status)?;
            continue;
        }
        match line.split_at_checked(2) {
            Some(("? ", path)) => status.entries.push(StatusEntry {
                code: "??".to_string(),
                path: path.to_string(),
            }),
            Some(("! ", _)) => {}
            Some(("1 ", rest)) => status.entries.push(parse_changed(rest, 8, line)?),
            Some(("2 ", rest)) => status.entries.push(parse_changed(rest, 9, line)?),
            Some(("u ", rest)) => status.entries.push(parse_changed(rest, 10, line)?),
            _ => return Err(format!("unexpected porcelain line: '{line}'")),
        }
    }
    Ok(status)
}

fn parse_header(header: &str, status: &mut PorcelainStatus) -> Result<(), String> {
    let (key, value) = header.split_once(' ').unwrap_or((header, ""));
    match key {
        "branch.oid" => status.oid = (value != "(initial)").then(|| value.to_string()),
        "branch.head" => status.head = (value != "(detached)").then(|| value.to_string()),
        "branch.upstream" => status.upstream = Some(value.to_string()),
        "branch.ab" => {
            let (ahead, behind) = value
                .split_once(' ')
                .ok_or_else(|| format!("malformed branch.ab header: '{value}'"))?;
            status.ahead = Some(parse_count(ahead, '+')?);
            status.behind = Some(parse_count(behind, '-')?);
        }
        // Newer git versions add headers (e.g. stash counts) that we don't need.
        _ => {}
    }
    Ok(())
}

fn parse_count(field: &str, sign: char) -> Result<usize, String> {
    field
        .strip_prefix(sign)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| format!("malformed branch.ab count: '{field}'"))
}

/// `fields` is the number of space-separated fields before the path.
fn parse_changed(rest: &str, fields: usize, line: &str) -> Result<StatusEntry, String> {
    let parts: Vec<&str> = rest.splitn(fields, ' ').collect();
    if parts.len() != fields || parts[0].len() != 2 {
        return Err(format!("unexpected porcelain line: '{line}'"));
    }
    let mut path = parts[fields - 1];
    // Renames carry `<path>\t<origPath>`.
    if let Some((new, _orig)) = path.split_once('\t') {
        path = new;
    }
    Ok(StatusEntry {
        code: parts[0].to_string(),
        path: path.to_string(),
    })
}
