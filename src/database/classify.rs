use pg_grab_shared::CmdType;

/// How the engine routes a statement: transaction control bypasses the
/// executor, everything else runs through the hook chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Begin,
    Commit,
    Rollback,
    Command(CmdType),
}

fn first_keyword(sql: &str) -> String {
    let mut rest = sql.trim_start();
    // skip leading line comments and parentheses
    loop {
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = stripped.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(stripped) = rest.strip_prefix('(') {
            rest = stripped.trim_start();
        } else {
            break;
        }
    }

    rest.split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Determines the command type by the first keyword.
pub fn detect_command_type(sql: &str) -> CmdType {
    match first_keyword(sql).as_str() {
        "" => CmdType::Nothing,
        "select" | "with" | "values" => CmdType::Select,
        "insert" | "replace" => CmdType::Insert,
        "update" => CmdType::Update,
        "delete" => CmdType::Delete,
        "create" | "drop" | "alter" | "explain" | "analyze" | "vacuum" | "reindex" | "pragma"
        | "attach" | "detach" | "savepoint" | "release" => CmdType::Utility,
        _ => CmdType::Unknown,
    }
}

pub fn classify_statement(sql: &str) -> StatementKind {
    match first_keyword(sql).as_str() {
        "begin" | "start" => StatementKind::Begin,
        "commit" | "end" => StatementKind::Commit,
        "rollback" | "abort" => StatementKind::Rollback,
        _ => StatementKind::Command(detect_command_type(sql)),
    }
}
