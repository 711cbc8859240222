//! Reference enumeration of command-type codes, so the log's command type
//! column can be decoded without hardcoding the mapping.

use pg_grab_shared::CmdType;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommandTypeRow {
    pub id: i32,
    pub modify: bool,
    pub name: &'static str,
}

impl From<CmdType> for CommandTypeRow {
    fn from(cmd: CmdType) -> Self {
        Self {
            id: cmd.id(),
            modify: cmd.is_modify(),
            name: cmd.name(),
        }
    }
}

/// Yields one row per known command type, then ends.
#[derive(Clone, Debug, Default)]
pub struct QueryTypes {
    call_cntr: usize,
}

impl Iterator for QueryTypes {
    type Item = CommandTypeRow;

    fn next(&mut self) -> Option<Self::Item> {
        let cmd = CmdType::ALL.get(self.call_cntr)?;
        self.call_cntr += 1;
        Some(CommandTypeRow::from(*cmd))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = CmdType::ALL.len().saturating_sub(self.call_cntr);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for QueryTypes {}

pub fn query_types() -> QueryTypes {
    QueryTypes::default()
}
